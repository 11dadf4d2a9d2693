/// Reasons a circle or ellipse estimate is rejected.
///
/// None of these abort extraction: the stage that hit them drops the
/// candidate and carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitError {
    /// Not enough pixels, lines or radius for a meaningful estimate.
    InsufficientGeometry,
    /// A normal-equation or scatter matrix could not be factored or inverted.
    SingularMatrix,
    /// The fitted conic is not a real ellipse.
    DegenerateConic,
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientGeometry => write!(f, "insufficient geometry for a fit"),
            Self::SingularMatrix => write!(f, "singular matrix"),
            Self::DegenerateConic => write!(f, "fitted conic is not an ellipse"),
        }
    }
}

impl std::error::Error for FitError {}
