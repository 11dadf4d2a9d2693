//! Conic representation and direct ellipse fitting.

mod fit;
mod types;

pub use fit::{fit_conic_direct, fit_ellipse_direct};
pub use types::{ConicCoeffs, EllipseParams};
