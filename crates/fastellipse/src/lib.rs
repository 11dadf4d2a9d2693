//! fastellipse: fast ellipse extraction from binary edge images.
//!
//! The pipeline groups edge pixels bottom-up:
//!
//! 1. **Segments** – run-length encoding along rows, columns and both
//!    diagonals.
//! 2. **Lines** – chains of parallel segments that form digital straight
//!    lines.
//! 3. **Arcs** – chains of lines with consistent curvature, assigned to one
//!    of eight octants.
//! 4. **Extended arcs** – triples of arcs from adjacent octants with a direct
//!    least-squares ellipse fit.
//! 5. **Ellipses** – extended arcs merged by shared arcs, agreement and
//!    proximity, kept if their edge coverage is high enough.
//!
//! # Public API
//! - [`EllipseExtractor`] as the entry point
//! - [`ExtractionConfig`] and its per-stage parts for tuning
//! - [`ExtractionResult`] with every intermediate stage for diagnostics
//! - the direct ellipse fit ([`fit_ellipse_direct`]) as a standalone tool

mod api;
pub mod arcs;
mod config;
pub mod conic;
mod error;
pub mod ext_arcs;
pub mod geometry;
pub mod lines;
pub mod merge;
mod pipeline;
pub mod segments;

#[cfg(test)]
mod test_utils;

pub use api::EllipseExtractor;
pub use config::{
    ArcConfig, ExtendedArcConfig, ExtractionConfig, LineConfig, MergeConfig, SegmentConfig,
    ValidationStage,
};
pub use conic::{fit_conic_direct, fit_ellipse_direct, ConicCoeffs, EllipseParams};
pub use error::FitError;
pub use ext_arcs::{ExtendedArc, LineBeam};
pub use geometry::{ArcGroup, ByArcGroup, ByLineGroup, LineGroup, Point};
pub use merge::Ellipse;
pub use pipeline::ExtractionResult;
