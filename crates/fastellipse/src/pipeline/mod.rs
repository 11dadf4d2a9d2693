//! Stage orchestration and the owned result of one extraction run.
//!
//! Algorithmic primitives live in `segments`, `lines`, `arcs`, `ext_arcs`
//! and `merge`. This layer only wires them together in order and collects
//! their outputs.

mod result;
mod run;

pub use result::ExtractionResult;

pub(crate) use run::extract;
