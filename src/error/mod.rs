//! Error types for the generation pipeline.
//!
//! Two levels mirror the two execution boundaries: [`LayerError`] is what a
//! layer implementation returns, [`PipelineError`] is the orchestrator-level
//! taxonomy that the pipeline and its host observe.

mod layer_error;
mod pipeline_error;

pub use layer_error::LayerError;
pub use pipeline_error::{DependencyKind, PipelineError, PipelineResult};
