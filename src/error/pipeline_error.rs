//! Pipeline-level error types.

use super::LayerError;
use thiserror::Error;

/// Which store a missing dependency was expected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Data,
    Context,
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyKind::Data => write!(f, "data"),
            DependencyKind::Context => write!(f, "context"),
        }
    }
}

/// Pipeline-level errors.
///
/// Configuration problems are detected before any side effect runs; a layer
/// failure is wrapped exactly once into [`PipelineError::LayerExecution`] at
/// the layer boundary. Cancellation travels as [`PipelineError::Cancelled`]
/// internally and is mapped to a non-error outcome at the public boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline configuration error: {0}")]
    Config(String),
    #[error("[{process}] layer container validation failed: {reason}")]
    InvalidLayerSet { process: String, reason: String },
    #[error("[{process}] layer '{layer}' is missing required {kind} types: {list}", list = .missing.join(", "))]
    MissingDependencies {
        process: String,
        layer: String,
        kind: DependencyKind,
        missing: Vec<String>,
    },
    #[error("[{process}] data validation failed: {reason}")]
    InvalidData { process: String, reason: String },
    #[error("Layer '{layer}' failed: {hint}")]
    LayerExecution {
        layer: String,
        hint: &'static str,
        #[source]
        source: LayerError,
    },
    #[error("Progress slice budget exceeded in '{process}': requested execution {requested} of {total}")]
    SliceBudgetExceeded {
        process: String,
        requested: u32,
        total: u32,
    },
    #[error("Generation cancelled")]
    Cancelled,
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
