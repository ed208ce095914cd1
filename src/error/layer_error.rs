use thiserror::Error;

/// Layer-level errors, returned by [`Layer`](crate::core::Layer)
/// implementations from their `init` and `generate` steps.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("Missing data: {0}")]
    MissingData(String),
    #[error("Missing context: {0}")]
    MissingContext(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Layer cancelled")]
    Cancelled,
}

impl LayerError {
    /// Build an [`LayerError::Execution`] annotated with the caller's source
    /// location, so a failure deep inside layer logic still points at the
    /// line that raised it.
    #[track_caller]
    pub fn execution(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        LayerError::Execution(format!(
            "{} (at {}:{})",
            message.into(),
            location.file(),
            location.line()
        ))
    }
}
