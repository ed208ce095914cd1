//! Sequential executor for the active layers of one process.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::context::LayerContext;
use crate::core::layer::LayerSet;
use crate::core::progress::{ProgressReporter, RunSlices};
use crate::error::{LayerError, PipelineError, PipelineResult};

/// Runs the active layers of a container in order against one context,
/// claiming one progress slice per call and wrapping layer failures with a
/// likely-cause hint.
#[derive(Default)]
pub struct LayerRunner;

impl LayerRunner {
    pub fn new() -> Self {
        Self
    }

    /// Execute every active layer of `layers` in container order.
    ///
    /// A container that fails structural validation is skipped with a logged
    /// warning rather than an error; callers that require a valid container
    /// raise before reaching the runner
    /// (see [`ProcessCore::execute_layers`](crate::core::ProcessCore::execute_layers)).
    pub async fn execute(
        &self,
        layers: &mut LayerSet,
        context: &LayerContext,
        slices: &mut RunSlices,
        progress: &Arc<dyn ProgressReporter>,
        token: &CancellationToken,
    ) -> PipelineResult<()> {
        if let Err(reason) = layers.validate() {
            tracing::warn!(process = slices.label(), %reason, "layer execution skipped");
            return Ok(());
        }

        let (from, to) = slices.next_slice()?;
        let indices = layers.active_indices();
        let count = indices.len();
        let slice = (to - from) / count as f32;

        for (position, index) in indices.into_iter().enumerate() {
            if token.is_cancelled() {
                tracing::warn!(process = slices.label(), "layer execution cancelled");
                return Err(PipelineError::Cancelled);
            }

            let layer = match layers.get_mut(index) {
                Some(layer) => layer,
                None => continue,
            };
            let name = layer.display_name().to_string();

            if let Err(error) = layer.init(context).await {
                return Err(Self::wrap_failure(name, error));
            }

            progress.update_stage(&format!(
                "Generate {} ({}/{}): {} ({}/{})",
                slices.label(),
                slices.current(),
                slices.total(),
                name,
                position + 1,
                count
            ));
            progress.report(from + position as f32 * slice);
            tokio::task::yield_now().await;

            let layer = match layers.get_mut(index) {
                Some(layer) => layer,
                None => continue,
            };
            if let Err(error) = layer.generate(context).await {
                return Err(Self::wrap_failure(name, error));
            }
        }

        Ok(())
    }

    fn wrap_failure(layer: String, error: LayerError) -> PipelineError {
        match error {
            LayerError::Cancelled => {
                tracing::warn!(layer = %layer, "layer cancelled");
                PipelineError::Cancelled
            }
            other => {
                let hint = failure_hint(&other);
                tracing::error!(layer = %layer, error = %other, hint, "layer execution failed");
                PipelineError::LayerExecution {
                    layer,
                    hint,
                    source: other,
                }
            }
        }
    }
}

/// Heuristic likely-cause hint for a layer failure, surfaced alongside the
/// wrapped error.
fn failure_hint(error: &LayerError) -> &'static str {
    match error {
        LayerError::MissingData(_) => {
            "check that every required data type was added to the data store before generation"
        }
        LayerError::MissingContext(_) => {
            "check that the process builds its context with every type the layer reads"
        }
        LayerError::InvalidInput(_) => {
            "check the parameters configured for this layer"
        }
        LayerError::Execution(_) | LayerError::Cancelled => {
            "check the layer's generation logic and its input data"
        }
    }
}
