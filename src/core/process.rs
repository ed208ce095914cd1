//! Process contract and the reusable body for layer-driven processes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::analyzer::DependencyAnalyzer;
use crate::core::context::LayerContext;
use crate::core::layer::LayerSet;
use crate::core::layer_runner::LayerRunner;
use crate::core::progress::{ProgressReporter, RunSlices};
use crate::core::store::SharedData;
use crate::error::{DependencyKind, PipelineError, PipelineResult};

/// One stage of the pipeline.
///
/// The pipeline drives the lifecycle initialize → generate, and for suffix
/// re-execution init_regeneration → regenerate; conventional implementations
/// delegate the regeneration pair to the same logic as the first pair.
#[async_trait]
pub trait Process: Send + Sync {
    /// Name shown in stage labels and host listings.
    fn display_name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    fn set_enabled(&mut self, enabled: bool);

    /// Whether suffix regeneration may re-run this process.
    fn can_be_regenerated(&self) -> bool {
        true
    }

    /// Phase-1 step: bind data and prepare state. Runs for every selected
    /// process before any process generates.
    async fn initialize(
        &mut self,
        data: SharedData,
        handle: PipelineHandle,
        token: CancellationToken,
    ) -> PipelineResult<()>;

    /// Phase-2 step: perform this process's generation work.
    async fn generate(
        &mut self,
        progress: Arc<dyn ProgressReporter>,
        token: CancellationToken,
    ) -> PipelineResult<()>;

    /// Phase-1 step of a regeneration run.
    async fn init_regeneration(&mut self, token: CancellationToken) -> PipelineResult<()>;

    /// Phase-2 step of a regeneration run.
    async fn regenerate(
        &mut self,
        progress: Arc<dyn ProgressReporter>,
        token: CancellationToken,
    ) -> PipelineResult<()>;
}

/// Cloneable handle a process receives at initialization, exposing the
/// pipeline state a process is allowed to observe.
#[derive(Clone)]
pub struct PipelineHandle {
    generating: Arc<AtomicBool>,
    token: CancellationToken,
}

impl PipelineHandle {
    pub(crate) fn new(generating: Arc<AtomicBool>, token: CancellationToken) -> Self {
        PipelineHandle { generating, token }
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    /// The cancellation token linked to the current run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

struct RunState {
    slices: RunSlices,
    progress: Arc<dyn ProgressReporter>,
    token: CancellationToken,
}

/// Reusable body for processes whose work is a layer container.
///
/// Lifecycle within one generate/regenerate step:
/// [`begin_run`](Self::begin_run), then [`execute_layers`](Self::execute_layers)
/// once per declared execution (with a fresh per-iteration context each time),
/// then [`finish_run`](Self::finish_run). [`generate_with_layers`](Self::generate_with_layers)
/// bundles the three for the single-execution case.
pub struct ProcessCore {
    name: String,
    layers: LayerSet,
    runner: LayerRunner,
    analyzer: DependencyAnalyzer,
    data: Option<SharedData>,
    run: Option<RunState>,
}

impl ProcessCore {
    pub fn new(name: impl Into<String>, layers: LayerSet) -> Self {
        ProcessCore {
            name: name.into(),
            layers,
            runner: LayerRunner::new(),
            analyzer: DependencyAnalyzer::new(),
            data: None,
            run: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerSet {
        &mut self.layers
    }

    pub fn analyzer(&self) -> &DependencyAnalyzer {
        &self.analyzer
    }

    /// Bind the shared data store; call from `Process::initialize`.
    pub fn bind(&mut self, data: SharedData) {
        self.data = Some(data);
    }

    pub fn data(&self) -> Option<&SharedData> {
        self.data.as_ref()
    }

    /// Start one generate/regenerate step: reports 0.0, announces the stage,
    /// and allocates `total_executes` progress slices.
    pub fn begin_run(
        &mut self,
        progress: Arc<dyn ProgressReporter>,
        token: CancellationToken,
        total_executes: u32,
    ) -> PipelineResult<()> {
        let slices = RunSlices::new(total_executes, &self.name)?;
        progress.report(0.0);
        progress.update_stage(&format!("Generate {}...", self.name));
        tracing::debug!(process = %self.name, "starting generation");
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        self.run = Some(RunState {
            slices,
            progress,
            token,
        });
        Ok(())
    }

    /// Execute the layer container against `context` (or a fresh context over
    /// the bound data when `None`).
    ///
    /// Raises before any layer runs when the container is structurally
    /// invalid, a declared dependency is missing, or a stored value fails its
    /// own validation.
    pub async fn execute_layers(&mut self, context: Option<LayerContext>) -> PipelineResult<()> {
        let data = self.data.clone().ok_or_else(|| {
            PipelineError::Config(format!(
                "[{}] no data store bound; call bind() during initialize",
                self.name
            ))
        })?;
        let context = match context {
            Some(context) => context,
            None => LayerContext::new(data.clone()),
        };

        self.layers
            .validate()
            .map_err(|reason| PipelineError::InvalidLayerSet {
                process: self.name.clone(),
                reason,
            })?;

        {
            let store = data.read();
            let report = self.analyzer.analyze(&self.layers, &store, &context);
            if !report.is_satisfied() {
                return Err(PipelineError::MissingDependencies {
                    process: self.name.clone(),
                    layer: report.unit_name.unwrap_or_default(),
                    kind: if report.requires_context {
                        DependencyKind::Context
                    } else {
                        DependencyKind::Data
                    },
                    missing: report.missing,
                });
            }
            if let Err(key) = store.validate_values() {
                return Err(PipelineError::InvalidData {
                    process: self.name.clone(),
                    reason: format!("stored value failed validation: {}", key.short_name()),
                });
            }
        }

        let run = self.run.as_mut().ok_or_else(|| {
            PipelineError::Config(format!(
                "[{}] execute_layers called outside begin_run/finish_run",
                self.name
            ))
        })?;

        self.runner
            .execute(
                &mut self.layers,
                &context,
                &mut run.slices,
                &run.progress,
                &run.token,
            )
            .await
    }

    /// Finish the step: reports 1.0 and the completed stage.
    pub fn finish_run(&mut self) {
        if let Some(run) = self.run.take() {
            run.progress.report(1.0);
            run.progress
                .update_stage(&format!("Generate {} completed", self.name));
            tracing::debug!(process = %self.name, "generation completed");
        }
    }

    /// Abort the step after cancellation: resets progress and reports the
    /// cancelled stage.
    pub fn abort_run(&mut self, operation: &str) {
        if let Some(run) = self.run.take() {
            tracing::info!(process = %self.name, operation, "cancelled");
            run.progress.report(0.0);
            run.progress
                .update_stage(&format!("{} {} cancelled", self.name, operation));
        }
    }

    /// begin → execute once → finish, for processes with a single layer pass.
    pub async fn generate_with_layers(
        &mut self,
        progress: Arc<dyn ProgressReporter>,
        token: CancellationToken,
    ) -> PipelineResult<()> {
        self.begin_run(progress, token, 1)?;
        match self.execute_layers(None).await {
            Ok(()) => {
                self.finish_run();
                Ok(())
            }
            Err(PipelineError::Cancelled) => {
                self.abort_run("generation");
                Err(PipelineError::Cancelled)
            }
            Err(error) => {
                self.run = None;
                Err(error)
            }
        }
    }
}
