//! The pipeline orchestrator: ordered processes, two-phase execution, linked
//! cancellation, single-flight guarding, and suffix regeneration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::events::{EventSender, PipelineEvent, RunKind};
use crate::core::process::{PipelineHandle, Process};
use crate::core::progress::{ProgressReporter, ScaledProgress};
use crate::core::store::{SharedData, TypedStore};
use crate::error::{PipelineError, PipelineResult};

/// Configuration for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Persist the data store after a successful run.
    #[serde(default = "default_true")]
    pub persist_on_success: bool,
    /// Yield to the host scheduler between process steps.
    #[serde(default = "default_true")]
    pub yield_between_steps: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            persist_on_success: true,
            yield_between_steps: true,
        }
    }
}

/// How a pipeline run ended. Cancellation and rejection are outcomes, not
/// errors: only configuration problems and layer failures surface as
/// [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every selected process completed.
    Completed,
    /// The run observed cancellation and stopped cleanly.
    Cancelled,
    /// Another run was already in flight; nothing was executed.
    Rejected,
    /// The request addressed no process (unknown index); nothing was executed.
    Skipped,
}

/// Read-only descriptor of one pipeline process, for host listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub index: usize,
    pub name: String,
    pub enabled: bool,
    pub can_be_regenerated: bool,
}

/// External persistence collaborator, invoked only after a successful run.
pub trait DataPersister: Send + Sync {
    fn persist(&self, data: &TypedStore);
}

enum RunRequest {
    Full { data: SharedData },
    Regeneration { index: usize },
}

enum RunMode {
    Full {
        data: SharedData,
        handle: PipelineHandle,
    },
    Regeneration,
}

/// Staged generation pipeline.
///
/// Owns the ordered process list and drives the two-phase protocol: phase 1
/// initializes every selected process in order, phase 2 generates each one in
/// order inside a scaled progress sub-range. At most one run is in flight per
/// pipeline instance; a concurrent request is rejected, not queued.
pub struct Pipeline {
    processes: tokio::sync::Mutex<Vec<Box<dyn Process>>>,
    descriptors: parking_lot::Mutex<Vec<ProcessInfo>>,
    /// Host-visible flag; cleared by `cancel_generation` before the run has
    /// observed the token.
    generating: Arc<AtomicBool>,
    /// Single-flight gate owned by the run itself: set when a request is
    /// admitted, cleared only by that run's epilogue. Stays set while a
    /// cancelled run unwinds, so late requests are still rejected.
    in_flight: AtomicBool,
    current_cancel: parking_lot::Mutex<Option<CancellationToken>>,
    last_data: parking_lot::Mutex<Option<SharedData>>,
    persister: Option<Box<dyn DataPersister>>,
    events: Option<EventSender>,
    config: PipelineConfig,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Pipeline {
            processes: tokio::sync::Mutex::new(Vec::new()),
            descriptors: parking_lot::Mutex::new(Vec::new()),
            generating: Arc::new(AtomicBool::new(false)),
            in_flight: AtomicBool::new(false),
            current_cancel: parking_lot::Mutex::new(None),
            last_data: parking_lot::Mutex::new(None),
            persister: None,
            events: None,
            config,
        }
    }

    pub fn with_persister(mut self, persister: Box<dyn DataPersister>) -> Self {
        self.persister = Some(persister);
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the ordered process list. Rejected (with a warning) while a
    /// run is in flight.
    pub fn replace_processes(&self, processes: Vec<Box<dyn Process>>) -> bool {
        if self.is_generating() {
            tracing::warn!("process list not replaced: a run is in flight");
            return false;
        }
        match self.processes.try_lock() {
            Ok(mut guard) => {
                *guard = processes;
                self.refresh_descriptors(&guard);
                true
            }
            Err(_) => {
                tracing::warn!("process list not replaced: pipeline is busy");
                false
            }
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    /// Descriptor snapshot of the process list (cached while a run holds the
    /// list).
    pub fn process_info(&self) -> Vec<ProcessInfo> {
        if let Ok(processes) = self.processes.try_lock() {
            self.refresh_descriptors(&processes);
        }
        self.descriptors.lock().clone()
    }

    /// The cancellation token of the in-flight run, or a fresh inert token
    /// when idle.
    pub fn current_cancellation_token(&self) -> CancellationToken {
        self.current_cancel
            .lock()
            .clone()
            .unwrap_or_default()
    }

    /// Run every enabled process through the two-phase protocol against
    /// `data`.
    pub async fn generate(
        &self,
        data: SharedData,
        progress: Arc<dyn ProgressReporter>,
        token: CancellationToken,
    ) -> PipelineResult<RunOutcome> {
        self.request(RunRequest::Full { data }, progress, token)
            .await
    }

    /// Re-run the pipeline suffix starting at `index`, restricted to
    /// processes that are enabled and regenerable. Earlier processes are
    /// untouched.
    pub async fn request_regeneration(
        &self,
        index: usize,
        progress: Arc<dyn ProgressReporter>,
        token: CancellationToken,
    ) -> PipelineResult<RunOutcome> {
        self.request(RunRequest::Regeneration { index }, progress, token)
            .await
    }

    /// Cancel the in-flight run, if any.
    ///
    /// [`is_generating`](Self::is_generating) reads `false` immediately,
    /// before the running task has observed the cancellation. The run still
    /// holds its single-flight gate until it finishes unwinding, so requests
    /// arriving in that window are rejected, not queued.
    pub fn cancel_generation(&self) {
        if self.is_generating() {
            tracing::info!("pipeline cancelling");
            if let Some(token) = self.current_cancel.lock().take() {
                token.cancel();
            }
            self.generating.store(false, Ordering::SeqCst);
        }
    }

    async fn request(
        &self,
        request: RunRequest,
        progress: Arc<dyn ProgressReporter>,
        token: CancellationToken,
    ) -> PipelineResult<RunOutcome> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::error!("generation requested while another run is in flight");
            return Ok(RunOutcome::Rejected);
        }
        self.generating.store(true, Ordering::SeqCst);

        let run_id = uuid::Uuid::new_v4().to_string();
        let kind = match &request {
            RunRequest::Full { .. } => RunKind::Full,
            RunRequest::Regeneration { .. } => RunKind::Regeneration,
        };
        let linked = token.child_token();
        *self.current_cancel.lock() = Some(linked.clone());
        self.emit(PipelineEvent::RunStarted {
            run_id: run_id.clone(),
            kind,
            timestamp: Utc::now(),
        });

        let result = self.run(request, &progress, &linked).await;

        *self.current_cancel.lock() = None;
        self.generating.store(false, Ordering::SeqCst);
        // Release the gate last: only now may a successor be admitted.
        self.in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(RunOutcome::Completed) => {
                self.persist();
                tracing::info!(run_id = %run_id, "generation completed");
                self.emit(PipelineEvent::RunCompleted {
                    run_id,
                    timestamp: Utc::now(),
                });
                Ok(RunOutcome::Completed)
            }
            Ok(outcome) => Ok(outcome),
            Err(PipelineError::Cancelled) => {
                tracing::info!(run_id = %run_id, "generation cancelled");
                progress.update_stage("Generation cancelled");
                self.emit(PipelineEvent::RunCancelled {
                    run_id,
                    timestamp: Utc::now(),
                });
                Ok(RunOutcome::Cancelled)
            }
            Err(error) => {
                tracing::error!(run_id = %run_id, error = %error, "generation failed");
                self.emit(PipelineEvent::RunFailed {
                    run_id,
                    error: error.to_string(),
                    timestamp: Utc::now(),
                });
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        request: RunRequest,
        progress: &Arc<dyn ProgressReporter>,
        token: &CancellationToken,
    ) -> PipelineResult<RunOutcome> {
        let mut processes = self.processes.lock().await;
        self.refresh_descriptors(&processes);

        let (selected, mode) = match request {
            RunRequest::Full { data } => {
                *self.last_data.lock() = Some(data.clone());
                let selected: Vec<usize> = processes
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.is_enabled())
                    .map(|(i, _)| i)
                    .collect();
                let handle = PipelineHandle::new(self.generating.clone(), token.clone());
                (selected, RunMode::Full { data, handle })
            }
            RunRequest::Regeneration { index } => {
                if index >= processes.len() {
                    tracing::warn!(index, "regeneration requested for unknown process");
                    return Ok(RunOutcome::Skipped);
                }
                let selected: Vec<usize> = processes
                    .iter()
                    .enumerate()
                    .skip(index)
                    .filter(|(_, p)| p.is_enabled() && p.can_be_regenerated())
                    .map(|(i, _)| i)
                    .collect();
                (selected, RunMode::Regeneration)
            }
        };

        self.run_two_phase(&mut processes, &selected, &mode, progress, token)
            .await?;
        Ok(RunOutcome::Completed)
    }

    async fn run_two_phase(
        &self,
        processes: &mut [Box<dyn Process>],
        selected: &[usize],
        mode: &RunMode,
        progress: &Arc<dyn ProgressReporter>,
        token: &CancellationToken,
    ) -> PipelineResult<()> {
        if selected.is_empty() {
            progress.report(1.0);
            return Ok(());
        }

        let total_steps = selected.len() * 2;
        let mut step = 0usize;

        // Phase 1: initialize every selected process before any generates.
        for &index in selected {
            if token.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let process = &mut processes[index];
            progress.update_stage(&format!("Initializing {}...", process.display_name()));
            self.maybe_yield().await;
            match mode {
                RunMode::Full { data, handle } => {
                    process
                        .initialize(data.clone(), handle.clone(), token.clone())
                        .await?;
                }
                RunMode::Regeneration => {
                    process.init_regeneration(token.clone()).await?;
                }
            }
            step += 1;
            progress.report(step as f32 / total_steps as f32);
        }

        // Phase 2: generate in order, each wrapped in its progress sub-range.
        for &index in selected {
            if token.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let process = &mut processes[index];
            let name = process.display_name().to_string();
            let sub: Arc<dyn ProgressReporter> = Arc::new(ScaledProgress::new(
                Arc::clone(progress),
                step as f32 / total_steps as f32,
                (step + 1) as f32 / total_steps as f32,
            ));
            self.emit(PipelineEvent::ProcessStarted {
                process: name.clone(),
                timestamp: Utc::now(),
            });
            let result = match mode {
                RunMode::Full { .. } => process.generate(sub, token.clone()).await,
                RunMode::Regeneration => process.regenerate(sub, token.clone()).await,
            };
            match result {
                Ok(()) => {
                    self.emit(PipelineEvent::ProcessFinished {
                        process: name,
                        timestamp: Utc::now(),
                    });
                }
                Err(error) => {
                    if !matches!(error, PipelineError::Cancelled) {
                        self.emit(PipelineEvent::ProcessFailed {
                            process: name,
                            error: error.to_string(),
                            timestamp: Utc::now(),
                        });
                    }
                    return Err(error);
                }
            }
            step += 1;
            progress.report(step as f32 / total_steps as f32);
            self.maybe_yield().await;
        }

        Ok(())
    }

    async fn maybe_yield(&self) {
        if self.config.yield_between_steps {
            tokio::task::yield_now().await;
        }
    }

    fn persist(&self) {
        if !self.config.persist_on_success {
            return;
        }
        if let Some(persister) = &self.persister {
            if let Some(data) = self.last_data.lock().as_ref() {
                persister.persist(&data.read());
            }
        }
    }

    fn refresh_descriptors(&self, processes: &[Box<dyn Process>]) {
        let mut descriptors = self.descriptors.lock();
        *descriptors = processes
            .iter()
            .enumerate()
            .map(|(index, p)| ProcessInfo {
                index,
                name: p.display_name().to_string(),
                enabled: p.is_enabled(),
                can_be_regenerated: p.can_be_regenerated(),
            })
            .collect();
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert!(config.persist_on_success);
        assert!(config.yield_between_steps);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert!(config.persist_on_success);
        let config: PipelineConfig =
            serde_json::from_str(r#"{"persist_on_success": false}"#).unwrap();
        assert!(!config.persist_on_success);
        assert!(config.yield_between_steps);
    }

    #[test]
    fn test_idle_pipeline_state() {
        let pipeline = Pipeline::new();
        assert!(!pipeline.is_generating());
        assert!(pipeline.process_info().is_empty());
        assert!(!pipeline.current_cancellation_token().is_cancelled());
        // Cancelling an idle pipeline is a no-op.
        pipeline.cancel_generation();
        assert!(!pipeline.is_generating());
    }
}
