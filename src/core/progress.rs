//! Composable progress reporting.
//!
//! Progress flows through a single two-operation contract,
//! [`ProgressReporter`]: a numeric value in `[0, 1]` and a textual stage
//! label. [`ScaledProgress`] maps a child's `[0, 1]` onto a sub-range of its
//! parent so that nesting (pipeline → process → layer) always leaves the
//! outermost observer with a true aggregate value.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{PipelineError, PipelineResult};

/// Progress observer contract.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress value in `[0, 1]`.
    fn report(&self, value: f32);

    /// Update the current stage label.
    fn update_stage(&self, stage: &str);
}

type ProgressCallback = Box<dyn Fn(f32) + Send + Sync>;
type StageCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Root [`ProgressReporter`] holding observer callbacks and the last reported
/// state.
pub struct StageProgress {
    on_progress: ProgressCallback,
    on_stage: Option<StageCallback>,
    state: Mutex<(f32, String)>,
}

impl StageProgress {
    pub fn new(
        on_progress: impl Fn(f32) + Send + Sync + 'static,
        on_stage: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        StageProgress {
            on_progress: Box::new(on_progress),
            on_stage: Some(Box::new(on_stage)),
            state: Mutex::new((0.0, String::new())),
        }
    }

    /// A reporter that records state but notifies nobody.
    pub fn noop() -> Self {
        StageProgress {
            on_progress: Box::new(|_| {}),
            on_stage: None,
            state: Mutex::new((0.0, String::new())),
        }
    }

    pub fn current_progress(&self) -> f32 {
        self.state.lock().0
    }

    pub fn current_stage(&self) -> String {
        self.state.lock().1.clone()
    }
}

impl ProgressReporter for StageProgress {
    fn report(&self, value: f32) {
        let clamped = value.clamp(0.0, 1.0);
        self.state.lock().0 = clamped;
        (self.on_progress)(clamped);
    }

    fn update_stage(&self, stage: &str) {
        self.state.lock().1 = stage.to_string();
        if let Some(on_stage) = &self.on_stage {
            on_stage(stage);
        }
    }
}

/// Child reporter scaled onto `[from, to]` of its parent. Stage labels pass
/// through unchanged.
pub struct ScaledProgress {
    parent: Arc<dyn ProgressReporter>,
    from: f32,
    to: f32,
}

impl ScaledProgress {
    pub fn new(parent: Arc<dyn ProgressReporter>, from: f32, to: f32) -> Self {
        ScaledProgress {
            parent,
            from: from.clamp(0.0, 1.0),
            to: to.clamp(0.0, 1.0),
        }
    }
}

impl ProgressReporter for ScaledProgress {
    fn report(&self, value: f32) {
        self.parent
            .report(self.from + (self.to - self.from) * value);
    }

    fn update_stage(&self, stage: &str) {
        self.parent.update_stage(stage);
    }
}

/// Per-process execution budget: divides `[0, 1]` into `total` equal slices
/// handed out in order, one per `execute_layers` call.
///
/// Requesting more slices than declared is a misconfiguration of the owning
/// process (its `total_executes` did not match the number of executions) and
/// surfaces immediately as an error.
pub struct RunSlices {
    process_name: String,
    total: u32,
    current: u32,
}

impl RunSlices {
    pub fn new(total: u32, process_name: impl Into<String>) -> PipelineResult<Self> {
        let process_name = process_name.into();
        if total == 0 {
            return Err(PipelineError::Config(format!(
                "[{process_name}] total executions must be positive"
            )));
        }
        Ok(RunSlices {
            process_name,
            total,
            current: 0,
        })
    }

    /// Claim the next `(from, to)` progress range.
    pub fn next_slice(&mut self) -> PipelineResult<(f32, f32)> {
        if self.current >= self.total {
            return Err(PipelineError::SliceBudgetExceeded {
                process: self.process_name.clone(),
                requested: self.current + 1,
                total: self.total,
            });
        }
        self.current += 1;
        let step = 1.0 / self.total as f32;
        Ok(((self.current - 1) as f32 * step, self.current as f32 * step))
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_completed(&self) -> bool {
        self.current == self.total
    }

    pub fn label(&self) -> &str {
        &self.process_name
    }
}
