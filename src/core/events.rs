//! Pipeline events, delivered over an unbounded channel to an optional host
//! listener (UI, logging, persistence triggers). Emission never blocks a run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Which operation a run event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Full,
    Regeneration,
}

/// Events emitted over the course of a pipeline run.
#[derive(Clone, Debug, Serialize)]
pub enum PipelineEvent {
    RunStarted {
        run_id: String,
        kind: RunKind,
        timestamp: DateTime<Utc>,
    },
    ProcessStarted {
        process: String,
        timestamp: DateTime<Utc>,
    },
    ProcessFinished {
        process: String,
        timestamp: DateTime<Utc>,
    },
    ProcessFailed {
        process: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        run_id: String,
        timestamp: DateTime<Utc>,
    },
    RunCancelled {
        run_id: String,
        timestamp: DateTime<Utc>,
    },
    RunFailed {
        run_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PipelineEvent>;

/// Create an event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
