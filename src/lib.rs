//! # stagegen — staged generation pipeline orchestrator
//!
//! `stagegen` runs an ordered collection of *processes*, each composed of an
//! ordered collection of *layers*, against a shared type-keyed data store.
//! It provides:
//!
//! - **Two-phase execution**: every selected process is initialized before
//!   any process generates, then generation proceeds strictly in pipeline
//!   order.
//! - **Cooperative cancellation**: one linked cancellation token per run,
//!   checked at every step boundary.
//! - **Hierarchical progress**: a composable reporter contract where nested
//!   stages scale onto sub-ranges of their parent, so the outermost observer
//!   always sees a true aggregate value in `[0, 1]`.
//! - **Suffix regeneration**: re-run the pipeline from a chosen process
//!   onward, restricted to enabled, regenerable processes, leaving earlier
//!   processes untouched.
//! - **Static dependency validation**: layers declare the typed data and
//!   context reads they will perform; the pipeline refuses to start a layer
//!   whose requirements are not present instead of failing inside user code.
//! - **Single-flight guarding**: at most one run per pipeline instance; a
//!   concurrent request is rejected, not queued.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stagegen::{Pipeline, StageProgress, TypedStore};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = Pipeline::new();
//!     // pipeline.replace_processes(vec![...]);
//!     let data = TypedStore::new().into_shared();
//!     let progress = Arc::new(StageProgress::new(
//!         |value| println!("progress: {value:.2}"),
//!         |stage: &str| println!("stage: {stage}"),
//!     ));
//!     let outcome = pipeline
//!         .generate(data, progress, CancellationToken::new())
//!         .await
//!         .unwrap();
//!     println!("{outcome:?}");
//! }
//! ```

pub mod core;
pub mod error;

pub use core::{
    event_channel, AnalysisReport, DataPersister, DependencyAnalyzer, DependencyFact,
    EventReceiver, EventSender, Layer, LayerContext, LayerRunner, LayerSet, Pipeline,
    PipelineConfig, PipelineEvent, PipelineHandle, Process, ProcessCore, ProcessInfo,
    ProcessRegistration, ProcessRegistry, ProgressReporter, RunKind, RunOutcome, RunSlices,
    ScaledProgress, SharedData, StageProgress, StoreValue, TypeKey, TypedStore,
};
pub use error::{DependencyKind, LayerError, PipelineError, PipelineResult};
