pub mod analyzer;
pub mod context;
pub mod events;
pub mod layer;
pub mod layer_runner;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod registry;
pub mod store;

pub use analyzer::{AnalysisReport, DependencyAnalyzer, DependencyFact};
pub use context::LayerContext;
pub use events::{event_channel, EventReceiver, EventSender, PipelineEvent, RunKind};
pub use layer::{Layer, LayerSet};
pub use layer_runner::LayerRunner;
pub use pipeline::{DataPersister, Pipeline, PipelineConfig, ProcessInfo, RunOutcome};
pub use process::{PipelineHandle, Process, ProcessCore};
pub use progress::{ProgressReporter, RunSlices, ScaledProgress, StageProgress};
pub use registry::{ProcessRegistration, ProcessRegistry};
pub use store::{SharedData, StoreValue, TypeKey, TypedStore};
