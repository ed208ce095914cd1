//! Shared test doubles: spy processes, counting layers, recording observers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use stagegen::{
    DataPersister, Layer, LayerContext, LayerError, LayerSet, PipelineError, PipelineHandle,
    PipelineResult, Process, ProcessCore, ProgressReporter, SharedData, StoreValue, TypeKey,
    TypedStore,
};

// --- Store types ---

#[derive(Debug, PartialEq)]
pub struct Blueprint {
    pub floors: u32,
}

impl StoreValue for Blueprint {
    fn validate(&self) -> bool {
        self.floors > 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FloorContext {
    pub index: u32,
    pub total: u32,
}

impl StoreValue for FloorContext {
    fn validate(&self) -> bool {
        self.index < self.total
    }
}

pub fn empty_data() -> SharedData {
    TypedStore::new().into_shared()
}

// --- Observers ---

#[derive(Default)]
pub struct RecordingProgress {
    pub values: Mutex<Vec<f32>>,
    pub stages: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last_value(&self) -> Option<f32> {
        self.values.lock().last().copied()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, value: f32) {
        self.values.lock().push(value);
    }

    fn update_stage(&self, stage: &str) {
        self.stages.lock().push(stage.to_string());
    }
}

#[derive(Default)]
pub struct RecordingPersister {
    pub calls: AtomicU32,
}

impl RecordingPersister {
    pub fn count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Local handle so the recorder can be shared with the test while the
/// pipeline owns its boxed persister.
pub struct PersisterHandle(pub Arc<RecordingPersister>);

impl DataPersister for PersisterHandle {
    fn persist(&self, _data: &TypedStore) {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
    }
}

// --- Layers ---

pub struct CountingLayer {
    pub name: String,
    pub enabled: bool,
    pub counter: Arc<AtomicU32>,
    pub log: Option<Arc<Mutex<Vec<String>>>>,
    pub required: Vec<TypeKey>,
}

impl CountingLayer {
    pub fn new(name: impl Into<String>, counter: Arc<AtomicU32>) -> Self {
        CountingLayer {
            name: name.into(),
            enabled: true,
            counter,
            log: None,
            required: Vec::new(),
        }
    }

    pub fn with_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn requiring(mut self, key: TypeKey) -> Self {
        self.required.push(key);
        self
    }

    fn record(&self, step: &str) {
        if let Some(log) = &self.log {
            log.lock().push(format!("{step}:{}", self.name));
        }
    }
}

#[async_trait]
impl Layer for CountingLayer {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn required_data(&self) -> Vec<TypeKey> {
        self.required.clone()
    }

    async fn init(&mut self, _context: &LayerContext) -> Result<(), LayerError> {
        self.record("init");
        Ok(())
    }

    async fn generate(&mut self, _context: &LayerContext) -> Result<(), LayerError> {
        self.counter.fetch_add(1, Ordering::SeqCst);
        self.record("gen");
        Ok(())
    }
}

pub struct FailingLayer {
    pub name: String,
}

#[async_trait]
impl Layer for FailingLayer {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn set_enabled(&mut self, _enabled: bool) {}

    async fn generate(&mut self, _context: &LayerContext) -> Result<(), LayerError> {
        Err(LayerError::execution("deliberate failure"))
    }
}

// --- Processes ---

/// Process recording every lifecycle call into a shared log, with optional
/// hold points for cancellation and single-flight tests.
pub struct SpyProcess {
    pub name: String,
    pub enabled: bool,
    pub regenerable: bool,
    pub log: Arc<Mutex<Vec<String>>>,
    /// When set, `generate` waits for this notification before returning.
    pub gate: Option<Arc<Notify>>,
    /// When set, notified as soon as the held step begins.
    pub started: Option<Arc<Notify>>,
    /// Wait for cancellation inside `initialize` and abort there.
    pub hold_in_init: bool,
    /// Wait for cancellation inside `generate` and abort there.
    pub hold_in_generate: bool,
    /// When set together with `hold_in_generate`, the observed cancellation
    /// is not surfaced until this notification arrives, keeping the run in
    /// its unwind window.
    pub release: Option<Arc<Notify>>,
}

impl SpyProcess {
    pub fn new(name: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        SpyProcess {
            name: name.into(),
            enabled: true,
            regenerable: true,
            log,
            gate: None,
            started: None,
            hold_in_init: false,
            hold_in_generate: false,
            release: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn not_regenerable(mut self) -> Self {
        self.regenerable = false;
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn announcing(mut self, started: Arc<Notify>) -> Self {
        self.started = Some(started);
        self
    }

    pub fn holding_in_init(mut self) -> Self {
        self.hold_in_init = true;
        self
    }

    pub fn holding_in_generate(mut self) -> Self {
        self.hold_in_generate = true;
        self
    }

    pub fn released_by(mut self, release: Arc<Notify>) -> Self {
        self.release = Some(release);
        self
    }

    fn record(&self, step: &str) {
        self.log.lock().push(format!("{step}:{}", self.name));
    }

    fn announce(&self) {
        if let Some(started) = &self.started {
            started.notify_one();
        }
    }
}

#[async_trait]
impl Process for SpyProcess {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn can_be_regenerated(&self) -> bool {
        self.regenerable
    }

    async fn initialize(
        &mut self,
        _data: SharedData,
        _handle: PipelineHandle,
        token: CancellationToken,
    ) -> PipelineResult<()> {
        self.record("init");
        if self.hold_in_init {
            self.announce();
            token.cancelled().await;
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    async fn generate(
        &mut self,
        _progress: Arc<dyn ProgressReporter>,
        token: CancellationToken,
    ) -> PipelineResult<()> {
        self.record("gen");
        self.announce();
        if self.hold_in_generate {
            token.cancelled().await;
            if let Some(release) = &self.release {
                release.notified().await;
            }
            return Err(PipelineError::Cancelled);
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(())
    }

    async fn init_regeneration(&mut self, _token: CancellationToken) -> PipelineResult<()> {
        self.record("init_regen");
        Ok(())
    }

    async fn regenerate(
        &mut self,
        _progress: Arc<dyn ProgressReporter>,
        _token: CancellationToken,
    ) -> PipelineResult<()> {
        self.record("regen");
        Ok(())
    }
}

/// Layer-driven process whose single layer bumps a counter on every
/// generation and regeneration.
pub struct CounterProcess {
    name: String,
    enabled: bool,
    regenerable: bool,
    core: ProcessCore,
}

impl CounterProcess {
    pub fn new(name: impl Into<String>, regenerable: bool, counter: Arc<AtomicU32>) -> Self {
        let name = name.into();
        let mut layers = LayerSet::new();
        layers.push(CountingLayer::new(format!("{name}Layer"), counter));
        CounterProcess {
            core: ProcessCore::new(name.clone(), layers),
            name,
            enabled: true,
            regenerable,
        }
    }

    pub fn with_layers(name: impl Into<String>, regenerable: bool, layers: LayerSet) -> Self {
        let name = name.into();
        CounterProcess {
            core: ProcessCore::new(name.clone(), layers),
            name,
            enabled: true,
            regenerable,
        }
    }
}

#[async_trait]
impl Process for CounterProcess {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn can_be_regenerated(&self) -> bool {
        self.regenerable
    }

    async fn initialize(
        &mut self,
        data: SharedData,
        _handle: PipelineHandle,
        _token: CancellationToken,
    ) -> PipelineResult<()> {
        self.core.bind(data);
        Ok(())
    }

    async fn generate(
        &mut self,
        progress: Arc<dyn ProgressReporter>,
        token: CancellationToken,
    ) -> PipelineResult<()> {
        self.core.generate_with_layers(progress, token).await
    }

    async fn init_regeneration(&mut self, _token: CancellationToken) -> PipelineResult<()> {
        Ok(())
    }

    async fn regenerate(
        &mut self,
        progress: Arc<dyn ProgressReporter>,
        token: CancellationToken,
    ) -> PipelineResult<()> {
        self.core.generate_with_layers(progress, token).await
    }
}
