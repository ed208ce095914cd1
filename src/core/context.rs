//! Per-invocation layer execution context.

use crate::core::store::{SharedData, StoreValue, TypeKey, TypedStore};

/// Execution context for one process invocation: the shared data store plus a
/// short-lived typed store of per-iteration values (e.g. which floor a layer
/// pass is generating). Built by the process, dropped when the invocation
/// ends.
pub struct LayerContext {
    data: SharedData,
    values: TypedStore,
}

impl LayerContext {
    pub fn new(data: SharedData) -> Self {
        LayerContext {
            data,
            values: TypedStore::new(),
        }
    }

    /// Builder-style [`add`](Self::add).
    pub fn with<T: StoreValue>(mut self, value: T) -> Self {
        self.add(value);
        self
    }

    /// Add a context value. Rejects (with an error log) values that fail
    /// their own validation or duplicate an already-present type.
    pub fn add<T: StoreValue>(&mut self, value: T) -> bool {
        if !value.validate() {
            tracing::error!(
                ty = TypeKey::of::<T>().short_name(),
                "context value failed validation"
            );
            return false;
        }
        self.values.try_add(value)
    }

    /// The shared data store for this generation subject.
    pub fn data(&self) -> &SharedData {
        &self.data
    }

    pub fn get<T: StoreValue>(&self) -> Option<&T> {
        self.values.get::<T>()
    }

    pub fn has<T: StoreValue>(&self) -> bool {
        self.values.has::<T>()
    }

    /// The underlying context value store (used by dependency analysis).
    pub fn store(&self) -> &TypedStore {
        &self.values
    }
}
