//! Type-keyed heterogeneous value store.
//!
//! [`TypedStore`] holds at most one value per concrete type. The same
//! container backs two roles: the long-lived data store shared by every
//! process of a generation subject, and the short-lived context built for a
//! single process invocation (see [`LayerContext`](crate::core::LayerContext)).
//!
//! No internal locking: the pipeline's single-flight invariant guarantees a
//! single writer at a time. The shared handle type [`SharedData`] wraps the
//! store in an `RwLock` only so the host can read between runs.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Token pairing a [`TypeId`] with the static type name, used as the store
/// key and in dependency declarations and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        TypeKey {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully-qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without module path or generic arguments, for user-facing
    /// messages.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

/// Marker trait for values kept in a [`TypedStore`].
///
/// `validate` is checked when the value is added to a context and again
/// before every process step runs against the data store.
pub trait StoreValue: Any + Send + Sync {
    fn validate(&self) -> bool {
        true
    }
}

struct Entry {
    key: TypeKey,
    value: Box<dyn Any + Send + Sync>,
    check: fn(&(dyn Any + Send + Sync)) -> bool,
}

/// Heterogeneous container with at most one value per type.
#[derive(Default)]
pub struct TypedStore {
    entries: HashMap<TypeId, Entry>,
}

impl TypedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the store in the shared handle processes receive.
    pub fn into_shared(self) -> SharedData {
        Arc::new(RwLock::new(self))
    }

    /// Add a value. Returns `false` (and leaves the store untouched) when a
    /// value of the same type is already present.
    pub fn try_add<T: StoreValue>(&mut self, value: T) -> bool {
        let key = TypeKey::of::<T>();
        if self.entries.contains_key(&key.id()) {
            tracing::warn!(ty = key.short_name(), "value of this type already stored");
            return false;
        }
        self.entries.insert(
            key.id(),
            Entry {
                key,
                value: Box::new(value),
                check: |v| v.downcast_ref::<T>().map_or(false, StoreValue::validate),
            },
        );
        true
    }

    pub fn get<T: StoreValue>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|e| e.value.downcast_ref::<T>())
    }

    pub fn get_mut<T: StoreValue>(&mut self) -> Option<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|e| e.value.downcast_mut::<T>())
    }

    pub fn has<T: StoreValue>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Keys of every stored value, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.entries.values().map(|e| e.key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Check that every required type is present, reporting the first missing
    /// key.
    pub fn validate_required(&self, required: &[TypeKey]) -> Result<(), TypeKey> {
        for key in required {
            if !self.entries.contains_key(&key.id()) {
                tracing::error!(ty = key.short_name(), "required data type missing");
                return Err(*key);
            }
        }
        Ok(())
    }

    /// Run every stored value's own validation, reporting the first failure.
    pub fn validate_values(&self) -> Result<(), TypeKey> {
        for entry in self.entries.values() {
            if !(entry.check)(entry.value.as_ref()) {
                tracing::error!(ty = entry.key.short_name(), "stored value failed validation");
                return Err(entry.key);
            }
        }
        Ok(())
    }
}

/// Shared handle to the long-lived data store.
pub type SharedData = Arc<RwLock<TypedStore>>;
