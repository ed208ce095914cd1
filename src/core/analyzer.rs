//! Static dependency validation for layer containers.
//!
//! Before a process executes its layers, the analyzer proves that the data
//! store and the context will satisfy every typed read the layers declare,
//! without running any layer logic. Layers declare their reads through
//! [`Layer::required_data`] and [`Layer::required_context`]; the per-type
//! result is cached so a layer type is only inspected once until the cache is
//! invalidated (e.g. after hot-reloading layer sets).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::context::LayerContext;
use crate::core::layer::{Layer, LayerSet};
use crate::core::store::{TypeKey, TypedStore};

/// Cached dependency facts for one concrete layer type.
#[derive(Debug, Clone)]
pub struct DependencyFact {
    pub uses_context: bool,
    pub required_data: Vec<TypeKey>,
    pub required_context: Vec<TypeKey>,
}

/// Result of analyzing a layer container against a data store and context.
///
/// `missing` is empty when every declared requirement is satisfied; otherwise
/// it lists exactly the types absent from the data store
/// (`requires_context == false`) or from the context (`true`), and
/// `unit_name` names the first unsatisfied layer.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub requires_context: bool,
    pub unit_name: Option<String>,
    pub missing: Vec<String>,
}

impl AnalysisReport {
    pub fn satisfied() -> Self {
        AnalysisReport {
            requires_context: false,
            unit_name: None,
            missing: Vec::new(),
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Analyzer with a per-layer-type fact cache.
#[derive(Default)]
pub struct DependencyAnalyzer {
    cache: RwLock<HashMap<TypeId, Arc<DependencyFact>>>,
}

impl DependencyAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dependency facts for one layer, computed once per concrete type.
    pub fn fact_for(&self, layer: &dyn Layer) -> Arc<DependencyFact> {
        let key = Any::type_id(layer);
        if let Some(fact) = self.cache.read().get(&key) {
            return Arc::clone(fact);
        }
        let fact = Arc::new(DependencyFact {
            uses_context: layer.uses_context(),
            required_data: layer.required_data(),
            required_context: layer.required_context(),
        });
        self.cache.write().insert(key, Arc::clone(&fact));
        fact
    }

    /// Validate every active layer of `layers` against `data` and `context`,
    /// stopping at the first unsatisfied layer.
    pub fn analyze(
        &self,
        layers: &LayerSet,
        data: &TypedStore,
        context: &LayerContext,
    ) -> AnalysisReport {
        for layer in layers.active() {
            let fact = self.fact_for(layer);

            if !fact.required_data.is_empty() {
                let missing: Vec<String> = fact
                    .required_data
                    .iter()
                    .filter(|key| !data.contains(key.id()))
                    .map(|key| key.short_name().to_string())
                    .collect();
                if !missing.is_empty() {
                    return AnalysisReport {
                        requires_context: false,
                        unit_name: Some(layer.display_name().to_string()),
                        missing,
                    };
                }
            }

            if fact.uses_context && !fact.required_context.is_empty() {
                let missing: Vec<String> = fact
                    .required_context
                    .iter()
                    .filter(|key| !context.store().contains(key.id()))
                    .map(|key| key.short_name().to_string())
                    .collect();
                if !missing.is_empty() {
                    return AnalysisReport {
                        requires_context: true,
                        unit_name: Some(layer.display_name().to_string()),
                        missing,
                    };
                }
            }
        }
        AnalysisReport::satisfied()
    }

    /// Drop every cached fact. Call after layer implementations change.
    pub fn invalidate(&self) {
        self.cache.write().clear();
    }

    pub fn cached_facts(&self) -> usize {
        self.cache.read().len()
    }
}
