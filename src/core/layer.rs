//! Layer units and their ordered container.

use std::any::Any;

use async_trait::async_trait;

use crate::core::context::LayerContext;
use crate::core::store::TypeKey;
use crate::error::LayerError;

/// One unit of work within a process, executed in container order against a
/// shared [`LayerContext`].
///
/// The typed reads a layer performs are declared statically through
/// [`required_data`](Layer::required_data) and
/// [`required_context`](Layer::required_context); the
/// [`DependencyAnalyzer`](crate::core::DependencyAnalyzer) uses those
/// declarations to refuse execution before the layer would fail on an absent
/// value.
#[async_trait]
pub trait Layer: Any + Send + Sync {
    fn display_name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    fn set_enabled(&mut self, enabled: bool);

    /// Data store types this layer reads during generation.
    fn required_data(&self) -> Vec<TypeKey> {
        Vec::new()
    }

    /// Context types this layer reads during init/generation.
    fn required_context(&self) -> Vec<TypeKey> {
        Vec::new()
    }

    fn uses_context(&self) -> bool {
        !self.required_context().is_empty()
    }

    /// Called once before `generate`, with the context for this execution.
    async fn init(&mut self, context: &LayerContext) -> Result<(), LayerError> {
        let _ = context;
        Ok(())
    }

    /// Perform the layer's generation work.
    async fn generate(&mut self, context: &LayerContext) -> Result<(), LayerError>;
}

/// Ordered layer container owned by a process.
#[derive(Default)]
pub struct LayerSet {
    layers: Vec<Box<dyn Layer>>,
}

impl LayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_layers(layers: Vec<Box<dyn Layer>>) -> Self {
        LayerSet { layers }
    }

    pub fn push<L: Layer + 'static>(&mut self, layer: L) -> &mut Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Layer> {
        self.layers.iter().map(|l| l.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut dyn Layer> {
        self.layers.get_mut(index).map(|l| l.as_mut())
    }

    /// Enabled layers, in container order.
    pub fn active(&self) -> impl Iterator<Item = &dyn Layer> {
        self.iter().filter(|l| l.is_enabled())
    }

    /// Indices of enabled layers, in container order.
    pub fn active_indices(&self) -> Vec<usize> {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_enabled())
            .map(|(i, _)| i)
            .collect()
    }

    /// Structural validation: the container must hold at least one layer and
    /// at least one of them must be active.
    pub fn validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("layer list is empty".to_string());
        }
        if self.active_indices().is_empty() {
            return Err("no active layers found".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedLayer {
        name: &'static str,
        enabled: bool,
    }

    #[async_trait]
    impl Layer for NamedLayer {
        fn display_name(&self) -> &str {
            self.name
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }

        async fn generate(&mut self, _context: &LayerContext) -> Result<(), LayerError> {
            Ok(())
        }
    }

    #[test]
    fn test_active_preserves_order() {
        let mut layers = LayerSet::new();
        layers
            .push(NamedLayer {
                name: "walls",
                enabled: true,
            })
            .push(NamedLayer {
                name: "windows",
                enabled: false,
            })
            .push(NamedLayer {
                name: "roof",
                enabled: true,
            });
        let names: Vec<&str> = layers.active().map(|l| l.display_name()).collect();
        assert_eq!(names, vec!["walls", "roof"]);
        assert_eq!(layers.active_indices(), vec![0, 2]);
    }

    #[test]
    fn test_validate_empty() {
        let layers = LayerSet::new();
        assert_eq!(layers.validate().unwrap_err(), "layer list is empty");
    }

    #[test]
    fn test_validate_no_active() {
        let mut layers = LayerSet::new();
        layers.push(NamedLayer {
            name: "walls",
            enabled: false,
        });
        assert_eq!(layers.validate().unwrap_err(), "no active layers found");
        layers.get_mut(0).unwrap().set_enabled(true);
        assert!(layers.validate().is_ok());
    }
}
