//! Name-keyed registry owning the inference models.

use std::collections::BTreeMap;
use std::path::Path;

use burn::prelude::*;

use super::model::Model;

/// Owns a set of models keyed by name; dropping the set drops every model.
#[derive(Debug)]
pub struct ModelSet<B: Backend> {
    models: BTreeMap<String, Model<B>>,
}

impl<B: Backend> Default for ModelSet<B> {
    fn default() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }
}

impl<B: Backend> ModelSet<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model under its name. A collision silently replaces the
    /// previous model; callers are expected to register each name once.
    pub fn add(&mut self, model: Model<B>) {
        self.models.insert(model.name().to_string(), model);
    }

    pub fn get(&self, name: &str) -> Option<&Model<B>> {
        self.models.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Model<B>> {
        self.models.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Loads every registered model from `folder`, bubbling each model's
    /// fatal-error behavior.
    pub fn load_all(&mut self, folder: &Path, allow_missing: bool) {
        for model in self.models.values_mut() {
            model.load(folder, allow_missing);
        }
    }

    /// Writes every registered model into `folder`.
    pub fn save_all(&self, folder: &Path) {
        for model in self.models.values() {
            model.save(folder);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::config::{ModelConfig, PartialModelConfig};

    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;

    type B = NdArray;

    fn model(name: &str, hidden: usize) -> Model<B> {
        let partial = PartialModelConfig {
            layer_sizes: vec![hidden],
            ..Default::default()
        };
        let config = ModelConfig::from_partial(&partial, 4, 2);
        Model::new(name, config, NdArrayDevice::default())
    }

    #[test]
    fn test_add_and_lookup() {
        let mut set = ModelSet::<B>::new();
        assert!(set.is_empty());

        set.add(model("policy", 8));
        assert_eq!(set.len(), 1);
        assert!(set.get("policy").is_some());
        assert!(set.get("critic").is_none());
    }

    #[test]
    fn test_add_overwrites_on_collision() {
        let mut set = ModelSet::<B>::new();
        set.add(model("policy", 8));
        set.add(model("policy", 16));

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("policy").unwrap().config.layer_sizes, vec![16]);
    }
}
