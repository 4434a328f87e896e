//! Model registry for dynamic model creation.
//!
//! The registry allows creating models dynamically by name from JSON configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use cam_models::registry::default_registry;
//! use serde_json::json;
//!
//! let registry = default_registry::<NdArray>();
//! let config = json!({ "pretrained": true });
//! let model = registry.create("resnet18", &config, &device)?;
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use burn::tensor::backend::Backend;
use serde_json::Value;

use crate::cnn::{ResNetArch, ResNetConfig, IMAGENET_CLASSES};
use crate::error::{ModelError, Result};
use crate::pretrained::{pretrained_resnet, WeightsSource};
use crate::traits::FeatureExtractor;

/// Type alias for model constructor.
pub type ModelConstructor<B> = Arc<
    dyn Fn(&Value, &<B as Backend>::Device) -> Result<Box<dyn FeatureExtractor<B>>> + Send + Sync,
>;

/// Registry for dynamically creating models by name.
pub struct ModelRegistry<B: Backend> {
    models: HashMap<String, ModelConstructor<B>>,
}

impl<B: Backend> Default for ModelRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> ModelRegistry<B> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Register a model constructor.
    ///
    /// # Arguments
    ///
    /// * `name` - The name to register the model under
    /// * `constructor` - A function that creates the model from config
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&Value, &<B as Backend>::Device) -> Result<Box<dyn FeatureExtractor<B>>>
            + Send
            + Sync
            + 'static,
    {
        self.models.insert(name.to_string(), Arc::new(constructor));
    }

    /// Create a model by name.
    ///
    /// # Arguments
    ///
    /// * `name` - The registered name of the model (case-insensitive)
    /// * `config` - JSON configuration for the model
    /// * `device` - The device to create the model on
    pub fn create(
        &self,
        name: &str,
        config: &Value,
        device: &<B as Backend>::Device,
    ) -> Result<Box<dyn FeatureExtractor<B>>> {
        let constructor = self
            .models
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| ModelError::UnknownArch(name.to_string()))?;
        constructor(config, device)
    }

    /// List all registered model names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a model is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(&name.to_ascii_lowercase())
    }
}

// ============================================================================
// Helper functions for parsing configs
// ============================================================================

fn get_usize_or(config: &Value, key: &str, default: usize) -> Result<usize> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .map(|v| v as usize)
            .filter(|&v| v > 0)
            .ok_or_else(|| ModelError::InvalidConfig(format!("Invalid '{}': {}", key, v))),
    }
}

fn get_bool_or(config: &Value, key: &str, default: bool) -> Result<bool> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| ModelError::InvalidConfig(format!("Invalid '{}': {}", key, v))),
    }
}

fn weights_source(config: &Value) -> Result<Option<WeightsSource>> {
    if let Some(path) = config.get("weights").and_then(Value::as_str) {
        return Ok(Some(WeightsSource::File(PathBuf::from(path))));
    }
    Ok(get_bool_or(config, "pretrained", true)?.then_some(WeightsSource::Hub))
}

fn build_resnet<B: Backend>(
    arch: ResNetArch,
    config: &Value,
    device: &B::Device,
) -> Result<Box<dyn FeatureExtractor<B>>> {
    let n_classes = get_usize_or(config, "n_classes", IMAGENET_CLASSES)?;
    let base_width = get_usize_or(config, "base_width", 64)?;

    match weights_source(config)? {
        Some(source) => {
            if n_classes != IMAGENET_CLASSES || base_width != 64 {
                return Err(ModelError::InvalidConfig(format!(
                    "pretrained {} requires n_classes={} and base_width=64",
                    arch, IMAGENET_CLASSES
                )));
            }
            let model = pretrained_resnet::<B>(arch, &source, device)?;
            Ok(Box::new(model) as Box<dyn FeatureExtractor<B>>)
        }
        None => {
            let model = ResNetConfig::new(arch, n_classes)
                .with_base_width(base_width)
                .init::<B>(device);
            Ok(Box::new(model) as Box<dyn FeatureExtractor<B>>)
        }
    }
}

// ============================================================================
// Default registry with all models
// ============================================================================

/// Create a registry with all available models pre-registered.
///
/// # Available Models
///
/// - `resnet18`
/// - `resnet34`
///
/// # Config Fields
///
/// - `pretrained`: load ImageNet weights from the hub (default `true`)
/// - `weights`: path to a local safetensors file; implies pretrained
/// - `n_classes`: number of output classes (default 1000, random init only)
/// - `base_width`: first-stage channels (default 64, random init only)
pub fn default_registry<B: Backend>() -> ModelRegistry<B> {
    let mut registry = ModelRegistry::new();

    for arch in ResNetArch::ALL {
        registry.register(arch.name(), move |config, device| {
            build_resnet::<B>(arch, config, device)
        });
    }

    registry
}
