//! Pretrained ResNet weights.
//!
//! Weights are torchvision ImageNet checkpoints in safetensors format, either
//! fetched from the Hugging Face hub or read from a local file. PyTorch layout
//! differences (linear transposes, batch norm naming) are handled by
//! [`PyTorchToBurnAdapter`]; the only key rename is the residual projection,
//! which torchvision stores as a `Sequential` (`downsample.0`, `downsample.1`).

use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn_store::{ModuleSnapshot, PyTorchToBurnAdapter, SafetensorsStore};
use tracing::{debug, info, warn};

use crate::cnn::{ResNet, ResNetArch, ResNetConfig, IMAGENET_CLASSES};
use crate::error::{ModelError, Result};

/// File name of the weights inside a hub repository.
pub const HUB_WEIGHTS_FILE: &str = "model.safetensors";

/// Where to get pretrained weights from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsSource {
    /// The architecture's default hub repository.
    Hub,
    /// A local safetensors file.
    File(PathBuf),
}

impl WeightsSource {
    /// Resolve to a local path, downloading into the hub cache if needed.
    pub fn resolve(&self, arch: ResNetArch) -> Result<PathBuf> {
        match self {
            Self::Hub => download_weights(arch.hub_repo(), HUB_WEIGHTS_FILE),
            Self::File(path) if path.is_file() => Ok(path.clone()),
            Self::File(path) => Err(ModelError::Weights(format!(
                "weights file not found: {}",
                path.display()
            ))),
        }
    }
}

/// Download `file` from a hub model repository, returning the cached path.
pub fn download_weights(repo: &str, file: &str) -> Result<PathBuf> {
    info!("Fetching {} from Hugging Face repo {}", file, repo);

    let api = hf_hub::api::sync::Api::new()
        .map_err(|e| ModelError::Hub(format!("failed to create hub client: {}", e)))?;
    let path = api
        .model(repo.to_string())
        .get(file)
        .map_err(|e| ModelError::Hub(format!("failed to download {}/{}: {}", repo, file, e)))?;

    debug!("Weights cached at {}", path.display());
    Ok(path)
}

/// Load safetensors weights into an initialized ResNet.
///
/// Every model parameter must be present in the file; extra tensors such as
/// `num_batches_tracked` are ignored.
pub fn load_weights<B: Backend>(model: &mut ResNet<B>, path: &Path) -> Result<()> {
    let mut store = SafetensorsStore::from_file(path)
        .with_from_adapter(PyTorchToBurnAdapter::default())
        .with_key_remapping(r"\.downsample\.0\.", ".downsample.conv.")
        .with_key_remapping(r"\.downsample\.1\.", ".downsample.bn.")
        .allow_partial(false)
        .validate(true);

    let result = model
        .load_from(&mut store)
        .map_err(|e| ModelError::Weights(format!("{}: {}", path.display(), e)))?;

    info!(
        "Loaded {} weights: applied={} missing={} unused={}",
        model.arch(),
        result.applied.len(),
        result.missing.len(),
        result.unused.len()
    );
    if !result.missing.is_empty() {
        warn!("Missing tensors: {:?}", result.missing);
    }
    if !result.unused.is_empty() {
        debug!("Unused tensors: {:?}", result.unused);
    }

    Ok(())
}

/// Build a ResNet with ImageNet weights.
pub fn pretrained_resnet<B: Backend>(
    arch: ResNetArch,
    source: &WeightsSource,
    device: &B::Device,
) -> Result<ResNet<B>> {
    let path = source.resolve(arch)?;
    let mut model = ResNetConfig::new(arch, IMAGENET_CLASSES).init::<B>(device);
    load_weights(&mut model, &path)?;
    Ok(model)
}
