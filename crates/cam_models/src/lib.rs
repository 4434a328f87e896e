//! # cam_models
//!
//! Image classifiers for cam-rs whose forward pass can be split at a named
//! layer, so class activation maps can be computed without forward hooks.
//!
//! ## Models
//! - [`ResNet`] - ResNet-18 and ResNet-34 in the torchvision layout
//!
//! ## Weights
//! - [`pretrained_resnet`] - ImageNet weights from the Hugging Face hub or a local safetensors file

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cnn;
mod error;
pub mod pretrained;
pub mod registry;
pub mod traits;

pub use cnn::*;
pub use error::{ModelError, Result};
pub use pretrained::{download_weights, load_weights, pretrained_resnet, WeightsSource};
pub use registry::{default_registry, ModelConstructor, ModelRegistry};
pub use traits::FeatureExtractor;
