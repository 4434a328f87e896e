//! # cam
//!
//! Class activation maps for pretrained image classifiers, in Rust.
//!
//! cam-rs shows which regions of an image drive a CNN's prediction:
//!
//! - **Data**: image fetching, ImageNet preprocessing, class label tables
//! - **Models**: ResNet-18/34 with pretrained ImageNet weights
//! - **Explainability**: feature capture, softmax, top-k, CAM heatmaps, overlays
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cam::prelude::*;
//!
//! let device = Default::default();
//! let classifier = load_classifier::<backend::NdArray>("resnet18", None, true, None, &device)?;
//! let labels = LabelTable::load(&LabelSource::imagenet(), None)?;
//! let source: ImageSource = "https://example.com/cat.jpg".parse()?;
//!
//! let explanation = explain(&classifier, &source, &labels, &ExplainRequest::default())?;
//! explanation.save(std::path::Path::new("cam_out"))?;
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray
//! - `backend-wgpu`: GPU backend using WGPU (Metal on macOS, Vulkan on Linux/Windows)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub mod pipeline;
pub mod report;

// Re-export all crates
pub use cam_core as core;
pub use cam_data as data;
pub use cam_explain as explain;
pub use cam_models as models;

pub use error::{Error, Result};
pub use pipeline::{
    explain, explain_image, load_classifier, predict, predict_image, ClassActivation,
    ExplainRequest, Explanation, Prediction, TargetClass,
};
pub use report::{ActivationReport, ExplainReport};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use cam::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use cam_core::{backend, ChwShape, CoreError, FeatureMap, ImageTensor, Normalization};

    // Data
    pub use cam_data::{load_image, preprocess, ImageSource, LabelSource, LabelTable};

    // Models
    pub use cam_models::{
        default_registry, FeatureExtractor, ResNet, ResNetArch, ResNetConfig, WeightsSource,
    };

    // Explain
    pub use cam_explain::{
        compute_cam, overlay, softmax, top_k, CamHeatmap, Classifier, Colormap, FeatureCapture,
    };

    // Pipeline
    pub use crate::{
        explain, load_classifier, predict, ExplainReport, ExplainRequest, Explanation,
        Prediction, TargetClass,
    };
}
