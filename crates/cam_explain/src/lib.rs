//! # cam_explain
//!
//! Class activation maps for cam-rs.
//!
//! This crate provides:
//! - [`FeatureCapture`], a caller-owned slot for one layer's activation
//! - [`Classifier`] inference with softmax probabilities and the captured feature map
//! - [`top_k`] class selection
//! - [`compute_cam`] and [`CamHeatmap`] upsampling
//! - [`Colormap`], [`overlay`] and [`heatmap_image`] rendering

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod activation;
mod attribution;
mod error;
mod inference;
mod render;
mod topk;

pub use activation::FeatureCapture;
pub use attribution::{
    cam_for_classes, compute_cam, normalize_cam, CamHeatmap, HeatmapStats, CAM_EPSILON,
};
pub use error::{ExplainError, Result};
pub use inference::{softmax, Classifier, Inference};
pub use render::{heatmap_image, overlay, Colormap, DEFAULT_ALPHA};
pub use topk::{top_k, ClassScore};
