//! # cam_core
//!
//! Core types and errors for cam-rs class activation mapping.
//!
//! This crate provides:
//! - [`ChwShape`] for channel-first spatial shape metadata
//! - [`ImageTensor`], the normalized `(3, 224, 224)` model input
//! - [`FeatureMap`] wrapper for a captured convolutional feature map
//! - [`Normalization`] constants for ImageNet-pretrained backbones
//! - Error types and backend aliases
//!
//! ## Shape Convention
//!
//! Spatial data follows the convention `(C, H, W)`; models consume a batch of
//! one, `(1, C, H, W)`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cam_core::{ChwShape, ImageTensor};
//!
//! let image = ImageTensor::new(pixels, ImageTensor::SHAPE)?;
//! let batch = image.to_batch::<NdArray>(&device); // (1, 3, 224, 224)
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod shape;
mod tensor;

pub use error::{CoreError, Result};
pub use shape::ChwShape;
pub use tensor::{tensor_to_vec, FeatureMap, ImageTensor, Normalization, INPUT_SIZE};

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    #[cfg(feature = "backend-wgpu")]
    pub use burn_wgpu::Wgpu;
}
