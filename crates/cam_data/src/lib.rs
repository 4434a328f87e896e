//! # cam_data
//!
//! Input handling for cam-rs: image fetching, preprocessing and class labels.
//!
//! This crate provides:
//! - [`ImageSource`] and [`load_image`] for URLs and local files
//! - [`preprocess`] producing the normalized `(3, 224, 224)` [`cam_core::ImageTensor`]
//! - [`LabelTable`] loaded from a remote JSON index or a local label file
//! - A small download cache under `~/.cache/cam-rs`
//!
//! ## Example
//!
//! ```rust,ignore
//! use cam_data::{load_image, preprocess, ImageSource, LabelSource, LabelTable};
//!
//! let source: ImageSource = "https://example.com/cat.jpg".parse()?;
//! let image = load_image(&source)?;
//! let input = preprocess(&image)?;
//! let labels = LabelTable::load(&LabelSource::imagenet(), None)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub mod fetch;
mod input;
pub mod labels;

pub use error::{DataError, Result};
pub use fetch::{cached_download, download_file, fetch_bytes, is_url, write_file};
pub use input::{decode_image, load_image, preprocess, preprocess_with, ImageSource};
pub use labels::{ClassLabel, LabelSource, LabelTable, IMAGENET_CLASS_INDEX_URL, MAX_CLASS_INDEX};

/// Cache directory for downloaded files.
pub const CACHE_DIR: &str = ".cache/cam-rs";

/// Get the default cache directory path.
#[must_use]
pub fn cache_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR)
}
