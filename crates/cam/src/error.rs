//! Unified error type for the cam facade.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure of the explain pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Shape, layer or class index error.
    #[error(transparent)]
    Core(#[from] cam_core::CoreError),

    /// Image or label input error.
    #[error(transparent)]
    Data(#[from] cam_data::DataError),

    /// Model construction or weight loading error.
    #[error(transparent)]
    Model(#[from] cam_models::ModelError),

    /// CAM computation or rendering error.
    #[error(transparent)]
    Explain(#[from] cam_explain::ExplainError),

    /// Failed to write an output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode the report.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to write an image file.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
