//! Error types for cam_explain.

use thiserror::Error;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors raised while computing or rendering explanations.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// Core error (shapes, layers, class indices).
    #[error(transparent)]
    Core(#[from] cam_core::CoreError),

    /// Heatmap could not be rendered.
    #[error("Render error: {0}")]
    Render(String),

    /// Image encoding or decoding failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
