//! Error types for cam_models.

use thiserror::Error;

/// Result type alias using [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while building models or loading their weights.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Architecture name not known to the registry.
    #[error("Model '{0}' not found in registry")]
    UnknownArch(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read or apply a weights file.
    #[error("Failed to load weights: {0}")]
    Weights(String),

    /// Failed to resolve weights from the model hub.
    #[error("Model hub error: {0}")]
    Hub(String),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] cam_core::CoreError),
}
