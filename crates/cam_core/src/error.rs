//! Error types for cam_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors shared by every cam-rs crate.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid tensor shape provided.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Shape mismatch between tensors.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Dimension error.
    #[error("Dimension error: expected {expected} dimensions, got {got}")]
    DimensionError {
        /// Expected number of dimensions.
        expected: usize,
        /// Actual number of dimensions.
        got: usize,
    },

    /// Class index outside the classifier's class set.
    #[error("Class index {index} out of range for {n_classes} classes")]
    ClassOutOfRange {
        /// The requested class index.
        index: usize,
        /// Number of classes the classifier predicts.
        n_classes: usize,
    },

    /// A named layer that the model does not have.
    #[error("Unknown layer '{name}', available layers: {available}")]
    UnknownLayer {
        /// The requested layer name.
        name: String,
        /// Comma separated list of valid layer names.
        available: String,
    },

    /// Failure reading tensor data back from a backend.
    #[error("Tensor data error: {0}")]
    Tensor(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Build an [`CoreError::UnknownLayer`] from the layers a model exposes.
    pub fn unknown_layer(name: &str, available: &[&str]) -> Self {
        Self::UnknownLayer {
            name: name.to_string(),
            available: available.join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_layer_message() {
        let err = CoreError::unknown_layer("layer9", &["layer3", "layer4"]);
        assert_eq!(
            err.to_string(),
            "Unknown layer 'layer9', available layers: layer3, layer4"
        );
    }

    #[test]
    fn test_class_out_of_range_message() {
        let err = CoreError::ClassOutOfRange {
            index: 1000,
            n_classes: 1000,
        };
        assert!(err.to_string().contains("1000 classes"));
    }
}
