//! Error types for cam_data.

use thiserror::Error;

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while fetching and preparing inputs.
#[derive(Error, Debug)]
pub enum DataError {
    /// Download error.
    #[error("Download error: {0}")]
    Download(String),

    /// Image decode error.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// I/O error with the offending path.
    #[error("I/O error: {0}")]
    Io(String),

    /// Core error.
    #[error("Core error: {0}")]
    CoreError(#[from] cam_core::CoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_missing() -> Result<String> {
        Ok(std::fs::read_to_string("/nonexistent/cam-rs/labels.txt")?)
    }

    #[test]
    fn test_io_error_converts() {
        let err = read_missing().unwrap_err();
        assert!(matches!(err, DataError::IoError(_)));
        assert!(err.to_string().starts_with("I/O error"));
    }
}
