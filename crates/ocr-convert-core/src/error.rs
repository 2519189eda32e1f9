//! Error types for the OCR conversion pipeline.
//!
//! Per-model failures (catalog misses, fetch, conversion and optimization
//! errors) are caught by the batch orchestrator and never abort the run.
//! Only run-level errors such as an unwritable output directory propagate
//! to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the conversion pipeline.
#[derive(Debug, Error)]
pub enum ConvertError {
    // Request errors
    #[error("Invalid model token '{token}': expected <type>_<variant>")]
    InvalidToken { token: String },

    #[error("Unknown model type '{task}' in token '{token}'")]
    UnknownTaskType { token: String, task: String },

    #[error("Unknown model variant: {token}")]
    CatalogMiss { token: String },

    // Fetch errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Failed to extract {archive:?}: {message}")]
    ExtractionFailed { archive: PathBuf, message: String },

    // Tool errors
    #[error("Model conversion failed: {message}")]
    ConversionFailed { message: String },

    #[error("Model optimization failed: {message}")]
    OptimizationFailed { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for ConvertError {
    fn from(err: reqwest::Error) -> Self {
        ConvertError::Network {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ConvertError {
    /// Create an IO error with a short description of the failed operation.
    pub fn io(context: &str, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        ConvertError::Io {
            message: format!("{context}: {err}"),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Whether the error was raised before any I/O for the model took place.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ConvertError::InvalidToken { .. }
                | ConvertError::UnknownTaskType { .. }
                | ConvertError::CatalogMiss { .. }
        )
    }
}

/// Attach a path to `std::io::Error` results.
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| ConvertError::Io {
            message: e.to_string(),
            path: Some(path.into()),
            source: Some(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConvertError::CatalogMiss {
            token: "det_bogus".into(),
        };
        assert_eq!(err.to_string(), "Unknown model variant: det_bogus");

        let err = ConvertError::ConversionFailed {
            message: "opset 7 is not supported".into(),
        };
        assert_eq!(
            err.to_string(),
            "Model conversion failed: opset 7 is not supported"
        );
    }

    #[test]
    fn test_request_errors() {
        assert!(ConvertError::InvalidToken { token: "det".into() }.is_request_error());
        assert!(ConvertError::UnknownTaskType {
            token: "cls_mobile".into(),
            task: "cls".into()
        }
        .is_request_error());
        assert!(!ConvertError::ConversionFailed {
            message: "boom".into()
        }
        .is_request_error());
    }

    #[test]
    fn test_with_path_keeps_path() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        match res.with_path("/tmp/missing") {
            Err(ConvertError::Io { path, .. }) => {
                assert_eq!(path, Some(PathBuf::from("/tmp/missing")));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
