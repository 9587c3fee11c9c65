//! Error Handling Module
//!
//! Error type shared by every stage of the blight classification pipeline.
//! Uses thiserror for the definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the plant disease pipeline
#[derive(Error, Debug)]
pub enum PlantDiseaseError {
    /// An image file could not be opened or decoded
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// The dataset directory is malformed or empty
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// The batch sequence cannot be split as requested
    #[error("Split error: {0}")]
    Split(String),

    /// Model construction, save or load failed
    #[error("Model error: {0}")]
    Model(String),

    /// Error raised while training
    #[error("Training error: {0}")]
    Training(String),

    /// Error raised while predicting
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl From<serde_json::Error> for PlantDiseaseError {
    fn from(err: serde_json::Error) -> Self {
        PlantDiseaseError::Serialization(err.to_string())
    }
}

/// Convenience Result type for the pipeline
pub type Result<T> = std::result::Result<T, PlantDiseaseError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| PlantDiseaseError::Config(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| PlantDiseaseError::Config(format!("{}: {}", f(), e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| PlantDiseaseError::Config(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| PlantDiseaseError::Config(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlantDiseaseError::Split("need at least 3 batches".to_string());
        assert_eq!(format!("{}", err), "Split error: need at least 3 batches");
    }

    #[test]
    fn test_image_load_error() {
        let path = PathBuf::from("PlantVillage/Potato___healthy/leaf.jpg");
        let err = PlantDiseaseError::ImageLoad(path, "unexpected EOF".to_string());
        assert!(format!("{}", err).contains("leaf.jpg"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PlantDiseaseError = io.into();
        assert!(matches!(err, PlantDiseaseError::Io(_)));
    }

    #[test]
    fn test_option_context() {
        let opt: Option<i32> = None;
        let with_context = opt.context("Value was None");
        assert!(matches!(with_context, Err(PlantDiseaseError::Config(_))));
    }
}
