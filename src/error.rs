//! Error types for Triagr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Triagr
#[derive(Debug, Error)]
pub enum TriagrError {
    /// A live record with this id already exists
    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    /// Configuration rejected by validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// No free execution slot
    #[error("No capacity: {running} of {max} slots in use")]
    NoCapacity { running: usize, max: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Triagr operations
pub type Result<T> = std::result::Result<T, TriagrError>;
