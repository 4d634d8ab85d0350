//! Error types for the observation engine.

use thiserror::Error;

/// Main error type for model operations.
#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("Invalid keypath {path:?}: {reason}")]
    InvalidKeypath { path: String, reason: &'static str },

    #[error("Cannot write through array at {path:?}")]
    ArrayTraversal { path: String },

    #[error("Index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Cyclic computed dependency at {path:?}")]
    CyclicDependency { path: String },

    #[error("Computed property already bound: {0}")]
    ComputedExists(String),

    #[error("Cascade depth limit of {limit} exceeded while setting {path:?}")]
    DepthLimit { limit: usize, path: String },

    #[error("Initial properties must be an object, got {0}")]
    InvalidProperties(&'static str),

    #[error("Callback failed: {0}")]
    Callback(String),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl ObserveError {
    /// Build a callback failure. Subscribers return this to abort the
    /// `set` that notified them.
    pub fn callback(message: impl Into<String>) -> Self {
        ObserveError::Callback(message.into())
    }

    pub(crate) fn invalid_keypath(path: &str, reason: &'static str) -> Self {
        ObserveError::InvalidKeypath {
            path: path.to_string(),
            reason,
        }
    }
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ObserveError>;
