// Typed errors with thiserror. Surface meaningful messages to JS.
// Errors local to one overlay never halt siblings; only invalid whole-engine
// configuration fails construction.

use thiserror::Error;

/// Engine error types.
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for OverlayError {
    fn from(err: serde_json::Error) -> Self {
        OverlayError::Serialization(err.to_string())
    }
}
