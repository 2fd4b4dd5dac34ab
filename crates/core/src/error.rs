//! Error types for the Canopy view engine.

use crate::value::ValueKind;
use thiserror::Error;

/// Result type alias for Canopy operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for view configuration and data access.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid view or navigator configuration. Fatal at build time.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A field is present in a row summary but has the wrong type.
    #[error("type mismatch for item '{item}': expected {expected}, got {got}")]
    TypeMismatch {
        item: String,
        expected: ValueKind,
        got: ValueKind,
    },

    /// Two distinct providers claimed the same origin id.
    #[error("origin already registered: {origin}")]
    OriginCollision { origin: String },

    /// A provider failed to pull from its record source.
    #[error("provider '{origin}' failed: {message}")]
    Provider { origin: String, message: String },
}

impl Error {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(item: impl Into<String>, expected: ValueKind, got: ValueKind) -> Self {
        Error::TypeMismatch {
            item: item.into(),
            expected,
            got,
        }
    }

    /// Creates an origin collision error.
    pub fn origin_collision(origin: impl Into<String>) -> Self {
        Error::OriginCollision {
            origin: origin.into(),
        }
    }

    /// Creates a provider error.
    pub fn provider(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            origin: origin.into(),
            message: message.into(),
        }
    }
}
