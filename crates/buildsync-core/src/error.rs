//! Error types for the Buildsync client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Buildsync client.
///
/// Variants follow how a failure is surfaced to the user: reads degrade to a
/// retry affordance, mutations carry the backend's message inline, and nothing
/// here is fatal to the process.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum BuildsyncError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Transient read failure (row fetch, bulk load)
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Mutation or server-side function failure, with the backend's message
    #[error("Mutation failed: {message}")]
    Mutation {
        message: String,
        code: Option<String>,
    },

    /// Authentication/session error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BuildsyncError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Fetch error
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }

    /// Creates a Mutation error
    pub fn mutation(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Mutation {
            message: message.into(),
            code,
        }
    }

    /// Creates an Auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a transient fetch failure
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    /// Check if this is a mutation failure
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Mutation { .. })
    }

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Whether the UI should offer a manual retry for this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Io { .. })
    }

    /// Message to show next to the control that triggered a mutation.
    pub fn inline_message(&self) -> String {
        match self {
            Self::Mutation { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for BuildsyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for BuildsyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for BuildsyncError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for BuildsyncError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, BuildsyncError>`.
pub type Result<T> = std::result::Result<T, BuildsyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_is_retryable() {
        assert!(BuildsyncError::fetch("timeout").is_retryable());
        assert!(!BuildsyncError::mutation("denied", None).is_retryable());
    }

    #[test]
    fn test_io_is_retryable() {
        assert!(BuildsyncError::io("disk busy").is_retryable());
        assert!(!BuildsyncError::config("missing url").is_retryable());
    }

    #[test]
    fn test_inline_message_uses_backend_text() {
        let err = BuildsyncError::mutation("Email already invited", Some("23505".to_string()));
        assert_eq!(err.inline_message(), "Email already invited");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BuildsyncError = io.into();
        assert!(matches!(err, BuildsyncError::Io { .. }));
    }
}
