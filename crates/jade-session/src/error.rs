//! # Session Error Types
//!
//! Error types for the boundary layer.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Session Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Data                │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Http           │  │  InvalidResponse        │ │
//! │  │  ConfigLoad     │  │  HttpStatus     │  │  Import                 │ │
//! │  │  ConfigSave     │  │  Io             │  │  Core (rules/catalog)   │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Transport and data errors from fetches are NOT propagated to the UI:  │
//! │  the session records them as inline notices and keeps going.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use jade_core::{CoreError, ValidationError};

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by configuration, collaborators and import.
#[derive(Debug, Error)]
pub enum SessionError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid pricing configuration.
    #[error("Invalid pricing configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to write the config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// File could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Request could not be sent or the body could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    // =========================================================================
    // Data Errors
    // =========================================================================
    /// Response parsed but did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A CSV row failed to import.
    #[error("Import failed at line {line}: {reason}")]
    Import { line: u64, reason: String },

    /// Pricing rule or catalog validation error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for SessionError {
    fn from(err: ValidationError) -> Self {
        SessionError::Core(CoreError::Validation(err))
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::InvalidResponse(err.to_string())
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        SessionError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SessionError {
    fn from(err: toml::ser::Error) -> Self {
        SessionError::ConfigSaveFailed(err.to_string())
    }
}

impl From<csv::Error> for SessionError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        SessionError::Import {
            line,
            reason: err.to_string(),
        }
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SessionError {
    /// True for failures worth retrying on the next refresh.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Http(_) => true,
            SessionError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// True when the error points at configuration rather than data.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidConfig(_)
                | SessionError::ConfigLoadFailed(_)
                | SessionError::ConfigSaveFailed(_)
                | SessionError::Core(CoreError::InvalidRules(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let server = SessionError::HttpStatus {
            url: "http://localhost/api/procedures".into(),
            status: 503,
        };
        assert!(server.is_retryable());

        let client = SessionError::HttpStatus {
            url: "http://localhost/api/procedures".into(),
            status: 404,
        };
        assert!(!client.is_retryable());
        assert_eq!(client.to_string(), "http://localhost/api/procedures returned HTTP 404");

        assert!(SessionError::InvalidConfig("x".into()).is_config_error());
        assert!(SessionError::Core(CoreError::InvalidRules("x".into())).is_config_error());
    }

    #[test]
    fn test_validation_error_converts() {
        let err: SessionError = ValidationError::Required {
            field: "name".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Validation error: name is required");
    }
}
