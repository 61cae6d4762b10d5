//! Error types for testledger.

use thiserror::Error;

/// Result type for testledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur in testledger.
///
/// A test name that is not present in a sheet is not an error; lookups
/// return `None` for that case.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A session for a document could not be established.
    #[error("Session error for document {document_id}: {message}")]
    Session {
        document_id: String,
        message: String,
    },

    /// Credential material is missing or malformed.
    #[error("Credential error: {0}")]
    Credential(String),

    /// A remote call failed. Retried once by the access layer.
    #[error("Remote error: {0}")]
    Remote(String),

    /// A sheet name could not be mapped to a numeric sheet id.
    #[error("Sheet '{sheet}' not found in document {document_id}")]
    Resolution { document_id: String, sheet: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A textual range could not be parsed.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    /// Create a session error.
    pub fn session(document_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Session {
            document_id: document_id.into(),
            message: message.into(),
        }
    }

    /// Create a sheet resolution error.
    pub fn resolution(document_id: impl Into<String>, sheet: impl Into<String>) -> Self {
        Self::Resolution {
            document_id: document_id.into(),
            sheet: sheet.into(),
        }
    }
}
