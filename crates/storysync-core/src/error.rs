//! Error types for storysync-core

use thiserror::Error;

/// Result type alias using storysync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in storysync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Story not found
    #[error("Story not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote service could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// The remote service rejected the credential
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// The remote service answered with a non-success status
    #[error("Server error ({status}): {body}")]
    Server { status: u16, body: String },

    /// Photo decoding or re-encoding failed
    #[error("Media processing error: {0}")]
    MediaProcessing(String),
}

impl Error {
    /// Whether the failure means the caller has to re-authenticate.
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Whether the failure came from the local store.
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::LibSql(_))
    }
}

/// Only transport failures count as "offline"; a malformed request or an
/// unreadable response is not retried as if the service were unreachable.
impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            return Self::InvalidInput(error.to_string());
        }
        match error.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                Self::Auth(error.to_string())
            }
            Some(status) => Self::Server {
                status: status.as_u16(),
                body: error.to_string(),
            },
            None if error.is_decode() => Self::Server {
                status: 0,
                body: error.to_string(),
            },
            None => Self::Network(error.to_string()),
        }
    }
}
