//! Error types shared by the auth flow and the request dispatcher

use thiserror::Error;

use crate::auth::TokenStoreError;
use crate::config::ConfigError;

/// Errors surfaced by [`DropboxClient`](crate::DropboxClient) operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// The redirect carried no extractable token
    #[error("Authorization rejected: {0}")]
    AuthRejected(String),

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("API error: {status_text}")]
    Api {
        /// Numeric HTTP status
        status: u16,
        /// Reason phrase for the status
        status_text: String,
    },

    /// The response body could not be decoded as requested
    #[error("Decode error: {0}")]
    Decode(String),

    /// Token storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] TokenStoreError),

    /// The secondary browsing context could not be opened or closed
    #[error("Browser error: {0}")]
    Browser(String),

    /// The request could not be built (bad URL or header value)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The client configuration is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Status text of an [`ClientError::Api`] error
    pub fn status_text(&self) -> Option<&str> {
        match self {
            ClientError::Api { status_text, .. } => Some(status_text),
            _ => None,
        }
    }

    /// Returns true if the error came from an authorization redirect
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, ClientError::AuthRejected(_))
    }
}
