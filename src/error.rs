//! Client error types.

use thiserror::Error;

/// Everything a client call can fail with.
///
/// Validation errors are raised before any request goes out. `Api`,
/// `Transport` and `Decode` come back from the gateway after it has already
/// shown a notification for them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Status code for server-side failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the server rejected the request because there is no session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}
