use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OsmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not logged in - call login() first")]
    NotAuthenticated,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    /// Two populate recipes disagree about an attribute that must be stable
    /// for the lifetime of a session. Never recoverable: the cache can no
    /// longer be trusted.
    #[error("Inconsistent {entity} {id}: {field} is {existing}, remote now reports {incoming}")]
    Inconsistent {
        entity: &'static str,
        id: String,
        field: &'static str,
        existing: String,
        incoming: String,
    },

    #[error("Session persistence failed: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, OsmError>;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl OsmError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..end],
                body.len()
            )
        }
    }

    pub fn from_status(endpoint: &str, status: reqwest::StatusCode, body: &str) -> Self {
        OsmError::Http {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    pub fn invalid(endpoint: &str, reason: impl fmt::Display) -> Self {
        OsmError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that must abort the caller. Calls are never retried,
    /// so transport failures count alongside broken data integrity.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OsmError::Inconsistent { .. }
                | OsmError::Config(_)
                | OsmError::Network(_)
                | OsmError::Http { .. }
        )
    }
}

/// A structured error reported by the remote system. Not an exception: the
/// call that produced it yields "no result" and the error is kept on the
/// connection for the caller to inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: String,
    pub message: String,
}

impl RemoteError {
    /// Whether the remote system is telling us the session is gone.
    pub fn ends_session(&self) -> bool {
        let message = self.message.to_ascii_lowercase();
        message.contains("not logged in") || message.contains("session expired")
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
