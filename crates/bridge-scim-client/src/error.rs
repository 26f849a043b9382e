//! Service-provider error types with transient/permanent classification.

use thiserror::Error;

/// Error raised by service-provider operations.
#[derive(Debug, Error)]
pub enum SpError {
    /// Configuration rejected before any request was made.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Transport-level failure (connect, timeout, TLS).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The list endpoint rejected the request.
    #[error("list: bad request: {body}")]
    BadRequest { body: String },

    /// The list endpoint did not recognize the organization.
    #[error("list: not found: {body}")]
    NotFound { body: String },

    /// Any other non-success status.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The response body did not parse as the expected SCIM type.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SpError {
    /// Whether retrying the operation later may succeed.
    ///
    /// Transport failures and server-side errors are transient; everything
    /// else needs configuration or data changes first.
    pub fn is_transient(&self) -> bool {
        match self {
            SpError::Http(_) => true,
            SpError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result alias for service-provider operations.
pub type SpResult<T> = Result<T, SpError>;
