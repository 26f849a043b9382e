//! Error types for the directory side.

use thiserror::Error;

/// Error raised by the watcher or the LDAP provider.
#[derive(Debug, Error)]
pub enum IdpError {
    /// Configuration rejected before any connection was attempted.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Dial or bind transport failure.
    #[error("connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: ldap3::LdapError,
    },

    /// The server rejected the bind credentials.
    #[error("bind failed: invalid credentials")]
    InvalidCredentials,

    /// The server refused the bind for another reason.
    #[error("bind failed with code {rc}: {text}")]
    Bind { rc: u32, text: String },

    /// A search failed in flight.
    #[error("search failed: {0}")]
    Search(#[from] ldap3::LdapError),

    /// A base-object fetch matched nothing.
    #[error("no entry found for {dn}")]
    EntryNotFound { dn: String },

    /// An operation was invoked before `start` succeeded.
    #[error("provider has not been started")]
    NotStarted,
}

/// Result alias for directory operations.
pub type IdpResult<T> = Result<T, IdpError>;
