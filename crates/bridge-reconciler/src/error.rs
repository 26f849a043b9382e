//! Reconciler error type.

use thiserror::Error;

use bridge_connector_ldap::IdpError;
use bridge_scim_client::SpError;
use bridge_store::StoreError;

/// Error raised by the startup sync.
///
/// The event loop never returns these; it logs and abandons the event so
/// the next poll tick can reconverge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("mapping store: {0}")]
    Store(#[from] StoreError),

    #[error("identity provider: {0}")]
    Idp(#[from] IdpError),

    #[error("service provider: {0}")]
    Sp(#[from] SpError),

    #[error("group search returned no entries")]
    GroupNotFound,
}
