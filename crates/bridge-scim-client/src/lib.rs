//! Service-provider side of the bridge.
//!
//! [`ServiceProvider`] is the capability the reconciler drives; it has two
//! independent implementations sharing nothing but the trait:
//!
//! - [`ScimClient`] — the live HTTP client for the provider's SCIM v2
//!   user-provisioning endpoints;
//! - [`FakeProvider`] — an in-memory stand-in with deterministic GUIDs,
//!   selected by the `dryRun` configuration flag and used by tests.

pub mod client;
pub mod config;
pub mod error;
pub mod fake;

use std::sync::Arc;

use async_trait::async_trait;

use bridge_scim::User;

pub use client::ScimClient;
pub use config::ScimConfig;
pub use error::{SpError, SpResult};
pub use fake::{fake_guid, FakeProvider};

/// User-provisioning operations the service provider exposes.
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Create `user` on the provider and return the GUID the provider chose.
    async fn add(&self, user: &User) -> SpResult<String>;

    /// Delete the user bound to `guid`.
    async fn delete(&self, guid: &str) -> SpResult<()>;

    /// All users currently on the provider.
    async fn list(&self) -> SpResult<Vec<User>>;
}

/// Build the provider selected by `config`: the in-memory fake in dry-run
/// mode, the live client otherwise.
pub fn provider_from_config(config: &ScimConfig) -> SpResult<Arc<dyn ServiceProvider>> {
    if config.dry_run {
        Ok(Arc::new(FakeProvider::new()))
    } else {
        Ok(Arc::new(ScimClient::new(config)?))
    }
}
