//! In-memory service provider for dry runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::info;

use bridge_scim::User;

use crate::error::SpResult;
use crate::ServiceProvider;

/// The GUID the fake assigns for `user_name`: `base64(sha256(user_name))`.
///
/// Deterministic so tests can predict provider-side identifiers.
pub fn fake_guid(user_name: &str) -> String {
    STANDARD.encode(Sha256::digest(user_name.as_bytes()))
}

/// Deterministic in-memory provider.
#[derive(Default)]
pub struct FakeProvider {
    store: Mutex<HashMap<String, User>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user as if it had been provisioned earlier.
    pub async fn seed(&self, user: User) {
        let mut store = self.store.lock().await;
        store.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl ServiceProvider for FakeProvider {
    async fn add(&self, user: &User) -> SpResult<String> {
        let guid = fake_guid(&user.user_name);
        info!(user_name = %user.user_name, guid = %guid, "fake provider: adding user");

        let mut stored = user.clone();
        stored.id = guid.clone();
        let mut store = self.store.lock().await;
        store.insert(guid.clone(), stored);

        Ok(guid)
    }

    async fn delete(&self, guid: &str) -> SpResult<()> {
        info!(guid, "fake provider: removing user");
        let mut store = self.store.lock().await;
        store.remove(guid);
        Ok(())
    }

    async fn list(&self) -> SpResult<Vec<User>> {
        let store = self.store.lock().await;
        Ok(store.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guid_is_deterministic() {
        let provider = FakeProvider::new();
        let guid = provider.add(&User::with_user_name("mtodd")).await.unwrap();

        assert_eq!(guid, fake_guid("mtodd"));
        assert_eq!(guid, fake_guid("mtodd"));
        assert_ne!(guid, fake_guid("defunkt"));
    }

    #[tokio::test]
    async fn add_then_list_then_delete() {
        let provider = FakeProvider::new();
        let guid = provider.add(&User::with_user_name("mtodd")).await.unwrap();

        let listed = provider.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, guid);
        assert_eq!(listed[0].user_name, "mtodd");

        provider.delete(&guid).await.unwrap();
        assert!(provider.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn re_adding_the_same_user_does_not_duplicate() {
        let provider = FakeProvider::new();
        provider.add(&User::with_user_name("mtodd")).await.unwrap();
        provider.add(&User::with_user_name("mtodd")).await.unwrap();

        assert_eq!(provider.list().await.unwrap().len(), 1);
    }
}
