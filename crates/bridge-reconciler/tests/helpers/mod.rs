//! Shared fixtures: an in-memory directory and instrumented service
//! providers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use bridge_connector_ldap::{
    IdentityProvider, IdpError, IdpResult, SearchEntry, SearchResult, WatchQuery,
};
use bridge_scim::User;
use bridge_scim_client::{FakeProvider, ServiceProvider, SpError, SpResult};
use bridge_store::MappingStore;

pub const GROUP_DN: &str = "cn=cloud,ou=groups,dc=github,dc=com";

pub fn user_dn(uid: &str) -> String {
    format!("uid={uid},ou=users,dc=github,dc=com")
}

pub async fn open_store(dir: &tempfile::TempDir) -> MappingStore {
    let store = MappingStore::open(dir.path().join("bridge.db")).unwrap();
    store.prepare().await.unwrap();
    store
}

/// In-memory stand-in for the directory: a set of user entries plus one
/// group entry whose `member` attribute the tests control.
#[derive(Default)]
pub struct FakeDirectory {
    entries: Mutex<HashMap<String, SearchEntry>>,
    members: Mutex<Vec<String>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user entry and return its DN.
    pub async fn put_user(&self, uid: &str) -> String {
        let dn = user_dn(uid);
        let mut attrs = HashMap::new();
        attrs.insert("uid".to_string(), vec![uid.to_string()]);
        attrs.insert("cn".to_string(), vec![uid.to_string()]);
        attrs.insert("givenName".to_string(), vec![format!("{uid}-given")]);
        attrs.insert("sn".to_string(), vec![format!("{uid}-family")]);
        attrs.insert("mail".to_string(), vec![format!("{uid}@example.com")]);
        attrs.insert(
            "modifyTimestamp".to_string(),
            vec!["20180125193531Z".to_string()],
        );

        let entry = SearchEntry {
            dn: dn.clone(),
            attrs,
            bin_attrs: HashMap::new(),
        };
        self.entries.lock().await.insert(dn.clone(), entry);
        dn
    }

    pub async fn set_members(&self, dns: &[&str]) {
        *self.members.lock().await = dns.iter().map(|dn| dn.to_string()).collect();
    }

    async fn group_entry(&self) -> SearchEntry {
        let members = self.members.lock().await.clone();
        let mut attrs = HashMap::new();
        if !members.is_empty() {
            attrs.insert("member".to_string(), members);
        }
        attrs.insert(
            "modifyTimestamp".to_string(),
            vec!["20180125193531Z".to_string()],
        );
        SearchEntry {
            dn: GROUP_DN.to_string(),
            attrs,
            bin_attrs: HashMap::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeDirectory {
    async fn fetch(&self, dn: &str) -> IdpResult<SearchEntry> {
        self.entries
            .lock()
            .await
            .get(dn)
            .cloned()
            .ok_or_else(|| IdpError::EntryNotFound { dn: dn.to_string() })
    }

    async fn fetch_uid(&self, uid: &str) -> IdpResult<Vec<SearchEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .values()
            .filter(|entry| {
                entry
                    .attrs
                    .get("uid")
                    .and_then(|values| values.first())
                    .is_some_and(|value| value == uid)
            })
            .cloned()
            .collect())
    }

    async fn search(&self, _query: Option<&WatchQuery>) -> IdpResult<SearchResult> {
        Ok(SearchResult {
            entries: vec![self.group_entry().await],
        })
    }
}

/// Service provider that counts calls before delegating to the fake.
#[derive(Default)]
pub struct CountingProvider {
    pub inner: FakeProvider,
    pub adds: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceProvider for CountingProvider {
    async fn add(&self, user: &User) -> SpResult<String> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        self.inner.add(user).await
    }

    async fn delete(&self, guid: &str) -> SpResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(guid).await
    }

    async fn list(&self) -> SpResult<Vec<User>> {
        self.inner.list().await
    }
}

/// Service provider whose first `failures` add calls return a 503.
pub struct FlakyProvider {
    pub inner: FakeProvider,
    failures_left: AtomicUsize,
}

impl FlakyProvider {
    pub fn failing(failures: usize) -> Self {
        Self {
            inner: FakeProvider::new(),
            failures_left: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl ServiceProvider for FlakyProvider {
    async fn add(&self, user: &User) -> SpResult<String> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok()
        {
            return Err(SpError::UnexpectedStatus {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        self.inner.add(user).await
    }

    async fn delete(&self, guid: &str) -> SpResult<()> {
        self.inner.delete(guid).await
    }

    async fn list(&self) -> SpResult<Vec<User>> {
        self.inner.list().await
    }
}
