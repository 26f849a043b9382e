//! Startup three-way sync against the in-memory directory and the fake
//! service provider.

mod helpers;

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bridge_reconciler::Bridge;
use bridge_scim::User;
use bridge_scim_client::{fake_guid, ServiceProvider};
use bridge_store::MappingStore;

use helpers::{open_store, CountingProvider, FakeDirectory, FlakyProvider};

fn provisioned(user_name: &str, guid: &str) -> User {
    let mut user = User::with_user_name(user_name);
    user.id = guid.to_string();
    user
}

/// The set of member DNs equals the set of DNs reachable through the store
/// from the post-sync provider roster.
async fn assert_converged(
    store: &MappingStore,
    sp: &dyn ServiceProvider,
    member_dns: &[String],
) {
    let expected: HashSet<&String> = member_dns.iter().collect();
    let mut reachable = HashSet::new();
    for user in sp.list().await.unwrap() {
        let dn = store.dn_for_guid(&user.id).await.unwrap();
        if let Some(dn) = dn {
            reachable.insert(dn);
        }
    }
    let reachable: HashSet<&String> = reachable.iter().collect();
    assert_eq!(reachable, expected);
}

#[tokio::test]
async fn sync_binds_existing_provider_user_without_mutating_the_provider() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let directory = Arc::new(FakeDirectory::new());
    let dn = directory.put_user("mtodd").await;
    directory.set_members(&[&dn]).await;

    let sp = Arc::new(CountingProvider::new());
    sp.inner.seed(provisioned("mtodd", "g1")).await;

    let bridge = Bridge::new(store.clone(), directory.clone(), sp.clone());
    bridge.sync().await.unwrap();

    assert_eq!(store.guid_for_dn(&dn).await.unwrap().as_deref(), Some("g1"));
    assert_eq!(
        store.dn_for_guid("g1").await.unwrap().as_deref(),
        Some(dn.as_str())
    );
    assert_eq!(sp.adds.load(Ordering::SeqCst), 0);
    assert_eq!(sp.deletes.load(Ordering::SeqCst), 0);

    let roster = sp.list().await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].id, "g1");
    assert_converged(&store, sp.as_ref(), &[dn]).await;
}

#[tokio::test]
async fn sync_removes_provider_user_whose_dn_left_the_group() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let directory = Arc::new(FakeDirectory::new());
    let dn = directory.put_user("mtodd").await;
    directory.set_members(&[]).await;

    let sp = Arc::new(CountingProvider::new());
    sp.inner.seed(provisioned("mtodd", "g1")).await;
    store.add(&dn, &provisioned("mtodd", "g1")).await.unwrap();

    let bridge = Bridge::new(store.clone(), directory.clone(), sp.clone());
    bridge.sync().await.unwrap();

    assert!(sp.list().await.unwrap().is_empty());
    assert!(store.guid_for_dn(&dn).await.unwrap().is_none());
    assert!(store.dn_for_guid("g1").await.unwrap().is_none());
    assert_eq!(sp.deletes.load(Ordering::SeqCst), 1);
    assert_converged(&store, sp.as_ref(), &[]).await;
}

#[tokio::test]
async fn sync_provisions_unbound_group_members() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let directory = Arc::new(FakeDirectory::new());
    let dn = directory.put_user("mtodd").await;
    directory.set_members(&[&dn]).await;

    let sp = Arc::new(CountingProvider::new());

    let bridge = Bridge::new(store.clone(), directory.clone(), sp.clone());
    bridge.sync().await.unwrap();

    let expected = fake_guid("mtodd");
    assert_eq!(
        store.guid_for_dn(&dn).await.unwrap().as_deref(),
        Some(expected.as_str())
    );
    let roster = sp.list().await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].id, expected);
    assert_eq!(roster[0].name.given_name, "mtodd-given");
    assert_converged(&store, sp.as_ref(), &[dn]).await;
}

#[tokio::test]
async fn sync_leaves_unknown_provider_user_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let directory = Arc::new(FakeDirectory::new());
    directory.set_members(&[]).await;

    let sp = Arc::new(CountingProvider::new());
    sp.inner.seed(provisioned("ghost", "g-ghost")).await;

    let bridge = Bridge::new(store.clone(), directory.clone(), sp.clone());
    bridge.sync().await.unwrap();

    // No directory counterpart: warned about, never deleted.
    let roster = sp.list().await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].id, "g-ghost");
    assert!(store.list().await.unwrap().is_empty());
    assert_eq!(sp.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sync_rematerializes_drifted_user_and_rebinds_the_guid() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let directory = Arc::new(FakeDirectory::new());
    let dn = directory.put_user("mtodd").await;
    directory.set_members(&[&dn]).await;

    // Binding exists but the provider lost the user.
    store.add(&dn, &provisioned("mtodd", "g-stale")).await.unwrap();
    let sp = Arc::new(CountingProvider::new());

    let bridge = Bridge::new(store.clone(), directory.clone(), sp.clone());
    bridge.sync().await.unwrap();

    let fresh = fake_guid("mtodd");
    assert_eq!(
        store.guid_for_dn(&dn).await.unwrap().as_deref(),
        Some(fresh.as_str())
    );
    assert!(store.dn_for_guid("g-stale").await.unwrap().is_none());
    let roster = sp.list().await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].id, fresh);
    assert_converged(&store, sp.as_ref(), &[dn]).await;
}

#[tokio::test]
async fn sync_converges_a_mixed_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let directory = Arc::new(FakeDirectory::new());
    let bound_dn = directory.put_user("bound").await;
    let orphan_dn = directory.put_user("orphan").await;
    let fresh_dn = directory.put_user("fresh").await;
    let gone_dn = directory.put_user("gone").await;
    directory
        .set_members(&[&bound_dn, &orphan_dn, &fresh_dn])
        .await;

    let sp = Arc::new(CountingProvider::new());
    // Healthy binding.
    sp.inner.seed(provisioned("bound", "g-bound")).await;
    store
        .add(&bound_dn, &provisioned("bound", "g-bound"))
        .await
        .unwrap();
    // On the provider but unknown to the bridge (orphan from a past
    // partial failure).
    sp.inner.seed(provisioned("orphan", "g-orphan")).await;
    // Bound but no longer a member.
    sp.inner.seed(provisioned("gone", "g-gone")).await;
    store
        .add(&gone_dn, &provisioned("gone", "g-gone"))
        .await
        .unwrap();

    let bridge = Bridge::new(store.clone(), directory.clone(), sp.clone());
    bridge.sync().await.unwrap();

    assert_eq!(
        store.guid_for_dn(&bound_dn).await.unwrap().as_deref(),
        Some("g-bound")
    );
    assert_eq!(
        store.guid_for_dn(&orphan_dn).await.unwrap().as_deref(),
        Some("g-orphan")
    );
    assert_eq!(
        store.guid_for_dn(&fresh_dn).await.unwrap().as_deref(),
        Some(fake_guid("fresh").as_str())
    );
    assert!(store.guid_for_dn(&gone_dn).await.unwrap().is_none());

    assert_converged(
        &store,
        sp.as_ref(),
        &[bound_dn, orphan_dn, fresh_dn],
    )
    .await;
}

#[tokio::test]
async fn transient_provider_failure_is_abandoned_and_healed_by_resync() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let directory = Arc::new(FakeDirectory::new());
    let dn = directory.put_user("mtodd").await;
    directory.set_members(&[&dn]).await;

    let sp = Arc::new(FlakyProvider::failing(1));
    let bridge = Bridge::new(store.clone(), directory.clone(), sp.clone());

    // First attempt hits the 503 and abandons the event.
    bridge.add(&dn).await;
    assert!(sp.list().await.unwrap().is_empty());
    assert!(store.guid_for_dn(&dn).await.unwrap().is_none());

    // A later sync reconverges.
    bridge.sync().await.unwrap();
    assert_eq!(
        store.guid_for_dn(&dn).await.unwrap().as_deref(),
        Some(fake_guid("mtodd").as_str())
    );
    assert_eq!(sp.list().await.unwrap().len(), 1);
}
