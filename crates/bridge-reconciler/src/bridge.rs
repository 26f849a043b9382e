//! The bridge orchestrator: startup sync and the runtime event loop.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use bridge_connector_ldap::{IdentityProvider, MembershipStreams};
use bridge_scim_client::ServiceProvider;
use bridge_store::MappingStore;

use crate::error::BridgeError;
use crate::projection::map_entry;

/// Keeps the service provider and the mapping store consistent with the
/// directory group.
///
/// All mutations flow through one instance driven by a single task, so the
/// store's transactional discipline alone is enough; no application-level
/// locking is layered on top.
pub struct Bridge {
    store: MappingStore,
    idp: Arc<dyn IdentityProvider>,
    sp: Arc<dyn ServiceProvider>,
}

impl Bridge {
    pub fn new(
        store: MappingStore,
        idp: Arc<dyn IdentityProvider>,
        sp: Arc<dyn ServiceProvider>,
    ) -> Self {
        Self { store, idp, sp }
    }

    /// Startup three-way sync between the provider roster, the directory
    /// group, and the mapping store.
    ///
    /// First pass walks the provider roster: unknown users are correlated
    /// back to the directory by `userName` and their binding recorded; users
    /// bound to a DN that left the group are removed. Second pass walks the
    /// group: unbound members are provisioned, and members whose binding
    /// points at a user missing on the provider are re-created and rebound.
    pub async fn sync(&self) -> Result<(), BridgeError> {
        let sp_users = self.sp.list().await?;
        let result = self.idp.search(None).await?;
        let group = result.entries.first().ok_or(BridgeError::GroupNotFound)?;
        let member_dns: HashSet<String> = group
            .attrs
            .get("member")
            .map(|values| values.iter().cloned().collect())
            .unwrap_or_default();

        info!(
            provider_users = sp_users.len(),
            group_members = member_dns.len(),
            "startup sync"
        );

        // DNs whose provider-side user is known to exist.
        let mut on_sp: HashSet<String> = HashSet::new();

        for sp_user in &sp_users {
            match self.store.dn_for_guid(&sp_user.id).await? {
                None => match self.idp.fetch_uid(&sp_user.user_name).await {
                    Ok(entries) => match entries.into_iter().next() {
                        Some(entry) => {
                            info!(
                                dn = %entry.dn,
                                guid = %sp_user.id,
                                "recorded binding for existing provider user"
                            );
                            self.store.add(&entry.dn, sp_user).await?;
                            on_sp.insert(entry.dn);
                        }
                        None => warn!(
                            user_name = %sp_user.user_name,
                            guid = %sp_user.id,
                            "provider user has no directory counterpart; leaving untouched"
                        ),
                    },
                    Err(e) => warn!(
                        user_name = %sp_user.user_name,
                        guid = %sp_user.id,
                        error = %e,
                        "directory lookup for provider user failed; leaving untouched"
                    ),
                },
                Some(dn) if !member_dns.contains(&dn) => {
                    self.del(&dn).await;
                }
                Some(dn) => {
                    on_sp.insert(dn);
                }
            }
        }

        for dn in &member_dns {
            match self.store.guid_for_dn(dn).await? {
                None => self.add(dn).await,
                Some(stale_guid) if !on_sp.contains(dn) => {
                    // Bound but missing on the provider: re-create and
                    // rebind to the newly assigned GUID.
                    let entry = self.idp.fetch(dn).await?;
                    let mut user = map_entry(&entry);
                    let guid = self.sp.add(&user).await?;
                    user.id = guid;
                    self.store.delete(dn, &stale_guid).await?;
                    self.store.add(dn, &user).await?;
                    info!(dn = %dn, "re-provisioned drifted user");
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Event loop: apply add/remove operations as the membership streams
    /// deliver them, strictly one at a time, until both streams close.
    ///
    /// When both streams hold items the pick between them is unspecified;
    /// each stream individually drains in FIFO order.
    pub async fn run(&self, mut streams: MembershipStreams) {
        let mut added_open = true;
        let mut removed_open = true;

        while added_open || removed_open {
            tokio::select! {
                added = streams.added.recv(), if added_open => match added {
                    Some(dn) => self.add(&dn).await,
                    None => added_open = false,
                },
                removed = streams.removed.recv(), if removed_open => match removed {
                    Some(dn) => self.del(&dn).await,
                    None => removed_open = false,
                },
            }
        }
        info!("membership streams closed; event loop exiting");
    }

    /// Provision `dn`: fetch the entry, create the provider user, persist
    /// the binding. Failures are logged and the event abandoned; the next
    /// poll tick or startup sync reconverges.
    pub async fn add(&self, dn: &str) {
        info!(dn, "add");

        match self.store.guid_for_dn(dn).await {
            Ok(Some(_)) => {
                debug!(dn, "already provisioned; skipping");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                error!(dn, error = %e, "add: mapping store lookup failed");
                return;
            }
        }

        let entry = match self.idp.fetch(dn).await {
            Ok(entry) => entry,
            Err(e) => {
                error!(dn, error = %e, "add: directory fetch failed");
                return;
            }
        };

        let mut user = map_entry(&entry);
        let guid = match self.sp.add(&user).await {
            Ok(guid) => guid,
            Err(e) => {
                error!(
                    dn,
                    error = %e,
                    transient = e.is_transient(),
                    "add: service provider rejected user"
                );
                return;
            }
        };
        user.id = guid;

        if let Err(e) = self.store.add(dn, &user).await {
            error!(
                dn,
                guid = %user.id,
                error = %e,
                "add: mapping store write failed; orphan remains on the provider until the next sync"
            );
            return;
        }

        info!(dn, guid = %user.id, "added");
    }

    /// Deprovision `dn`: delete the provider user, then drop the binding.
    /// The binding is only removed after the provider confirms deletion.
    pub async fn del(&self, dn: &str) {
        info!(dn, "remove");

        let guid = match self.store.guid_for_dn(dn).await {
            Ok(Some(guid)) => guid,
            Ok(None) => {
                info!(dn, "remove: no binding; already removed");
                return;
            }
            Err(e) => {
                error!(dn, error = %e, "remove: mapping store lookup failed");
                return;
            }
        };

        if let Err(e) = self.sp.delete(&guid).await {
            error!(
                dn,
                guid = %guid,
                error = %e,
                transient = e.is_transient(),
                "remove: service provider delete failed"
            );
            return;
        }

        if let Err(e) = self.store.delete(dn, &guid).await {
            error!(dn, guid = %guid, error = %e, "remove: mapping store delete failed");
            return;
        }

        info!(dn, guid = %guid, "removed");
    }
}
