//! LDAP provider: connection lifecycle, watch registration, lookups, and
//! the `Added`/`Removed` DN streams.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::checker::{compute_changes, GroupMembershipChecker, MembershipEvent};
use crate::config::LdapConfig;
use crate::error::{IdpError, IdpResult};
use crate::watch::{SearchResult, WatchQuery, Watcher};

/// Attributes requested on entry fetches.
const FETCH_ATTRS: [&str; 7] = [
    "dn",
    "uid",
    "cn",
    "sn",
    "givenName",
    "mail",
    "modifyTimestamp",
];

/// Capacity of the checker's internal event channel.
const EVENT_BUFFER: usize = 16;

/// Capacity of each DN stream. Bounded: a runaway directory must apply
/// backpressure to the poll side instead of growing the queue.
const STREAM_BUFFER: usize = 64;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The DN streams fed by the membership checker. Single producer, single
/// consumer; both close when the provider stops.
pub struct MembershipStreams {
    pub added: mpsc::Receiver<String>,
    pub removed: mpsc::Receiver<String>,
}

/// Directory lookups the reconciler depends on.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Base-object search for one entry; errors if the DN matches nothing.
    async fn fetch(&self, dn: &str) -> IdpResult<SearchEntry>;

    /// Subtree search by `uid` under the configured base.
    async fn fetch_uid(&self, uid: &str) -> IdpResult<Vec<SearchEntry>>;

    /// Run `query`, or the registered watch query when absent.
    async fn search(&self, query: Option<&WatchQuery>) -> IdpResult<SearchResult>;
}

/// LDAP-backed identity provider.
pub struct LdapProvider {
    config: LdapConfig,
    ldap: RwLock<Option<Ldap>>,
    watcher: Mutex<Option<Watcher>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl LdapProvider {
    pub fn new(config: LdapConfig) -> Self {
        Self {
            config,
            ldap: RwLock::new(None),
            watcher: Mutex::new(None),
            forwarder: Mutex::new(None),
        }
    }

    /// Dial, bind when credentials are configured, register the group watch,
    /// and spawn the event-forwarding worker.
    ///
    /// Returns the membership streams once the registration is in place.
    pub async fn start(&self) -> IdpResult<MembershipStreams> {
        self.config.validate()?;

        let url = self.config.url();
        let settings = LdapConnSettings::new().set_conn_timeout(CONNECT_TIMEOUT);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|source| IdpError::Connection {
                message: format!("failed to connect to {url}"),
                source,
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "ldap connection driver error");
            }
        });

        if let Some(bind_dn) = &self.config.bind_dn {
            let password = self.config.bind_pw.as_deref().unwrap_or("");
            let result = ldap
                .simple_bind(bind_dn, password)
                .await
                .map_err(|source| IdpError::Connection {
                    message: format!("bind failed for {bind_dn}"),
                    source,
                })?;
            if result.rc == 49 {
                return Err(IdpError::InvalidCredentials);
            }
            if result.rc != 0 {
                return Err(IdpError::Bind {
                    rc: result.rc,
                    text: result.text,
                });
            }
            info!(bind_dn = %bind_dn, "ldap bind succeeded");
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (added_tx, added_rx) = mpsc::channel(STREAM_BUFFER);
        let (removed_tx, removed_rx) = mpsc::channel(STREAM_BUFFER);

        let mut watcher = Watcher::new(ldap.clone(), self.config.poll_interval());
        watcher.add(
            self.watch_query(),
            Box::new(GroupMembershipChecker::new(event_tx)),
        );
        watcher.start();

        let forwarder = tokio::spawn(forward_events(event_rx, added_tx, removed_tx));

        *self.ldap.write().await = Some(ldap);
        *self.watcher.lock().await = Some(watcher);
        *self.forwarder.lock().await = Some(forwarder);

        info!(
            group = %self.config.group_cn,
            base = %self.config.base_dn,
            "identity provider started"
        );
        Ok(MembershipStreams {
            added: added_rx,
            removed: removed_rx,
        })
    }

    /// Stop the watcher, drain the forwarder, and close the connection.
    ///
    /// Stopping the watcher drops the checker and with it the event channel
    /// sender, so the forwarder drains what is queued and exits, which in
    /// turn closes the membership streams.
    pub async fn stop(&self) {
        if let Some(mut watcher) = self.watcher.lock().await.take() {
            watcher.stop().await;
        }
        if let Some(forwarder) = self.forwarder.lock().await.take() {
            if forwarder.await.is_err() {
                warn!("event forwarder panicked");
            }
        }
        if let Some(mut ldap) = self.ldap.write().await.take() {
            if let Err(e) = ldap.unbind().await {
                warn!(error = %e, "ldap unbind failed");
            }
        }
        info!("identity provider stopped");
    }

    /// The registered group-membership query.
    pub fn watch_query(&self) -> WatchQuery {
        WatchQuery {
            base: self.config.base_dn.clone(),
            scope: Scope::Subtree,
            filter: format!("(cn={})", escape_filter_value(&self.config.group_cn)),
            attrs: vec!["*".to_string(), "modifyTimestamp".to_string()],
        }
    }

    async fn connection(&self) -> IdpResult<Ldap> {
        self.ldap.read().await.clone().ok_or(IdpError::NotStarted)
    }
}

#[async_trait]
impl IdentityProvider for LdapProvider {
    async fn fetch(&self, dn: &str) -> IdpResult<SearchEntry> {
        let mut ldap = self.connection().await?;
        let (entries, _) = ldap
            .search(dn, Scope::Base, "(objectClass=*)", FETCH_ATTRS.to_vec())
            .await?
            .success()?;

        entries
            .into_iter()
            .next()
            .map(SearchEntry::construct)
            .ok_or_else(|| IdpError::EntryNotFound { dn: dn.to_string() })
    }

    async fn fetch_uid(&self, uid: &str) -> IdpResult<Vec<SearchEntry>> {
        let mut ldap = self.connection().await?;
        let filter = format!("(&(objectClass=*)(uid={}))", escape_filter_value(uid));
        let (entries, _) = ldap
            .search(
                &self.config.base_dn,
                Scope::Subtree,
                &filter,
                FETCH_ATTRS.to_vec(),
            )
            .await?
            .success()?;

        Ok(entries.into_iter().map(SearchEntry::construct).collect())
    }

    async fn search(&self, query: Option<&WatchQuery>) -> IdpResult<SearchResult> {
        let mut ldap = self.connection().await?;
        let registered;
        let query = match query {
            Some(query) => query,
            None => {
                registered = self.watch_query();
                &registered
            }
        };

        let attrs: Vec<&str> = query.attrs.iter().map(String::as_str).collect();
        let (entries, _) = ldap
            .search(&query.base, query.scope, &query.filter, attrs)
            .await?
            .success()?;

        Ok(SearchResult {
            entries: entries.into_iter().map(SearchEntry::construct).collect(),
        })
    }
}

/// Consume membership events, compute each delta, and forward the DNs.
///
/// Within one event every added DN is emitted before any removed DN; across
/// events the order matches the watcher's tick order. Exits when either the
/// event channel or a downstream receiver closes.
async fn forward_events(
    mut events: mpsc::Receiver<MembershipEvent>,
    added: mpsc::Sender<String>,
    removed: mpsc::Sender<String>,
) {
    while let Some(event) = events.recv().await {
        let delta = compute_changes(&event.before, &event.after);
        info!(
            added = delta.added.len(),
            removed = delta.removed.len(),
            "membership change detected"
        );

        for dn in delta.added {
            if added.send(dn).await.is_err() {
                return;
            }
        }
        for dn in delta.removed {
            if removed.send(dn).await.is_err() {
                return;
            }
        }
    }
}

/// Escape special characters in a filter value per RFC 4515.
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}
