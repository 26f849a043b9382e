//! Generic poll-based directory watcher.
//!
//! The watcher knows nothing about group semantics: it re-executes each
//! registered search on a fixed cadence and hands the outcome to that
//! registration's [`Checker`]. Checkers are state-bearing and are invoked
//! sequentially from the single poll task, so a checker never observes two
//! overlapping invocations.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapError, SearchEntry, Scope};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// A registered search: base, scope, filter, and requested attributes.
#[derive(Clone)]
pub struct WatchQuery {
    pub base: String,
    pub scope: Scope,
    pub filter: String,
    pub attrs: Vec<String>,
}

/// Parsed result of one watch poll.
#[derive(Clone, Debug)]
pub struct SearchResult {
    pub entries: Vec<SearchEntry>,
}

/// Capability the watcher requires of a registration.
///
/// Receives the fresh search result, or the transport error when the search
/// failed; the watcher itself never retries. One checker instance belongs to
/// exactly one registration.
#[async_trait]
pub trait Checker: Send + 'static {
    async fn check(&mut self, result: Result<SearchResult, LdapError>);
}

struct Registration {
    query: WatchQuery,
    checker: Box<dyn Checker>,
}

/// Poll-based watcher over a shared LDAP connection.
pub struct Watcher {
    ldap: Ldap,
    period: Duration,
    registrations: Vec<Registration>,
    task: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Watcher {
    pub fn new(ldap: Ldap, period: Duration) -> Self {
        Self {
            ldap,
            period,
            registrations: Vec::new(),
            task: None,
            shutdown: None,
        }
    }

    /// Register a search with its checker. Must be called before `start`.
    pub fn add(&mut self, query: WatchQuery, checker: Box<dyn Checker>) {
        self.registrations.push(Registration { query, checker });
    }

    /// Spawn the poll task. Idempotent; the first tick fires immediately.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        let (tx, rx) = oneshot::channel();
        let ldap = self.ldap.clone();
        let period = self.period;
        let registrations = std::mem::take(&mut self.registrations);

        self.shutdown = Some(tx);
        self.task = Some(tokio::spawn(poll_loop(ldap, period, registrations, rx)));
    }

    /// Halt the ticker and wait for the poll task to exit.
    ///
    /// After `stop` returns no further checker invocation happens, and the
    /// registrations (with any channels their checkers hold) are dropped.
    pub async fn stop(&mut self) {
        self.shutdown.take();
        if let Some(task) = self.task.take() {
            if task.await.is_err() {
                warn!("watcher poll task panicked");
            }
        }
    }
}

async fn poll_loop(
    mut ldap: Ldap,
    period: Duration,
    mut registrations: Vec<Registration>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    // A tick that would overlap an in-flight search is skipped, not queued.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                for registration in &mut registrations {
                    let result = run_search(&mut ldap, &registration.query).await;
                    registration.checker.check(result).await;
                }
            }
        }
    }
    debug!("watcher poll task exiting");
}

async fn run_search(ldap: &mut Ldap, query: &WatchQuery) -> Result<SearchResult, LdapError> {
    let attrs: Vec<&str> = query.attrs.iter().map(String::as_str).collect();
    let (entries, _) = ldap
        .search(&query.base, query.scope, &query.filter, attrs)
        .await?
        .success()?;

    Ok(SearchResult {
        entries: entries.into_iter().map(SearchEntry::construct).collect(),
    })
}
