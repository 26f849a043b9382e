//! Directory side of the bridge.
//!
//! Three layers, generic to specific:
//!
//! - [`watch`] — a poll-based watcher that re-runs registered searches on a
//!   cadence and hands each result to a state-bearing [`Checker`];
//! - [`checker`] — the group-membership checker, which detects a mutation of
//!   the watched group and publishes before/after snapshots;
//! - [`provider`] — [`LdapProvider`], wrapping the connection, the watch
//!   registration, and the `Added`/`Removed` DN streams the reconciler
//!   consumes.

pub mod checker;
pub mod config;
pub mod error;
pub mod provider;
pub mod watch;

pub use checker::{compute_changes, GroupMembershipChecker, MembershipDelta, MembershipEvent};
pub use config::LdapConfig;
pub use error::{IdpError, IdpResult};
pub use provider::{IdentityProvider, LdapProvider, MembershipStreams};
pub use watch::{Checker, SearchResult, WatchQuery, Watcher};

// Directory entry and scope types are part of this crate's public surface.
pub use ldap3::{Scope, SearchEntry};
