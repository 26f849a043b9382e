//! Group-membership change detection.

use std::collections::HashSet;

use async_trait::async_trait;
use ldap3::{LdapError, SearchEntry};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::watch::{Checker, SearchResult};

/// Before/after group snapshots published when a membership change is seen.
#[derive(Clone, Debug)]
pub struct MembershipEvent {
    pub before: SearchEntry,
    pub after: SearchEntry,
}

/// DNs that joined and left between two snapshots. Order is unspecified.
#[derive(Clone, Debug, Default)]
pub struct MembershipDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Membership delta between two group entries: `(after \ before, before \ after)`
/// over the `member` attribute.
pub fn compute_changes(before: &SearchEntry, after: &SearchEntry) -> MembershipDelta {
    let before = member_dns(before);
    let after = member_dns(after);

    MembershipDelta {
        added: after.difference(&before).map(|dn| (*dn).clone()).collect(),
        removed: before.difference(&after).map(|dn| (*dn).clone()).collect(),
    }
}

fn member_dns(entry: &SearchEntry) -> HashSet<&String> {
    entry
        .attrs
        .get("member")
        .map(|values| values.iter().collect())
        .unwrap_or_default()
}

/// Checker that tracks the previous search result for one watched group and
/// publishes a [`MembershipEvent`] whenever the group entry's
/// `modifyTimestamp` moves.
pub struct GroupMembershipChecker {
    prev: Option<SearchResult>,
    events: mpsc::Sender<MembershipEvent>,
}

impl GroupMembershipChecker {
    pub fn new(events: mpsc::Sender<MembershipEvent>) -> Self {
        Self { prev: None, events }
    }
}

#[async_trait]
impl Checker for GroupMembershipChecker {
    async fn check(&mut self, result: Result<SearchResult, LdapError>) {
        let next = match result {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "group search failed");
                return;
            }
        };

        let Some(prev) = &self.prev else {
            debug!(entries = next.entries.len(), "baseline group snapshot recorded");
            self.prev = Some(next);
            return;
        };

        if prev.entries.len() != next.entries.len() {
            // TODO: the entry count changing means membership moved too;
            // emit a full recomputation delta here instead of advancing
            // silently.
            self.prev = Some(next);
            return;
        }

        let (Some(before), Some(after)) = (prev.entries.first(), next.entries.first()) else {
            self.prev = Some(next);
            return;
        };

        if modify_timestamp(before) == modify_timestamp(after) {
            return;
        }

        let event = MembershipEvent {
            before: before.clone(),
            after: after.clone(),
        };
        self.prev = Some(next);

        if self.events.send(event).await.is_err() {
            warn!("membership event receiver dropped");
        }
    }
}

fn modify_timestamp(entry: &SearchEntry) -> Option<&str> {
    entry
        .attrs
        .get("modifyTimestamp")
        .and_then(|values| values.first())
        .map(String::as_str)
}
