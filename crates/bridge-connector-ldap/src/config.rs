//! LDAP provider configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IdpError, IdpResult};

/// Default poll cadence when `check` is not configured.
pub const DEFAULT_POLL_SECS: u64 = 1;

/// Configuration for the LDAP provider.
///
/// `addr` accepts either `host:port` or a full `ldap://`/`ldaps://` URL.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LdapConfig {
    /// Directory server address.
    pub addr: String,

    /// Bind DN; anonymous bind when absent.
    pub bind_dn: Option<String>,

    /// Bind password.
    pub bind_pw: Option<String>,

    /// Base DN the watch query and uid lookups search under.
    pub base_dn: String,

    /// CN of the group whose membership is mirrored.
    #[serde(rename = "groupCN")]
    pub group_cn: String,

    /// Poll cadence override, in seconds.
    pub check: Option<u64>,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("addr", &self.addr)
            .field("bind_dn", &self.bind_dn)
            .field("bind_pw", &self.bind_pw.as_ref().map(|_| "***REDACTED***"))
            .field("base_dn", &self.base_dn)
            .field("group_cn", &self.group_cn)
            .field("check", &self.check)
            .finish()
    }
}

impl LdapConfig {
    /// Connection URL derived from `addr`.
    pub fn url(&self) -> String {
        if self.addr.contains("://") {
            self.addr.clone()
        } else {
            format!("ldap://{}", self.addr)
        }
    }

    /// Poll cadence for the watcher.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.check.unwrap_or(DEFAULT_POLL_SECS))
    }

    /// Reject configurations that cannot possibly connect or watch.
    pub fn validate(&self) -> IdpResult<()> {
        if self.addr.is_empty() {
            return Err(IdpError::InvalidConfig {
                message: "ldap.addr is required".to_string(),
            });
        }
        if self.base_dn.is_empty() {
            return Err(IdpError::InvalidConfig {
                message: "ldap.baseDn is required".to_string(),
            });
        }
        if self.group_cn.is_empty() {
            return Err(IdpError::InvalidConfig {
                message: "ldap.groupCN is required".to_string(),
            });
        }
        Ok(())
    }
}
