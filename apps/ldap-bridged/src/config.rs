//! Daemon configuration: JSON file plus environment overrides.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use bridge_connector_ldap::LdapConfig;
use bridge_scim_client::ScimConfig;

fn default_db_path() -> String {
    "bridge.db".to_string()
}

/// Top-level configuration for `ldap-bridged`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Mapping-store file path.
    pub db_path: String,

    /// Identity provider (directory) settings.
    pub ldap: LdapConfig,

    /// Service provider settings.
    pub scim: ScimConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            ldap: LdapConfig::default(),
            scim: ScimConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load from the given file when present, then apply environment
    /// overrides. With no file, the configuration comes entirely from the
    /// environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("read config file {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parse config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables take precedence over file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(db_path) = std::env::var("DB") {
            self.db_path = db_path;
        }
        if let Ok(addr) = std::env::var("LDAP_ADDR") {
            self.ldap.addr = addr;
        }
        if let Ok(bind_dn) = std::env::var("LDAP_BIND") {
            self.ldap.bind_dn = Some(bind_dn);
        }
        if let Ok(bind_pw) = std::env::var("LDAP_PASS") {
            self.ldap.bind_pw = Some(bind_pw);
        }
        if let Ok(base_dn) = std::env::var("LDAP_BASE") {
            self.ldap.base_dn = base_dn;
        }
        if let Ok(group) = std::env::var("LDAP_GROUP") {
            self.ldap.group_cn = group;
        }
        if let Ok(org) = std::env::var("SCIM_ORG") {
            self.scim.org = org;
        }
        if let Ok(token) = std::env::var("SCIM_TOKEN") {
            self.scim.token = token;
        }
        if let Ok(base_url) = std::env::var("SCIM_BASEURL") {
            self.scim.base_url = base_url;
        }
        if let Ok(dry_run) = std::env::var("SCIM_DRY") {
            self.scim.dry_run = dry_run != "false";
        }
    }

    /// Reject configurations the bridge cannot start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.ldap.validate().context("ldap configuration")?;
        self.scim.validate().context("scim configuration")?;
        Ok(())
    }
}
