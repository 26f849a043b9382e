//! Service-provider configuration.

use serde::{Deserialize, Serialize};

use crate::error::{SpError, SpResult};

fn default_base_url() -> String {
    "https://api.github.com".to_string()
}

/// Configuration for the SCIM service provider.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScimConfig {
    /// Organization whose user roster is provisioned.
    pub org: String,

    /// Bearer token for the provisioning API.
    pub token: String,

    /// API base URL.
    #[serde(rename = "baseURL")]
    pub base_url: String,

    /// Use the in-memory fake instead of the live endpoint.
    pub dry_run: bool,
}

impl Default for ScimConfig {
    fn default() -> Self {
        Self {
            org: String::new(),
            token: String::new(),
            base_url: default_base_url(),
            dry_run: false,
        }
    }
}

impl std::fmt::Debug for ScimConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScimConfig")
            .field("org", &self.org)
            .field("token", &if self.token.is_empty() { "" } else { "***REDACTED***" })
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl ScimConfig {
    /// Reject configurations the live client cannot use.
    ///
    /// Dry runs only need the organization name.
    pub fn validate(&self) -> SpResult<()> {
        if self.org.is_empty() {
            return Err(SpError::InvalidConfig {
                message: "scim.org is required".to_string(),
            });
        }
        if !self.dry_run && self.token.is_empty() {
            return Err(SpError::InvalidConfig {
                message: "scim.token is required unless dryRun is set".to_string(),
            });
        }
        Ok(())
    }
}
