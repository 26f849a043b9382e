//! Live HTTP client for the provider's SCIM v2 user-provisioning API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::{debug, info};

use bridge_scim::{ListResponse, User};

use crate::config::ScimConfig;
use crate::error::{SpError, SpResult};
use crate::ServiceProvider;

/// The provider's SCIM preview media type.
const ACCEPT_SCIM: &str = "application/vnd.github.cloud-9-preview+json+scim";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client against `{base_url}/scim/v2/organizations/{org}/Users`.
pub struct ScimClient {
    http: reqwest::Client,
    base_url: String,
    org: String,
    token: String,
}

impl ScimClient {
    pub fn new(config: &ScimConfig) -> SpResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            org: config.org.clone(),
            token: config.token.clone(),
        })
    }

    fn users_url(&self) -> String {
        format!(
            "{}/scim/v2/organizations/{}/Users",
            self.base_url, self.org
        )
    }

    fn user_url(&self, guid: &str) -> String {
        format!("{}/{}", self.users_url(), guid)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// List users, optionally narrowed by a SCIM filter expression such as
    /// `userName eq "mtodd"`.
    pub async fn list_with_filter(&self, filter: Option<&str>) -> SpResult<Vec<User>> {
        let mut request = self
            .http
            .get(self.users_url())
            .header(ACCEPT, ACCEPT_SCIM)
            .header(AUTHORIZATION, self.bearer());
        if let Some(filter) = filter {
            request = request.query(&[("filter", filter)]);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match status {
            StatusCode::OK => {}
            StatusCode::BAD_REQUEST => return Err(SpError::BadRequest { body }),
            StatusCode::NOT_FOUND => return Err(SpError::NotFound { body }),
            _ => {
                return Err(SpError::UnexpectedStatus {
                    status: status.as_u16(),
                    body,
                })
            }
        }

        let list: ListResponse = serde_json::from_str(&body)?;
        debug!(total = list.total_results, "listed provider users");
        Ok(list.resources)
    }
}

#[async_trait]
impl ServiceProvider for ScimClient {
    async fn add(&self, user: &User) -> SpResult<String> {
        let response = self
            .http
            .post(self.users_url())
            .header(ACCEPT, ACCEPT_SCIM)
            .header(AUTHORIZATION, self.bearer())
            .header(CONTENT_TYPE, "application/json")
            .json(user)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::CREATED {
            return Err(SpError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let created: User = serde_json::from_str(&body)?;
        info!(user_name = %created.user_name, guid = %created.id, "provider user created");
        Ok(created.id)
    }

    async fn delete(&self, guid: &str) -> SpResult<()> {
        let response = self
            .http
            .delete(self.user_url(guid))
            .header(ACCEPT, ACCEPT_SCIM)
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            let body = response.text().await?;
            return Err(SpError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        info!(guid, "provider user removed");
        Ok(())
    }

    async fn list(&self) -> SpResult<Vec<User>> {
        self.list_with_filter(None).await
    }
}
