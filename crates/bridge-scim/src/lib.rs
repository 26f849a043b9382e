//! SCIM 2.0 wire types for the user-provisioning surface.
//!
//! Only the subset of the core `User` resource and the `ListResponse`
//! envelope that the bridge exchanges with the service provider is modeled
//! here. Field names follow the wire format exactly; everything else in the
//! workspace works with these types and lets serde handle the casing.

use serde::{Deserialize, Serialize};

/// Canonical schema URI for the SCIM core user resource.
pub const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";

/// Schema URI carried by list-response envelopes.
pub const LIST_RESPONSE_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";

/// A SCIM user resource.
///
/// `id` is assigned by the service provider on creation and stays empty
/// until then; the bridge never generates it locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub schemas: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(rename = "externalId", default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    #[serde(rename = "userName")]
    pub user_name: String,

    #[serde(default)]
    pub name: Name,

    #[serde(default)]
    pub emails: Vec<Email>,

    #[serde(default)]
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Metadata>,
}

/// The `name` complex attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Name {
    #[serde(rename = "givenName", default)]
    pub given_name: String,

    #[serde(rename = "familyName", default)]
    pub family_name: String,
}

/// A single entry of the `emails` multi-valued attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Email {
    #[serde(rename = "type", default)]
    pub email_type: String,

    pub value: String,

    #[serde(default)]
    pub primary: bool,
}

/// The `meta` attribute returned by the service provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "resourceType", default)]
    pub resource_type: String,

    #[serde(default)]
    pub created: String,

    #[serde(rename = "lastModified", default)]
    pub last_modified: String,

    #[serde(default)]
    pub location: String,
}

/// The `ListResponse` envelope.
///
/// The resource array key is capitalized on the wire (`Resources`), as the
/// provider emits it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub schemas: Vec<String>,

    #[serde(rename = "totalResults")]
    pub total_results: usize,

    #[serde(rename = "itemsPerPage", default)]
    pub items_per_page: usize,

    #[serde(rename = "startIndex", default)]
    pub start_index: usize,

    #[serde(rename = "Resources", default)]
    pub resources: Vec<User>,
}

impl User {
    /// A user carrying the canonical schema and an `active` flag, ready to
    /// be filled in by the caller.
    pub fn with_user_name(user_name: impl Into<String>) -> Self {
        Self {
            schemas: vec![USER_SCHEMA.to_string()],
            user_name: user_name.into(),
            active: true,
            ..Self::default()
        }
    }
}
