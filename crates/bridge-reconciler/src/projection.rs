//! Directory entry → SCIM user projection.

use bridge_connector_ldap::SearchEntry;
use bridge_scim::{Email, Name, User, USER_SCHEMA};

/// Project a directory entry onto an unprovisioned SCIM user.
///
/// `id` stays empty; the service provider assigns it on creation.
pub fn map_entry(entry: &SearchEntry) -> User {
    User {
        schemas: vec![USER_SCHEMA.to_string()],
        user_name: attr(entry, "uid"),
        name: Name {
            given_name: attr(entry, "givenName"),
            family_name: attr(entry, "sn"),
        },
        emails: vec![Email {
            email_type: "work".to_string(),
            value: attr(entry, "mail"),
            primary: true,
        }],
        active: true,
        ..User::default()
    }
}

fn attr(entry: &SearchEntry, name: &str) -> String {
    entry
        .attrs
        .get(name)
        .and_then(|values| values.first())
        .cloned()
        .unwrap_or_default()
}
