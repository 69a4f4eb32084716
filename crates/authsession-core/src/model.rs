//! Session data model.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Opaque bearer credential plus arbitrary auth metadata.
///
/// A credential is never patched: callers build a new one and replace the
/// old one wholesale, so there are no setters.
///
/// Serialized flat, e.g. `{"api_token":"...","refreshToken":"..."}`; every
/// field besides the token is metadata and survives a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "api_token", alias = "token")]
    token: String,

    #[serde(default, flatten)]
    metadata: HashMap<String, Value>,
}

impl Credential {
    /// Create a credential carrying only a bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            metadata: HashMap::new(),
        }
    }

    /// Create a credential with metadata (refresh token, expiry, ...).
    #[must_use]
    pub fn with_metadata(token: impl Into<String>, metadata: HashMap<String, Value>) -> Self {
        Self {
            token: token.into(),
            metadata,
        }
    }

    /// The bearer token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get a metadata value by key.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// A credential with a blank token cannot authenticate anything.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

/// Profile of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Backend user id. Numeric ids are kept in their decimal form.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// Name to show for the user, if the backend sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Contact address, if the backend sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Remaining profile attributes, kept verbatim.
    #[serde(default, flatten)]
    pub attributes: HashMap<String, Value>,
}

impl Identity {
    /// Create an identity with only an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
            attributes: HashMap::new(),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Authorization grants bound to the current credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default)]
    grants: BTreeSet<String>,
}

impl PermissionSet {
    /// Create a set from grant names. Duplicates collapse.
    #[must_use]
    pub fn new<I>(grants: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            grants: grants.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `grant` is part of this set.
    #[must_use]
    pub fn allows(&self, grant: &str) -> bool {
        self.grants.contains(grant)
    }

    /// Grants in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.grants.iter().map(String::as_str)
    }

    /// Number of grants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// True when nothing is granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

/// Snapshot of the current session.
///
/// Only [`crate::SessionState`] builds these; consumers get read-only copies.
/// Identity and permissions are never present without a credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub(crate) credential: Option<Credential>,
    pub(crate) identity: Option<Identity>,
    pub(crate) permissions: Option<PermissionSet>,
}

impl Session {
    #[must_use]
    pub const fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub const fn permissions(&self) -> Option<&PermissionSet> {
        self.permissions.as_ref()
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// True when no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.credential.is_none() && self.identity.is_none() && self.permissions.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_keeps_top_level_metadata() {
        let raw = serde_json::json!({ "api_token": "abc", "refreshToken": "r1", "expires": 60 });
        let cred: Credential = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(cred.token(), "abc");
        assert_eq!(cred.metadata("refreshToken"), Some(&Value::from("r1")));
        assert_eq!(cred.metadata("expires"), Some(&Value::from(60)));

        assert_eq!(serde_json::to_value(&cred).unwrap(), raw);
    }

    #[test]
    fn test_credential_accepts_token_field() {
        let cred: Credential = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        assert_eq!(cred, Credential::new("abc"));
    }

    #[test]
    fn test_blank_token_is_unusable() {
        assert!(!Credential::new("   ").is_usable());
        assert!(Credential::new("t").is_usable());
    }

    #[test]
    fn test_identity_keeps_unknown_attributes() {
        let identity: Identity =
            serde_json::from_str(r#"{"id":"7","email":"a@b.c","first_name":"Ada"}"#).unwrap();
        assert_eq!(identity.id, "7");
        assert_eq!(identity.email.as_deref(), Some("a@b.c"));
        assert_eq!(identity.attributes.get("first_name"), Some(&Value::from("Ada")));
    }

    #[test]
    fn test_identity_accepts_numeric_id() {
        let identity: Identity =
            serde_json::from_str(r#"{"id":7,"email":"a@b.c","first_name":"Ada"}"#).unwrap();
        assert_eq!(identity.id, "7");
        assert_eq!(identity.email.as_deref(), Some("a@b.c"));
        assert!(!identity.attributes.contains_key("id"));

        assert!(serde_json::from_str::<Identity>(r#"{"id":true}"#).is_err());
    }

    #[test]
    fn test_permission_set_allows() {
        let perms = PermissionSet::new(["users.read", "users.write"]);
        assert!(perms.allows("users.read"));
        assert!(!perms.allows("admin"));
        assert_eq!(perms.len(), 2);
    }
}
