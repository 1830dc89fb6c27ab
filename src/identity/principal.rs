use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::role::Role;

/// Free-form attributes attached to a provider-managed user.
pub type Metadata = Map<String, Value>;

/// Metadata field that may be absent, null, or not an object at all.
/// Anything but an object reads as an empty map.
pub(crate) fn lenient_metadata<'de, D>(deserializer: D) -> Result<Metadata, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Object(m)) => m,
        _ => Metadata::new(),
    })
}

/// Fully resolved caller. Derived per request and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    pub display_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// What a single resolver strategy extracts from a credential before role
/// determination and profile enrichment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialIdentity {
    pub id: String,
    pub email: Option<String>,
    pub metadata: Metadata,
}

impl PartialIdentity {
    /// String-valued metadata field, ignoring blanks and non-strings.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        meta_str(&self.metadata, key)
    }
}

pub(crate) fn meta_str<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Local part of an email address (`ana` for `ana@x.com`).
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
