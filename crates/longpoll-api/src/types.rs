//! Response payloads of the bound API methods

use serde::{Deserialize, Deserializer, Serialize};

/// Server/key/ts triple returned by `groups.getLongPollServer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongPollServer {
    pub key: String,
    pub server: String,
    #[serde(deserialize_with = "string_or_number")]
    pub ts: String,
}

/// Community descriptor returned by `groups.getById`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub screen_name: Option<String>,
}

/// `groups.getById` answers with a bare array on older API versions and
/// with `{ "groups": [...] }` on newer ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum GroupsById {
    Wrapped { groups: Vec<Group> },
    List(Vec<Group>),
}

impl GroupsById {
    pub(crate) fn into_groups(self) -> Vec<Group> {
        match self {
            GroupsById::Wrapped { groups } => groups,
            GroupsById::List(groups) => groups,
        }
    }
}

/// Cursor values come back as strings from the bootstrap call but as numbers
/// in some long poll failure payloads. Both end up as the same opaque string;
/// `null` decodes to an empty cursor.
pub fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
