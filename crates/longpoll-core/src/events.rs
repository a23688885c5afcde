//! Wire types of the long poll response

use longpoll_api::string_or_number;
use serde::{Deserialize, Serialize};

/// One event from the `updates` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub object: serde_json::Value,
    #[serde(default)]
    pub group_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<String>,
}

impl GroupEvent {
    pub fn new(event_type: impl Into<String>, object: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            object,
            group_id: 0,
            event_id: None,
            v: None,
        }
    }
}

/// Decoded body of one `a_check` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollResponse {
    /// Cursor to echo back on the next call. Empty when the server omits it.
    #[serde(default, deserialize_with = "string_or_number")]
    pub ts: String,
    #[serde(default)]
    pub updates: Vec<GroupEvent>,
    /// Absent and `0` both mean a normal batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<i64>,
}

impl PollResponse {
    pub fn is_failure(&self) -> bool {
        !matches!(self.failed, None | Some(0))
    }
}

/// Per-batch context handed to event handlers alongside each event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    /// Cursor value of the response the event arrived in
    pub ts: String,
    pub group_id: i64,
}
