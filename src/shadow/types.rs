use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One batch element as delivered by the trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub body: String,
}

impl RawRecord {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            message_id: None,
            body: body.into(),
        }
    }
}

/// A device shadow update document.
///
/// Only `state.reported` is singled out; everything else, including explicit
/// nulls, is kept verbatim so the published value carries the full document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub state: ShadowState,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShadowState {
    /// `None` only when the key is absent; `"reported": null` is kept as
    /// `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub reported: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl DeviceEvent {
    pub fn reported(&self) -> Option<&Value> {
        self.state.reported.as_ref()
    }

    /// The `status` object of the report, when there is one.
    pub fn status_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.state
            .reported
            .as_mut()
            .and_then(|reported| reported.get_mut("status"))
            .and_then(Value::as_object_mut)
    }

    /// Device identity, if the report carries a non-empty `thing_name` string.
    pub fn thing_name(&self) -> Option<&str> {
        self.reported()
            .and_then(|reported| reported.get("thing_name"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }
}

/// A message ready for the broker: keyed by device identity, value is the
/// normalized event as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub key: String,
    pub value: String,
}
