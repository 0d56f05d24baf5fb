//! Recovery of shadow documents from IoT rule-action error envelopes.
//!
//! When a topic rule fails to deliver, the error action forwards a wrapper
//! carrying the rule name, the source topic and the original payload encoded
//! as base64. Such wrappers are unwrapped back into the shadow document so a
//! failed delivery can be replayed through the normal path.

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

const ACCEPTED_TOPIC_MARKER: &str = "/update/accepted";

#[derive(Debug, Deserialize)]
struct RuleErrorEnvelope {
    #[serde(rename = "ruleName")]
    rule_name: String,
    #[serde(default)]
    topic: String,
    #[serde(rename = "base64OriginalPayload")]
    original_payload: String,
}

fn is_envelope(document: &Value) -> bool {
    document.get("ruleName").is_some() && document.get("base64OriginalPayload").is_some()
}

/// Returns the shadow document carried by `document`.
///
/// Plain documents pass through untouched. An envelope whose source topic is
/// not a shadow `update/accepted` topic is rejected as a rule match failure.
pub fn unwrap_document(document: Value) -> Result<Value> {
    if !is_envelope(&document) {
        return Ok(document);
    }

    let envelope: RuleErrorEnvelope = serde_json::from_value(document)
        .map_err(|e| Error::validation(format!("malformed rule error envelope: {}", e)))?;

    if !envelope.topic.contains(ACCEPTED_TOPIC_MARKER) {
        warn!(
            rule = %envelope.rule_name,
            topic = %envelope.topic,
            "RuleMatch failure - Nothing to process"
        );
        return Err(Error::validation(format!(
            "RuleMatch failure: topic '{}' is not a shadow update",
            envelope.topic
        )));
    }

    let decoded = STANDARD
        .decode(envelope.original_payload.trim())
        .map_err(|e| Error::validation(format!("invalid base64 original payload: {}", e)))?;

    debug!(rule = %envelope.rule_name, "Unwrapped rule error envelope");

    serde_json::from_slice(&decoded)
        .map_err(|e| Error::validation(format!("original payload is not JSON: {}", e)))
}
