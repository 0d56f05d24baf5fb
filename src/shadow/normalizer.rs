use crate::shadow::envelope::unwrap_document;
use crate::shadow::types::{DeviceEvent, OutboundMessage, RawRecord};
use crate::{Error, Result};
use serde_json::Value;

/// Status field written by devices on the old firmware schema.
pub const LEGACY_MODE_FIELD: &str = "thermostat_mode";
pub const MODE_FIELD: &str = "mode";

/// A device event ready to publish, with its routing identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub thing_name: String,
    pub event: DeviceEvent,
}

impl NormalizedEvent {
    pub fn into_message(self) -> Result<OutboundMessage> {
        Ok(OutboundMessage {
            value: serde_json::to_string(&self.event)?,
            key: self.thing_name,
        })
    }
}

/// Parses a record body into a device event.
pub fn decode_record(record: &RawRecord, unwrap_envelopes: bool) -> Result<DeviceEvent> {
    let mut document: Value = serde_json::from_str(&record.body)
        .map_err(|e| Error::validation(format!("record body is not JSON: {}", e)))?;

    if unwrap_envelopes {
        document = unwrap_document(document)?;
    }

    serde_json::from_value(document)
        .map_err(|e| Error::validation(format!("record is not a shadow update: {}", e)))
}

/// Moves `status.thermostat_mode` to `status.mode`, replacing any existing
/// `mode`. Returns whether a rename happened.
pub fn rename_legacy_mode(event: &mut DeviceEvent) -> bool {
    match event.status_mut() {
        Some(status) => match status.remove(LEGACY_MODE_FIELD) {
            Some(mode) => {
                status.insert(MODE_FIELD.to_string(), mode);
                true
            }
            None => false,
        },
        None => false,
    }
}

/// Applies the schema shim and extracts the device identity from
/// `state.reported.thing_name`.
///
/// Idempotent: an already normalized event comes back unchanged.
pub fn normalize(mut event: DeviceEvent) -> Result<NormalizedEvent> {
    rename_legacy_mode(&mut event);

    let thing_name = event
        .thing_name()
        .ok_or_else(|| Error::validation("No thing name found"))?
        .to_string();

    Ok(NormalizedEvent { thing_name, event })
}
