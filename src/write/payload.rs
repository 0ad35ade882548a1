//! Record payload construction and write-response unwrapping

use crate::error::CrmError;
use crate::mapping::{is_blank, FieldMapping};
use crate::schema::RemoteId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Which form of the remote field key a payload is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyShape {
    /// `price_low`
    Short,
    /// `custom_objects.quotes.price_low`
    FullPath,
}

impl std::fmt::Display for KeyShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Short => write!(f, "short keys"),
            Self::FullPath => write!(f, "full-path keys"),
        }
    }
}

/// The outbound body of one record-creation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPayload {
    pub shape: KeyShape,
    /// Remote key (in `shape` form) → coerced value; never blank
    pub properties: Map<String, Value>,
}

impl RecordPayload {
    /// Coerce every mapping and key it by `shape`, skipping blank values.
    pub fn build(mappings: &[FieldMapping], shape: KeyShape) -> Self {
        let mut properties = Map::new();
        for mapping in mappings {
            if is_blank(&mapping.value) {
                continue;
            }
            let value = mapping.coerced_value();
            if is_blank(&value) {
                continue;
            }
            let key = match shape {
                KeyShape::Short => mapping.short_key().to_string(),
                KeyShape::FullPath => mapping.remote_key.clone(),
            };
            properties.insert(key, value);
        }
        Self { shape, properties }
    }

    /// JSON body for the records endpoint.
    pub fn to_body(&self, location_id: &str) -> Value {
        json!({
            "locationId": location_id,
            "properties": self.properties,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordEnvelope {
    Record { record: RemoteId },
    Data { data: RemoteId },
    Bare(RemoteId),
}

/// Extract the new record's id from a creation response.
pub fn unwrap_record_id(value: &Value) -> Result<String, CrmError> {
    let envelope: RecordEnvelope = serde_json::from_value(value.clone())
        .map_err(|e| CrmError::Parse(format!("unrecognizable record response: {}", e)))?;

    let id = match envelope {
        RecordEnvelope::Record { record: ids }
        | RecordEnvelope::Data { data: ids }
        | RecordEnvelope::Bare(ids) => ids.into_id(),
    };

    id.ok_or_else(|| CrmError::Parse("record response carries no id".to_string()))
}
