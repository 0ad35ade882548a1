//! Schema field mapping
//!
//! Translates logical field names (`price_low`) onto the remote schema's
//! field keys (`custom_objects.quotes.price_low`). Keys that match nothing
//! are dropped and counted, never renamed.

mod coerce;
mod matching;

pub use coerce::{coerce, is_blank, stringify};
pub use matching::{field_matches, find_field, normalize_label, MatchPass};

use crate::error::CrmError;
use crate::gateway::CrmGateway;
use crate::resolve::fetch_schema;
use crate::schema::{short_key, FieldDataType, ObjectDescriptor};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A logical key bound to a remote field, carrying the value to write.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    pub logical_key: String,
    pub remote_key: String,
    pub data_type: FieldDataType,
    pub matched_by: MatchPass,
    /// The caller's raw value, coerced only when the payload is built
    pub value: Value,
}

impl FieldMapping {
    pub fn short_key(&self) -> &str {
        short_key(&self.remote_key)
    }

    /// The value shaped for this field's declared type.
    pub fn coerced_value(&self) -> Value {
        coerce(&self.value, &self.data_type)
    }
}

/// Output of `map_fields`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingResult {
    pub mappings: Vec<FieldMapping>,
    /// Logical keys with no matching remote field
    pub dropped: Vec<String>,
}

impl MappingResult {
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Map each logical key to a field of `descriptor`.
///
/// Never fails: zero matches is a valid (empty) result.
pub fn map_fields(descriptor: &ObjectDescriptor, fields: &Map<String, Value>) -> MappingResult {
    let mut result = MappingResult::default();

    for (logical_key, value) in fields {
        match find_field(logical_key, &descriptor.fields) {
            Some((field, pass)) => result.mappings.push(FieldMapping {
                logical_key: logical_key.clone(),
                remote_key: field.remote_key.clone(),
                data_type: field.data_type.clone(),
                matched_by: pass,
                value: value.clone(),
            }),
            None => result.dropped.push(logical_key.clone()),
        }
    }

    result
}

/// Loads an object's field schema and maps caller fields onto it.
pub struct SchemaFieldMapper {
    gateway: Arc<dyn CrmGateway>,
}

impl SchemaFieldMapper {
    pub fn new(gateway: Arc<dyn CrmGateway>) -> Self {
        Self { gateway }
    }

    /// Make sure `descriptor` carries its fields, fetching the schema detail
    /// by schema key and then by id when they are missing.
    pub async fn load_fields(&self, descriptor: &mut ObjectDescriptor) -> Result<(), CrmError> {
        if !descriptor.fields.is_empty() {
            return Ok(());
        }

        let targets: Vec<String> = [descriptor.schema_key.clone(), descriptor.object_id.clone()]
            .into_iter()
            .flatten()
            .collect();
        if targets.is_empty() {
            return Err(CrmError::UnresolvedObject(format!(
                "'{}' has no id or schema key to fetch fields with",
                descriptor.logical_name
            )));
        }

        let mut last_error = None;
        for target in targets {
            match fetch_schema(self.gateway.as_ref(), &target, &descriptor.logical_name).await {
                Ok(fetched) => {
                    descriptor.fields = fetched.fields;
                    if descriptor.object_id.is_none() {
                        descriptor.object_id = fetched.object_id;
                    }
                    if descriptor.schema_key.is_none() {
                        descriptor.schema_key = fetched.schema_key;
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(target = %target, error = %e, "field schema fetch failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CrmError::UnresolvedObject(descriptor.logical_name.clone())
        }))
    }

    /// Load fields if needed, then map.
    ///
    /// A schema that cannot be fetched is an error; only a loaded schema that
    /// matches nothing yields an empty mapping. Empty input needs no schema.
    #[tracing::instrument(skip(self, descriptor, input), fields(object = %descriptor.logical_name))]
    pub async fn map(
        &self,
        descriptor: &mut ObjectDescriptor,
        input: &Map<String, Value>,
    ) -> Result<MappingResult, CrmError> {
        if input.is_empty() {
            return Ok(MappingResult::default());
        }
        if let Err(e) = self.load_fields(descriptor).await {
            tracing::warn!(error = %e, class = %e.classification(), "field schema unavailable");
            return Err(e);
        }

        let result = map_fields(descriptor, input);
        if result.dropped_count() > 0 {
            tracing::debug!(dropped = ?result.dropped, "logical keys without a remote field");
        }
        Ok(result)
    }
}
