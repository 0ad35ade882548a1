//! Response envelopes for schema discovery
//!
//! The listing and detail endpoints wrap their payload under different keys
//! depending on API generation (`objects`, `data`, `schemas`, `object`,
//! `schema`, or nothing at all). Each shape is a variant here, and the
//! unwrap functions either return a typed payload or a parse error.

use super::{FieldDataType, FieldDescriptor};
use crate::error::CrmError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Labels {
    #[serde(default)]
    pub singular: Option<String>,
    #[serde(default)]
    pub plural: Option<String>,
}

/// An object type as returned by listing or detail endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawObject")]
pub struct RemoteObject {
    pub id: Option<String>,
    pub key: Option<String>,
    pub name: Option<String>,
    pub labels: Option<Labels>,
    pub fields: Vec<RemoteField>,
}

/// Identifier spellings seen across deployments; the first present wins.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RemoteId {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "lenient_id")]
    underscore_id: Option<String>,
    #[serde(default, rename = "objectId", deserialize_with = "lenient_id")]
    object_id: Option<String>,
    #[serde(default, rename = "associationId", deserialize_with = "lenient_id")]
    association_id: Option<String>,
}

impl RemoteId {
    pub(crate) fn into_id(self) -> Option<String> {
        self.id
            .or(self.underscore_id)
            .or(self.object_id)
            .or(self.association_id)
    }
}

/// Wire form of an object; deployments disagree on identifier field names
/// and some send more than one of them.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObject {
    #[serde(flatten)]
    ids: RemoteId,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    schema_key: Option<String>,
    #[serde(default)]
    object_key: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    labels: Option<Labels>,
    #[serde(default)]
    fields: Vec<RemoteField>,
}

impl From<RawObject> for RemoteObject {
    fn from(raw: RawObject) -> Self {
        Self {
            id: raw.ids.into_id(),
            key: raw.key.or(raw.schema_key).or(raw.object_key),
            name: raw.name,
            labels: raw.labels,
            fields: raw.fields,
        }
    }
}

impl RemoteObject {
    /// Every name this object answers to: key, labels, display name.
    pub fn names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if let Some(key) = &self.key {
            names.push(key.as_str());
        }
        if let Some(labels) = &self.labels {
            names.extend(labels.singular.as_deref());
            names.extend(labels.plural.as_deref());
        }
        if let Some(name) = &self.name {
            names.push(name.as_str());
        }
        names
    }

    fn is_recognizable(&self) -> bool {
        self.id.is_some() || self.key.is_some()
    }
}

/// A field definition inside a schema detail response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawField")]
pub struct RemoteField {
    pub field_key: Option<String>,
    pub name: Option<String>,
    pub data_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawField {
    #[serde(default)]
    field_key: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    data_type: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl From<RawField> for RemoteField {
    fn from(raw: RawField) -> Self {
        Self {
            field_key: raw.field_key.or(raw.key),
            name: raw.name.or(raw.label),
            data_type: raw.data_type.or(raw.kind),
        }
    }
}

impl RemoteField {
    pub(crate) fn into_descriptor(self) -> Option<FieldDescriptor> {
        let remote_key = self.field_key.filter(|k| !k.trim().is_empty())?;
        let display_name = self
            .name
            .unwrap_or_else(|| super::short_key(&remote_key).to_string());
        let data_type = FieldDataType::from_remote(self.data_type.as_deref().unwrap_or(""));
        Some(FieldDescriptor {
            remote_key,
            display_name,
            data_type,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListingEnvelope {
    Objects { objects: Vec<RemoteObject> },
    Data { data: Vec<RemoteObject> },
    Schemas { schemas: Vec<RemoteObject> },
    Bare(Vec<RemoteObject>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetailEnvelope {
    Object {
        object: RemoteObject,
        #[serde(default)]
        fields: Vec<RemoteField>,
    },
    Schema {
        schema: RemoteObject,
        #[serde(default)]
        fields: Vec<RemoteField>,
    },
    Data {
        data: RemoteObject,
        #[serde(default)]
        fields: Vec<RemoteField>,
    },
    Bare(RemoteObject),
}

/// Unwrap a listing response into its object types.
pub fn unwrap_listing(value: Value) -> Result<Vec<RemoteObject>, CrmError> {
    let envelope: ListingEnvelope = serde_json::from_value(value)
        .map_err(|e| CrmError::Parse(format!("no recognizable object listing: {}", e)))?;

    Ok(match envelope {
        ListingEnvelope::Objects { objects } => objects,
        ListingEnvelope::Data { data } => data,
        ListingEnvelope::Schemas { schemas } => schemas,
        ListingEnvelope::Bare(list) => list,
    })
}

/// Unwrap a schema detail response into one object type with its fields.
///
/// Fields listed beside the object take precedence over fields nested in it.
pub fn unwrap_detail(value: Value) -> Result<RemoteObject, CrmError> {
    let envelope: DetailEnvelope = serde_json::from_value(value)
        .map_err(|e| CrmError::Parse(format!("no recognizable schema detail: {}", e)))?;

    let (mut object, fields) = match envelope {
        DetailEnvelope::Object { object, fields } => (object, fields),
        DetailEnvelope::Schema { schema, fields } => (schema, fields),
        DetailEnvelope::Data { data, fields } => (data, fields),
        DetailEnvelope::Bare(object) => (object, Vec::new()),
    };

    if !fields.is_empty() {
        object.fields = fields;
    }

    if !object.is_recognizable() {
        return Err(CrmError::Parse(
            "schema detail carries neither an id nor a key".to_string(),
        ));
    }

    Ok(object)
}

/// Ids arrive as strings on most deployments and as numbers on some.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
