//! Remote custom-object schema model
//!
//! `ObjectDescriptor` and `FieldDescriptor` are the adapter's view of a
//! remotely defined object type. They are built on demand from discovery
//! responses and never persisted.

mod envelope;

pub(crate) use envelope::RemoteId;

pub use envelope::{unwrap_detail, unwrap_listing, Labels, RemoteField, RemoteObject};

use serde::Serialize;

/// Declared type of a remote field, as far as value shaping cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FieldDataType {
    Text,
    Number,
    SingleOption,
    MultiOption,
    /// A remote type the adapter does not special-case; shaped like text
    Other(String),
}

impl FieldDataType {
    /// Map a remote `dataType` string onto the adapter's types.
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TEXT" | "LARGE_TEXT" | "TEXTAREA" | "EMAIL" | "PHONE" => Self::Text,
            "NUMBER" | "NUMERICAL" | "MONETORY" | "MONETARY" | "FLOAT" | "INTEGER" => {
                Self::Number
            }
            "SINGLE_OPTION" | "SINGLE_OPTIONS" | "RADIO" | "DROPDOWN" => Self::SingleOption,
            "MULTI_OPTION" | "MULTIPLE_OPTIONS" | "CHECKBOX" => Self::MultiOption,
            "" => Self::Text,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One field of a remote object schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    /// Full path form, e.g. `custom_objects.quotes.price_low`
    pub remote_key: String,
    /// Human label configured in the CRM admin
    pub display_name: String,
    pub data_type: FieldDataType,
}

impl FieldDescriptor {
    pub fn new(
        remote_key: impl Into<String>,
        display_name: impl Into<String>,
        data_type: FieldDataType,
    ) -> Self {
        Self {
            remote_key: remote_key.into(),
            display_name: display_name.into(),
            data_type,
        }
    }

    /// Last path segment of the remote key, e.g. `price_low`.
    pub fn short_key(&self) -> &str {
        short_key(&self.remote_key)
    }
}

/// Last `.`-separated segment of a dotted key.
pub fn short_key(key: &str) -> &str {
    key.rsplit('.').next().unwrap_or(key)
}

/// A remote custom-object type, resolved for one adapter call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDescriptor {
    pub logical_name: String,
    /// Stable remote id, preferred for write addressing
    pub object_id: Option<String>,
    /// Alternate identifier, e.g. `custom_objects.quotes`
    pub schema_key: Option<String>,
    pub fields: Vec<FieldDescriptor>,
}

impl ObjectDescriptor {
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            object_id: None,
            schema_key: None,
            fields: Vec::new(),
        }
    }

    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    pub fn with_schema_key(mut self, key: impl Into<String>) -> Self {
        self.schema_key = Some(key.into());
        self
    }

    pub fn with_fields(mut self, fields: Vec<FieldDescriptor>) -> Self {
        self.fields = fields;
        self
    }

    /// True when the descriptor can address anything remotely.
    pub fn is_addressable(&self) -> bool {
        self.object_id.is_some() || self.schema_key.is_some()
    }

    /// Identifier used for schema fetches: the schema key if known, else the id.
    pub fn schema_target(&self) -> Option<&str> {
        self.schema_key.as_deref().or(self.object_id.as_deref())
    }

    /// Build a descriptor from a discovered remote object.
    pub(crate) fn from_remote(logical_name: &str, remote: RemoteObject) -> Self {
        let fields = remote
            .fields
            .into_iter()
            .filter_map(RemoteField::into_descriptor)
            .collect();
        Self {
            logical_name: logical_name.to_string(),
            object_id: remote.id,
            schema_key: remote.key,
            fields,
        }
    }
}
