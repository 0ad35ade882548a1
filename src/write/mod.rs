//! Record writer: creates a remote record from mapped fields
//!
//! The records endpoint does not reliably say which property-key shape it
//! accepts, so the same properties are offered as a sequence of payload
//! variants, strictly one after another, until one is accepted:
//!
//! 1. short keys against the object id
//! 2. full-path keys against the object id
//! 3. (no id resolved) short, then full-path keys against the schema key
//!
//! The owning contact is never part of the creation payload; the endpoint
//! rejects it. Linking happens afterwards through the association manager.

mod payload;

pub use payload::{unwrap_record_id, KeyShape, RecordPayload};

use crate::attempt::{first_success, Attempt, AttemptLog};
use crate::error::CrmError;
use crate::gateway::{ApiRequest, CrmGateway};
use crate::mapping::FieldMapping;
use crate::schema::ObjectDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

/// How a payload variant addresses the object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    ObjectId,
    SchemaKey,
}

/// One candidate wire shape for a record write.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadVariant {
    pub addressing: Addressing,
    pub shape: KeyShape,
    /// Object id or schema key placed in the path
    pub target: String,
}

impl PayloadVariant {
    pub fn path(&self) -> String {
        format!("/objects/{}/records", self.target)
    }
}

/// Inputs shared by every payload variant of one write.
pub struct WriteContext {
    pub gateway: Arc<dyn CrmGateway>,
    pub mappings: Vec<FieldMapping>,
    pub schema_key: Option<String>,
}

#[async_trait]
impl Attempt<WriteContext> for PayloadVariant {
    type Output = CreatedRecord;

    fn label(&self) -> String {
        format!("POST {} ({})", self.path(), self.shape)
    }

    async fn attempt(&self, ctx: &WriteContext) -> Result<Option<CreatedRecord>, CrmError> {
        let location_id = ctx.gateway.location_id();
        let payload = RecordPayload::build(&ctx.mappings, self.shape);

        let request = ApiRequest::post(self.path())
            .with_body(payload.to_body(location_id))
            .scoped(location_id);
        let response = ctx.gateway.call(request).await?;
        let id = unwrap_record_id(&response)?;

        Ok(Some(CreatedRecord {
            id,
            target: self.target.clone(),
            schema_key: ctx.schema_key.clone(),
            shape: self.shape,
            properties: payload.properties,
            raw_response: response,
            created_at: Utc::now(),
        }))
    }
}

/// A record the CRM accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedRecord {
    pub id: String,
    /// Object id or schema key the record was written under
    pub target: String,
    /// Resolved schema key of the object type, when known
    pub schema_key: Option<String>,
    /// Key shape of the accepted payload
    pub shape: KeyShape,
    /// Properties as sent in the accepted payload
    pub properties: Map<String, Value>,
    pub raw_response: Value,
    pub created_at: DateTime<Utc>,
}

pub struct RecordWriter {
    gateway: Arc<dyn CrmGateway>,
}

impl RecordWriter {
    pub fn new(gateway: Arc<dyn CrmGateway>) -> Self {
        Self { gateway }
    }

    /// Payload variants for `descriptor`, in the order they are tried.
    pub fn variants(descriptor: &ObjectDescriptor) -> Vec<PayloadVariant> {
        let (addressing, target) = match (&descriptor.object_id, &descriptor.schema_key) {
            (Some(id), _) => (Addressing::ObjectId, id.clone()),
            (None, Some(key)) => (Addressing::SchemaKey, key.clone()),
            (None, None) => return Vec::new(),
        };

        [KeyShape::Short, KeyShape::FullPath]
            .into_iter()
            .map(|shape| PayloadVariant {
                addressing,
                shape,
                target: target.clone(),
            })
            .collect()
    }

    pub async fn create(
        &self,
        descriptor: &ObjectDescriptor,
        mappings: &[FieldMapping],
        owner_hint: Option<&str>,
    ) -> Result<CreatedRecord, CrmError> {
        self.create_with_log(descriptor, mappings, owner_hint)
            .await
            .map(|(record, _)| record)
    }

    /// Create the record and return the log of variants tried.
    ///
    /// `owner_hint` is only used for diagnostics.
    #[tracing::instrument(skip(self, descriptor, mappings), fields(object = %descriptor.logical_name))]
    pub async fn create_with_log(
        &self,
        descriptor: &ObjectDescriptor,
        mappings: &[FieldMapping],
        owner_hint: Option<&str>,
    ) -> Result<(CreatedRecord, AttemptLog), CrmError> {
        let variants: Vec<Box<dyn Attempt<WriteContext, Output = CreatedRecord>>> =
            Self::variants(descriptor)
                .into_iter()
                .map(|v| Box::new(v) as Box<dyn Attempt<WriteContext, Output = CreatedRecord>>)
                .collect();

        if variants.is_empty() {
            return Err(CrmError::UnresolvedObject(format!(
                "'{}' has neither an object id nor a schema key to write to",
                descriptor.logical_name
            )));
        }

        let ctx = WriteContext {
            gateway: self.gateway.clone(),
            mappings: mappings.to_vec(),
            schema_key: descriptor.schema_key.clone(),
        };

        match first_success(&variants, &ctx).await {
            Ok((record, log)) => {
                tracing::info!(
                    record_id = %record.id,
                    shape = %record.shape,
                    attempts = log.attempts(),
                    "record created"
                );
                Ok((record, log))
            }
            Err(log) => {
                let last = log
                    .last_error()
                    .cloned()
                    .unwrap_or_else(|| CrmError::UnresolvedObject(descriptor.logical_name.clone()));
                tracing::warn!(
                    attempts = log.attempts(),
                    variants = ?log.labels(),
                    error = %last,
                    "record creation failed for every payload variant"
                );
                Err(CrmError::RecordNotCreated {
                    attempts: log.attempts(),
                    class: last.classification(),
                    last: Box::new(last),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureClass;
    use crate::gateway::{Method, MockGateway};
    use crate::mapping::MatchPass;
    use crate::schema::FieldDataType;
    use serde_json::json;

    fn quote_mappings() -> Vec<FieldMapping> {
        vec![
            FieldMapping {
                logical_key: "quote_id".into(),
                remote_key: "custom_objects.quotes.quote_id".into(),
                data_type: FieldDataType::Text,
                matched_by: MatchPass::ShortKey,
                value: json!("QT-1"),
            },
            FieldMapping {
                logical_key: "price_low".into(),
                remote_key: "custom_objects.quotes.price_low".into(),
                data_type: FieldDataType::Number,
                matched_by: MatchPass::ShortKey,
                value: json!("150"),
            },
        ]
    }

    #[test]
    fn variant_order_prefers_id_then_short_keys() {
        let both = ObjectDescriptor::new("quotes")
            .with_object_id("obj-1")
            .with_schema_key("custom_objects.quotes");
        let variants = RecordWriter::variants(&both);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].shape, KeyShape::Short);
        assert_eq!(variants[0].path(), "/objects/obj-1/records");
        assert_eq!(variants[1].shape, KeyShape::FullPath);

        let key_only = ObjectDescriptor::new("quotes").with_schema_key("custom_objects.quotes");
        let variants = RecordWriter::variants(&key_only);
        assert!(variants.iter().all(|v| v.addressing == Addressing::SchemaKey));
        assert_eq!(variants[0].path(), "/objects/custom_objects.quotes/records");

        assert!(RecordWriter::variants(&ObjectDescriptor::new("quotes")).is_empty());
    }

    // === Scenario: Short keys rejected, full-path keys accepted ===
    #[tokio::test]
    async fn falls_back_to_full_path_payload() {
        let gateway = Arc::new(MockGateway::new("loc-1").with_handler(
            Method::Post,
            "/objects/obj-1/records",
            |req| {
                let props = &req.body.as_ref().unwrap()["properties"];
                if props.get("custom_objects.quotes.quote_id").is_some() {
                    Ok(json!({"record": {"id": "rec-9"}}))
                } else {
                    Err(CrmError::from_status(422, r#"{"message":"unknown property"}"#, None))
                }
            },
        ));
        let writer = RecordWriter::new(gateway.clone());
        let descriptor = ObjectDescriptor::new("quotes")
            .with_object_id("obj-1")
            .with_schema_key("custom_objects.quotes");

        let (record, log) = writer
            .create_with_log(&descriptor, &quote_mappings(), Some("c-1"))
            .await
            .unwrap();

        assert_eq!(record.id, "rec-9");
        assert_eq!(record.shape, KeyShape::FullPath);
        assert_eq!(record.schema_key.as_deref(), Some("custom_objects.quotes"));
        assert_eq!(record.properties["custom_objects.quotes.price_low"], json!(150));
        assert_eq!(log.attempts(), 2);
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn owner_is_never_sent_and_location_goes_in_body_and_header() {
        let gateway = Arc::new(MockGateway::new("loc-1").with_response(
            Method::Post,
            "/objects/obj-1/records",
            json!({"id": "rec-1"}),
        ));
        let writer = RecordWriter::new(gateway.clone());
        let descriptor = ObjectDescriptor::new("quotes").with_object_id("obj-1");

        writer
            .create(&descriptor, &quote_mappings(), Some("c-1"))
            .await
            .unwrap();

        let call = &gateway.calls()[0];
        let body = call.body.as_ref().unwrap();
        assert_eq!(body["locationId"], "loc-1");
        assert_eq!(call.header("Location-Id"), Some("loc-1"));
        assert!(!body.to_string().contains("c-1"));
    }

    #[tokio::test]
    async fn exhaustion_carries_classification() {
        let gateway = Arc::new(MockGateway::new("loc-1").with_failure(
            Method::Post,
            "/objects/custom_objects.quotes/records",
            CrmError::from_status(403, "missing scope objects/record.write", None),
        ));
        let writer = RecordWriter::new(gateway.clone());
        let descriptor = ObjectDescriptor::new("quotes").with_schema_key("custom_objects.quotes");

        let err = writer
            .create(&descriptor, &quote_mappings(), None)
            .await
            .unwrap_err();

        match err {
            CrmError::RecordNotCreated { attempts, class, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(class, FailureClass::Credentials);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn zero_mappings_still_creates_record() {
        let gateway = Arc::new(MockGateway::new("loc-1").with_response(
            Method::Post,
            "/objects/obj-1/records",
            json!({"record": {"id": "rec-empty"}}),
        ));
        let writer = RecordWriter::new(gateway.clone());
        let descriptor = ObjectDescriptor::new("quotes").with_object_id("obj-1");

        let record = writer.create(&descriptor, &[], None).await.unwrap();
        assert_eq!(record.id, "rec-empty");
        assert!(record.properties.is_empty());
        assert_eq!(record.schema_key, None);
    }

    #[tokio::test]
    async fn unaddressable_descriptor_is_unresolved() {
        let writer = RecordWriter::new(Arc::new(MockGateway::new("loc-1")));
        let err = writer
            .create(&ObjectDescriptor::new("quotes"), &quote_mappings(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CrmError::UnresolvedObject(_)));
    }
}
