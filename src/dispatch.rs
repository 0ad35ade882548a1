//! Business-event dispatch
//!
//! A submitted quote fans out into independent CRM side effects: the quote
//! record (with its contact link), a note on the contact, and a pipeline
//! opportunity. They run concurrently and each settles on its own; one
//! failing never cancels or blocks the others.

use crate::config::{CrmConfig, PipelineConfig};
use crate::error::CrmError;
use crate::gateway::{ApiRequest, CrmGateway};
use crate::schema::RemoteId;
use crate::sync::{CrmAdapter, SyncOutcome, WriteRequest};
use crate::write::CreatedRecord;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Pipeline entry requested alongside a quote.
#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityDraft {
    pub name: String,
    pub monetary_value: Option<f64>,
}

/// A submitted quote and everything that should happen in the CRM for it.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteEvent {
    /// Logical object the quote is written to
    pub logical_object: String,
    pub contact_id: Option<String>,
    pub fields: Map<String, Value>,
    pub note: Option<String>,
    pub opportunity: Option<OpportunityDraft>,
}

impl QuoteEvent {
    pub fn new(logical_object: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            logical_object: logical_object.into(),
            contact_id: None,
            fields,
            note: None,
            opportunity: None,
        }
    }

    pub fn for_contact(mut self, contact_id: impl Into<String>) -> Self {
        self.contact_id = Some(contact_id.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_opportunity(mut self, draft: OpportunityDraft) -> Self {
        self.opportunity = Some(draft);
        self
    }
}

/// Outcome of one secondary side effect.
#[derive(Debug, Clone)]
pub enum SideEffect {
    /// Not attempted; the reason says which input was missing
    Skipped(&'static str),
    Done { id: Option<String> },
    Failed(CrmError),
}

impl SideEffect {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    fn from_response(result: Result<Value, CrmError>, wrapper: &str) -> Self {
        match result {
            Ok(body) => Self::Done {
                id: created_id(&body, wrapper),
            },
            Err(CrmError::EmptyResponse(_)) => Self::Done { id: None },
            Err(e) => Self::Failed(e),
        }
    }
}

impl std::fmt::Display for SideEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped(reason) => write!(f, "skipped ({})", reason),
            Self::Done { id: Some(id) } => write!(f, "created {}", id),
            Self::Done { id: None } => write!(f, "created"),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Per-operation results of one dispatched event.
#[derive(Debug, Clone)]
pub struct EventReport {
    pub correlation_id: Uuid,
    pub record: SyncOutcome<CreatedRecord>,
    pub note: SideEffect,
    pub opportunity: SideEffect,
}

impl EventReport {
    pub fn record_created(&self) -> bool {
        self.record.is_success()
    }
}

fn created_id(body: &Value, wrapper: &str) -> Option<String> {
    let entity = body.get(wrapper).unwrap_or(body);
    serde_json::from_value::<RemoteId>(entity.clone())
        .ok()
        .and_then(RemoteId::into_id)
}

/// Runs every side effect of a `QuoteEvent` concurrently.
pub struct EventDispatcher {
    adapter: CrmAdapter,
    gateway: Arc<dyn CrmGateway>,
    pipeline: Option<PipelineConfig>,
    contact_kind: String,
}

impl EventDispatcher {
    pub fn new(gateway: Arc<dyn CrmGateway>, config: &CrmConfig) -> Self {
        Self {
            adapter: CrmAdapter::new(gateway.clone(), config),
            gateway,
            pipeline: config.pipeline.clone(),
            contact_kind: config.association.contact_kind.clone(),
        }
    }

    pub fn with_adapter(mut self, adapter: CrmAdapter) -> Self {
        self.adapter = adapter;
        self
    }

    #[tracing::instrument(
        skip(self, event),
        fields(object = %event.logical_object, correlation_id = tracing::field::Empty)
    )]
    pub async fn dispatch(&self, event: &QuoteEvent) -> EventReport {
        let correlation_id = Uuid::new_v4();
        tracing::Span::current().record("correlation_id", tracing::field::display(correlation_id));

        let mut request = WriteRequest::new(event.logical_object.clone(), event.fields.clone());
        if let Some(contact_id) = &event.contact_id {
            request = request.linked_to(contact_id.clone(), self.contact_kind.clone());
        }

        let (record, note, opportunity) = tokio::join!(
            self.adapter.write_and_link(&request),
            self.create_note(event),
            self.create_opportunity(event),
        );

        if let SideEffect::Failed(e) = &note {
            tracing::warn!(error = %e, "contact note not created");
        }
        if let SideEffect::Failed(e) = &opportunity {
            tracing::warn!(error = %e, "opportunity not created");
        }

        EventReport {
            correlation_id,
            record,
            note,
            opportunity,
        }
    }

    async fn create_note(&self, event: &QuoteEvent) -> SideEffect {
        let Some(contact_id) = &event.contact_id else {
            return SideEffect::Skipped("no contact");
        };
        let Some(text) = event.note.as_deref().filter(|t| !t.trim().is_empty()) else {
            return SideEffect::Skipped("no note text");
        };

        let location_id = self.gateway.location_id();
        let request = ApiRequest::post(format!("/contacts/{}/notes", contact_id))
            .with_body(json!({ "body": text }))
            .scoped(location_id);
        SideEffect::from_response(self.gateway.call(request).await, "note")
    }

    async fn create_opportunity(&self, event: &QuoteEvent) -> SideEffect {
        let Some(draft) = &event.opportunity else {
            return SideEffect::Skipped("no opportunity requested");
        };
        let Some(pipeline) = &self.pipeline else {
            return SideEffect::Skipped("no pipeline configured");
        };
        let Some(contact_id) = &event.contact_id else {
            return SideEffect::Skipped("no contact");
        };

        let location_id = self.gateway.location_id();
        let mut body = json!({
            "pipelineId": pipeline.pipeline_id,
            "locationId": location_id,
            "contactId": contact_id,
            "name": draft.name,
            "status": "open",
        });
        if let Some(stage) = &pipeline.stage_id {
            body["pipelineStageId"] = json!(stage);
        }
        if let Some(value) = draft.monetary_value {
            body["monetaryValue"] = json!(value);
        }

        let request = ApiRequest::post("/opportunities/")
            .with_body(body)
            .scoped(location_id);
        SideEffect::from_response(self.gateway.call(request).await, "opportunity")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KnownObject;
    use crate::gateway::{Method, MockGateway};

    fn config_with_pipeline() -> CrmConfig {
        let mut config = CrmConfig::default();
        config.known_objects.insert(
            "quotes".into(),
            KnownObject {
                object_id: Some("obj-1".into()),
                schema_key: None,
            },
        );
        config.pipeline = Some(PipelineConfig {
            pipeline_id: "pipe-1".into(),
            stage_id: Some("stage-new".into()),
        });
        config
    }

    fn event() -> QuoteEvent {
        QuoteEvent::new("quotes", Map::new())
            .for_contact("c-1")
            .with_note("Quote QT-1 submitted")
            .with_opportunity(OpportunityDraft {
                name: "Quote QT-1".into(),
                monetary_value: Some(150.0),
            })
    }

    // === Scenario: One side effect fails, the others still settle ===
    #[tokio::test]
    async fn failed_record_does_not_block_note_or_opportunity() {
        let gateway = Arc::new(
            MockGateway::new("loc-1")
                .with_response(Method::Post, "/contacts/c-1/notes", json!({"note": {"id": "n-1"}}))
                .with_response(
                    Method::Post,
                    "/opportunities/",
                    json!({"opportunity": {"id": "opp-1"}}),
                ),
        );
        let dispatcher = EventDispatcher::new(gateway.clone(), &config_with_pipeline());

        let report = dispatcher.dispatch(&event()).await;

        assert!(!report.record_created());
        assert!(matches!(report.note, SideEffect::Done { id: Some(ref id) } if id == "n-1"));
        assert!(matches!(report.opportunity, SideEffect::Done { id: Some(ref id) } if id == "opp-1"));

        let body = gateway.calls_to(Method::Post, "/opportunities/")[0].body.clone().unwrap();
        assert_eq!(body["pipelineStageId"], "stage-new");
        assert_eq!(body["contactId"], "c-1");
        assert_eq!(body["monetaryValue"], json!(150.0));
    }

    #[tokio::test]
    async fn opportunity_is_skipped_without_pipeline() {
        let gateway = Arc::new(
            MockGateway::new("loc-1")
                .with_response(Method::Post, "/objects/obj-1/records", json!({"id": "rec-1"}))
                .with_response(Method::Post, "/contacts/c-1/notes", json!({"id": "n-1"})),
        );
        let dispatcher = EventDispatcher::new(gateway.clone(), &CrmConfig::default()).with_adapter(
            CrmAdapter::new(gateway.clone(), &config_with_pipeline()),
        );

        let report = dispatcher.dispatch(&event()).await;

        assert!(matches!(report.opportunity, SideEffect::Skipped("no pipeline configured")));
        assert_eq!(report.opportunity.to_string(), "skipped (no pipeline configured)");
        assert!(report.note.is_done());
        assert!(gateway.calls_to(Method::Post, "/opportunities/").is_empty());
    }

    #[tokio::test]
    async fn failed_note_is_reported_not_skipped() {
        let gateway = Arc::new(
            MockGateway::new("loc-1")
                .with_response(Method::Post, "/objects/obj-1/records", json!({"id": "rec-1"}))
                .with_response(Method::Post, "/opportunities/", json!({"id": "opp-1"})),
        );
        let dispatcher = EventDispatcher::new(gateway.clone(), &config_with_pipeline());

        let report = dispatcher.dispatch(&event()).await;

        assert!(matches!(report.note, SideEffect::Failed(_)));
        assert!(report.opportunity.is_done());
        assert!(report.record_created());
    }

    #[tokio::test]
    async fn event_without_contact_writes_unlinked_record() {
        let gateway = Arc::new(MockGateway::new("loc-1").with_response(
            Method::Post,
            "/objects/obj-1/records",
            json!({"id": "rec-1"}),
        ));
        let dispatcher = EventDispatcher::new(gateway.clone(), &config_with_pipeline());
        let event = QuoteEvent::new("quotes", Map::new()).with_note("orphan");

        let report = dispatcher.dispatch(&event).await;

        assert!(matches!(report.record, SyncOutcome::Complete(_)));
        assert!(matches!(report.note, SideEffect::Skipped("no contact")));
        assert!(gateway
            .calls()
            .iter()
            .all(|c| !c.path.starts_with("/associations")));
    }

    #[test]
    fn created_id_reads_wrapped_and_bare_bodies() {
        assert_eq!(created_id(&json!({"note": {"id": "n-1"}}), "note").as_deref(), Some("n-1"));
        assert_eq!(created_id(&json!({"id": 12}), "note").as_deref(), Some("12"));
        assert_eq!(created_id(&json!({"ok": true}), "note"), None);
    }
}
