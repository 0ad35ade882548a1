//! Concurrent dispatch of a quote event's side effects
//!
//! Record, note and opportunity are independent: they must run at the same
//! time and settle individually.
//!
//! Run with: `cargo test --test event_dispatch`

mod common;

use common::*;
use crmlink::config::PipelineConfig;
use crmlink::{
    CrmError, EventDispatcher, Method, OpportunityDraft, QuoteEvent, SideEffect, SyncOutcome,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn pipeline_config() -> crmlink::CrmConfig {
    let mut config = known_quotes_config();
    config.pipeline = Some(PipelineConfig {
        pipeline_id: "pipe-quotes".into(),
        stage_id: None,
    });
    config
}

fn full_event() -> QuoteEvent {
    QuoteEvent::new("quotes", quote_fields())
        .for_contact("c-1")
        .with_note("Quote QT-1 submitted online")
        .with_opportunity(OpportunityDraft {
            name: "QT-1".into(),
            monetary_value: None,
        })
}

// === Scenario: Side effects overlap in time ===
#[tokio::test]
async fn side_effects_run_concurrently() {
    let mock = Arc::new(
        discovering_gateway()
            .with_response(Method::Post, "/objects/obj-quotes/records", json!({"id": "rec-1"}))
            .with_response(Method::Post, "/contacts/c-1/notes", json!({"note": {"id": "n-1"}}))
            .with_response(Method::Post, "/opportunities/", json!({"opportunity": {"id": "o-1"}})),
    );
    let slow = Arc::new(SlowGateway::new(mock.clone(), Duration::from_millis(40)));
    let dispatcher = EventDispatcher::new(slow.clone(), &pipeline_config());

    let report = dispatcher.dispatch(&full_event()).await;

    assert!(report.record_created());
    assert!(report.note.is_done());
    assert!(report.opportunity.is_done());
    assert_eq!(slow.peak_in_flight(), 3);

    let opportunity = &mock.calls_to(Method::Post, "/opportunities/")[0];
    let body = opportunity.body.as_ref().unwrap();
    assert_eq!(body["pipelineId"], "pipe-quotes");
    assert_eq!(body["status"], "open");
    assert!(body.get("pipelineStageId").is_none());
    assert!(body.get("monetaryValue").is_none());
}

// === Scenario: A failing note leaves record and opportunity untouched ===
#[tokio::test]
async fn note_failure_does_not_cancel_others() {
    let mock = Arc::new(
        discovering_gateway()
            .with_response(Method::Post, "/objects/obj-quotes/records", json!({"id": "rec-1"}))
            .with_failure(
                Method::Post,
                "/contacts/c-1/notes",
                CrmError::TransientNetwork("connection reset".into()),
            )
            .with_response(Method::Post, "/opportunities/", json!({"id": "o-1"})),
    );
    let dispatcher = EventDispatcher::new(mock.clone(), &pipeline_config());

    let report = dispatcher.dispatch(&full_event()).await;

    assert!(matches!(report.note, SideEffect::Failed(CrmError::TransientNetwork(_))));
    assert!(matches!(report.opportunity, SideEffect::Done { .. }));
    // the association has no endpoints in this mock, so the record is degraded
    match &report.record {
        SyncOutcome::Degraded { value, degradations } => {
            assert_eq!(value.id, "rec-1");
            assert_eq!(degradations.len(), 1);
        }
        other => panic!("expected a degraded record, got {:?}", other),
    }
}

#[tokio::test]
async fn every_report_gets_its_own_correlation_id() {
    let mock = Arc::new(discovering_gateway());
    let dispatcher = EventDispatcher::new(mock, &pipeline_config());

    let first = dispatcher.dispatch(&full_event()).await;
    let second = dispatcher.dispatch(&full_event()).await;

    assert!(!first.record_created());
    assert_ne!(first.correlation_id, second.correlation_id);
}
