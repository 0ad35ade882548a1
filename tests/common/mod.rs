//! Common test utilities for adapter integration tests
//!
//! Canned CRM responses for the quotes object and a gateway wrapper that
//! adds latency and tracks how many calls are in flight at once.

#![allow(dead_code)]

use async_trait::async_trait;
use crmlink::{ApiRequest, CrmConfig, CrmError, CrmGateway, KnownObject, MockGateway};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const LOCATION: &str = "loc-test";
pub const SCHEMA_KEY: &str = "custom_objects.quotes";
pub const OBJECT_ID: &str = "obj-quotes";

/// Object listing with the quotes object and a similarly named decoy.
pub fn object_listing() -> Value {
    json!({"objects": [
        {"id": "obj-archive", "key": "custom_objects.quotes_archive",
         "labels": {"singular": "Archived Quote", "plural": "Archived Quotes"}},
        {"id": OBJECT_ID, "key": SCHEMA_KEY,
         "labels": {"singular": "Quote", "plural": "Quotes"}}
    ]})
}

/// Schema detail for quotes: quote_id TEXT, price_low NUMBER, shedding_pets MULTI_OPTION.
pub fn quotes_schema() -> Value {
    json!({
        "object": {"id": OBJECT_ID, "key": SCHEMA_KEY},
        "fields": [
            {"fieldKey": "custom_objects.quotes.quote_id", "name": "Quote ID", "dataType": "TEXT"},
            {"fieldKey": "custom_objects.quotes.price_low", "name": "Price Low", "dataType": "NUMERICAL"},
            {"fieldKey": "custom_objects.quotes.shedding_pets", "name": "Shedding Pets", "dataType": "MULTIPLE_OPTIONS"}
        ]
    })
}

/// Association definition linking quotes to contacts.
pub fn quote_contact_definition(id: &str) -> Value {
    json!({"associations": [{
        "id": id,
        "key": "quote_contact",
        "firstObjectKey": SCHEMA_KEY,
        "secondObjectKey": "contact"
    }]})
}

pub fn quote_fields() -> Map<String, Value> {
    let fields = json!({"quote_id": "QT-1", "price_low": 150, "shedding_pets": "2, 1"});
    fields.as_object().cloned().unwrap()
}

/// Mock with the listing and schema endpoints answered.
pub fn discovering_gateway() -> MockGateway {
    MockGateway::new(LOCATION)
        .with_response(crmlink::Method::Get, "/objects/", object_listing())
        .with_response(crmlink::Method::Get, &format!("/objects/{}", SCHEMA_KEY), quotes_schema())
        .with_response(crmlink::Method::Get, &format!("/objects/{}", OBJECT_ID), quotes_schema())
}

/// Config that knows the quotes object up front.
pub fn known_quotes_config() -> CrmConfig {
    let mut config = CrmConfig::default();
    config.known_objects.insert(
        "quotes".into(),
        KnownObject {
            object_id: Some(OBJECT_ID.into()),
            schema_key: Some(SCHEMA_KEY.into()),
        },
    );
    config
}

/// Wraps a gateway, delaying every call and recording peak concurrency.
pub struct SlowGateway {
    inner: Arc<MockGateway>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowGateway {
    pub fn new(inner: Arc<MockGateway>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CrmGateway for SlowGateway {
    fn location_id(&self) -> &str {
        self.inner.location_id()
    }

    async fn call(&self, request: ApiRequest) -> Result<Value, CrmError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = self.inner.call(request).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
