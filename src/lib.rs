//! crmlink: CRM custom-object record integration
//!
//! Writes records into a remote CRM's custom objects whose identity, field
//! keys and accepted payload shape are not known ahead of time, and links
//! them to the contacts they belong to.
//!
//! # Core Concepts
//!
//! - **Resolution**: a logical object name ("quotes") is turned into the
//!   remote object's id and schema key through ordered strategies
//! - **Mapping**: logical field names are matched onto remote field keys and
//!   values coerced to each field's declared type
//! - **Writing**: the record is created through ordered payload variants
//! - **Association**: the record is linked afterwards; a failed link
//!   degrades the outcome but never fails the write
//!
//! # Example
//!
//! ```no_run
//! use crmlink::{CrmAdapter, CrmConfig, Credentials, HttpGateway, WriteRequest};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CrmConfig::default();
//! let gateway = HttpGateway::new(&config, Credentials::from_env()?)?;
//! let adapter = CrmAdapter::new(Arc::new(gateway), &config);
//!
//! let fields = json!({"quote_id": "QT-1", "price_low": 150});
//! let request = WriteRequest::new("quotes", fields.as_object().cloned().unwrap_or_default())
//!     .linked_to("c-1", "contact");
//! let outcome = adapter.write_and_link(&request).await;
//! # Ok(())
//! # }
//! ```

pub mod associate;
pub mod attempt;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod mapping;
pub mod resolve;
pub mod schema;
pub mod sync;
pub mod write;

pub use associate::{AssociationDefinition, AssociationManager, RelationLink};
pub use attempt::{first_success, Attempt, AttemptLog, AttemptOutcome};
pub use config::{ConfigError, CrmConfig, Credentials, KnownObject};
pub use dispatch::{EventDispatcher, EventReport, OpportunityDraft, QuoteEvent, SideEffect};
pub use error::{CrmError, CrmResult, FailureClass};
pub use gateway::{ApiRequest, CrmGateway, HttpGateway, Method, MockGateway};
pub use mapping::{coerce, map_fields, FieldMapping, MappingResult, SchemaFieldMapper};
pub use resolve::ObjectResolver;
pub use schema::{FieldDataType, FieldDescriptor, ObjectDescriptor};
pub use sync::{CrmAdapter, Degradation, DegradedFeature, LinkTarget, SyncOutcome, WriteRequest};
pub use write::{CreatedRecord, KeyShape, RecordPayload, RecordWriter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
