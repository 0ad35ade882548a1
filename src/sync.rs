//! CRM adapter: resolve, map, write, then link
//!
//! Record creation and association are separately committed. A record that
//! was created is always returned; a failed link only degrades the outcome.

use crate::associate::AssociationManager;
use crate::config::CrmConfig;
use crate::error::CrmError;
use crate::gateway::CrmGateway;
use crate::mapping::SchemaFieldMapper;
use crate::resolve::ObjectResolver;
use crate::write::{CreatedRecord, RecordWriter};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// The record a new record should be linked to.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkTarget {
    pub record_id: String,
    /// Entity kind of `record_id`, e.g. `contact`
    pub kind: String,
}

/// One record write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub logical_object: String,
    /// Logical field name → raw value
    pub fields: Map<String, Value>,
    pub link: Option<LinkTarget>,
}

impl WriteRequest {
    pub fn new(logical_object: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            logical_object: logical_object.into(),
            fields,
            link: None,
        }
    }

    pub fn linked_to(mut self, record_id: impl Into<String>, kind: impl Into<String>) -> Self {
        self.link = Some(LinkTarget {
            record_id: record_id.into(),
            kind: kind.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedFeature {
    /// Some logical fields had no remote counterpart
    FieldMapping,
    /// The record was created but could not be linked
    Association,
}

/// A secondary feature that did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    pub feature: DegradedFeature,
    pub attempts: usize,
    pub message: String,
}

/// Result of an adapter call.
#[derive(Debug, Clone)]
pub enum SyncOutcome<T> {
    Complete(T),
    /// The primary artifact exists but something secondary is missing
    Degraded {
        value: T,
        degradations: Vec<Degradation>,
    },
    Failed(CrmError),
}

impl<T> SyncOutcome<T> {
    fn from_parts(value: T, degradations: Vec<Degradation>) -> Self {
        if degradations.is_empty() {
            Self::Complete(value)
        } else {
            Self::Degraded { value, degradations }
        }
    }

    /// True unless the primary operation failed.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => Some(value),
            Self::Failed(_) => None,
        }
    }

    pub fn degradations(&self) -> &[Degradation] {
        match self {
            Self::Degraded { degradations, .. } => degradations,
            _ => &[],
        }
    }

    pub fn degradation(&self, feature: DegradedFeature) -> Option<&Degradation> {
        self.degradations().iter().find(|d| d.feature == feature)
    }

    pub fn error(&self) -> Option<&CrmError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Drop the degradations and keep only success or failure.
    pub fn into_result(self) -> Result<T, CrmError> {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => Ok(value),
            Self::Failed(e) => Err(e),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SyncOutcome<U> {
        match self {
            Self::Complete(value) => SyncOutcome::Complete(f(value)),
            Self::Degraded { value, degradations } => SyncOutcome::Degraded {
                value: f(value),
                degradations,
            },
            Self::Failed(e) => SyncOutcome::Failed(e),
        }
    }
}

/// Ties the resolver, mapper, writer and association manager together.
pub struct CrmAdapter {
    resolver: ObjectResolver,
    mapper: SchemaFieldMapper,
    writer: RecordWriter,
    associations: AssociationManager,
    record_kind: String,
}

impl CrmAdapter {
    pub fn new(gateway: Arc<dyn CrmGateway>, config: &CrmConfig) -> Self {
        Self {
            resolver: ObjectResolver::new(gateway.clone(), config),
            mapper: SchemaFieldMapper::new(gateway.clone()),
            writer: RecordWriter::new(gateway.clone()),
            associations: AssociationManager::new(gateway, &config.association),
            record_kind: config.association.record_kind.clone(),
        }
    }

    /// Swap in a differently configured resolver (e.g. a per-tenant table).
    pub fn with_resolver(mut self, resolver: ObjectResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn resolver(&self) -> &ObjectResolver {
        &self.resolver
    }

    pub fn mapper(&self) -> &SchemaFieldMapper {
        &self.mapper
    }

    /// Resolve, map and create, returning the record and any mapping shortfall.
    ///
    /// A field schema that cannot be loaded fails the write before anything
    /// is posted.
    async fn create(&self, request: &WriteRequest) -> Result<(CreatedRecord, Option<Degradation>), CrmError> {
        let mut descriptor = self.resolver.resolve(&request.logical_object).await?;
        let mapping = self.mapper.map(&mut descriptor, &request.fields).await?;

        if mapping.is_empty() && !request.fields.is_empty() {
            tracing::warn!(
                object = %request.logical_object,
                dropped = mapping.dropped_count(),
                "no fields mapped; creating an empty record"
            );
        }

        let owner = request.link.as_ref().map(|l| l.record_id.as_str());
        let record = self.writer.create(&descriptor, &mapping.mappings, owner).await?;

        let shortfall = (mapping.dropped_count() > 0).then(|| Degradation {
            feature: DegradedFeature::FieldMapping,
            attempts: request.fields.len(),
            message: format!(
                "{} field(s) without a remote counterpart: {}",
                mapping.dropped_count(),
                mapping.dropped.join(", ")
            ),
        });
        Ok((record, shortfall))
    }

    /// Create the record only; any link in the request is ignored.
    pub async fn write(&self, request: &WriteRequest) -> Result<CreatedRecord, CrmError> {
        self.create(request).await.map(|(record, _)| record)
    }

    /// Create the record, then link it if the request asks for a link.
    ///
    /// Association starts only after creation returned an id, and its
    /// failure is reported as a degradation, never as a failed write.
    #[tracing::instrument(skip(self, request), fields(object = %request.logical_object))]
    pub async fn write_and_link(&self, request: &WriteRequest) -> SyncOutcome<CreatedRecord> {
        let (record, shortfall) = match self.create(request).await {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!(error = %e, class = %e.classification(), "record write failed");
                return SyncOutcome::Failed(e);
            }
        };

        let mut degradations: Vec<Degradation> = shortfall.into_iter().collect();

        if let Some(link) = &request.link {
            // object-key probes want the namespaced key, not the configured kind
            let record_kind = record.schema_key.as_deref().unwrap_or(&self.record_kind);
            let result = self
                .associations
                .associate(&record.id, &link.record_id, record_kind, &link.kind)
                .await;
            if let Err(e) = result {
                let attempts = match &e {
                    CrmError::AssociationUnresolved { attempts, .. } => *attempts,
                    _ => 0,
                };
                tracing::warn!(
                    record_id = %record.id,
                    linked_id = %link.record_id,
                    error = %e,
                    "record created without its link"
                );
                degradations.push(Degradation {
                    feature: DegradedFeature::Association,
                    attempts,
                    message: e.to_string(),
                });
            }
        }

        SyncOutcome::from_parts(record, degradations)
    }
}
