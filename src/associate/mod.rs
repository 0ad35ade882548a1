//! Association manager: links a created record to another record
//!
//! Two phases, strictly sequential:
//!
//! 1. Discover the association definition for the two entity kinds by
//!    probing the key endpoint, the general listing, and the object-key
//!    pair endpoint in both orders.
//! 2. Create the relation: with the discovered definition id when there is
//!    one, then without an id in both record orders, since some deployments
//!    infer the relation type from record order alone.
//!
//! Failure here never undoes the record write. Callers get an
//! `AssociationUnresolved` error carrying the total attempt count and are
//! expected to log it and move on.

mod discovery;

pub use discovery::{
    definition_matches, kind_matches, kind_stem, unwrap_definitions, AssociationDefinition,
    DiscoveryContext, DiscoveryProbe,
};

use crate::attempt::{first_success, Attempt, AttemptLog};
use crate::config::AssociationConfig;
use crate::error::CrmError;
use crate::gateway::{ApiRequest, CrmGateway};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// A concrete link between two records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationLink {
    pub association_id: Option<String>,
    pub first_record_id: String,
    pub second_record_id: String,
}

impl RelationLink {
    fn body(&self, location_id: &str) -> Value {
        let mut body = json!({
            "locationId": location_id,
            "firstRecordId": self.first_record_id,
            "secondRecordId": self.second_record_id,
        });
        if let Some(id) = &self.association_id {
            body["associationId"] = Value::String(id.clone());
        }
        body
    }
}

/// One relation-creation attempt.
pub struct RelationAttempt {
    pub link: RelationLink,
}

#[async_trait]
impl Attempt<Arc<dyn CrmGateway>> for RelationAttempt {
    type Output = RelationLink;

    fn label(&self) -> String {
        match &self.link.association_id {
            Some(id) => format!(
                "POST /associations/relations (association {}, {} → {})",
                id, self.link.first_record_id, self.link.second_record_id
            ),
            None => format!(
                "POST /associations/relations (no association id, {} → {})",
                self.link.first_record_id, self.link.second_record_id
            ),
        }
    }

    async fn attempt(&self, gateway: &Arc<dyn CrmGateway>) -> Result<Option<RelationLink>, CrmError> {
        let location_id = gateway.location_id();
        let request = ApiRequest::post("/associations/relations")
            .with_body(self.link.body(location_id))
            .scoped(location_id);

        match gateway.call(request).await {
            // 2xx with no body still created the relation
            Ok(_) | Err(CrmError::EmptyResponse(_)) => Ok(Some(self.link.clone())),
            Err(e) => Err(e),
        }
    }
}

pub struct AssociationManager {
    gateway: Arc<dyn CrmGateway>,
    config: AssociationConfig,
}

impl AssociationManager {
    pub fn new(gateway: Arc<dyn CrmGateway>, config: &AssociationConfig) -> Self {
        Self {
            gateway,
            config: config.clone(),
        }
    }

    /// Discovery probes for the kind pair, in the order they are tried.
    pub fn probes(&self, first_kind: &str, second_kind: &str) -> Vec<DiscoveryProbe> {
        let (a, b) = (kind_stem(first_kind), kind_stem(second_kind));

        let mut keys: Vec<String> = Vec::new();
        for key in self
            .config
            .key
            .iter()
            .cloned()
            .chain([format!("{}_{}", a, b), format!("{}_{}", b, a)])
        {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        let mut probes: Vec<DiscoveryProbe> = keys.into_iter().map(DiscoveryProbe::ByKey).collect();
        probes.push(DiscoveryProbe::Listing);
        probes.push(DiscoveryProbe::ByObjectKeys {
            first: first_kind.to_string(),
            second: second_kind.to_string(),
        });
        probes.push(DiscoveryProbe::ByObjectKeys {
            first: second_kind.to_string(),
            second: first_kind.to_string(),
        });
        probes
    }

    /// Relation attempts given what discovery found.
    pub fn relation_attempts(
        definition: Option<&AssociationDefinition>,
        first_record_id: &str,
        second_record_id: &str,
        first_kind: &str,
    ) -> Vec<RelationAttempt> {
        let forward = (first_record_id.to_string(), second_record_id.to_string());
        let backward = (second_record_id.to_string(), first_record_id.to_string());

        let mut attempts = Vec::new();
        if let Some(def) = definition {
            let (first, second) = if def.first_is(first_kind) {
                forward.clone()
            } else {
                backward.clone()
            };
            attempts.push(RelationAttempt {
                link: RelationLink {
                    association_id: Some(def.id.clone()),
                    first_record_id: first,
                    second_record_id: second,
                },
            });
        }
        for (first, second) in [forward, backward] {
            attempts.push(RelationAttempt {
                link: RelationLink {
                    association_id: None,
                    first_record_id: first,
                    second_record_id: second,
                },
            });
        }
        attempts
    }

    pub async fn associate(
        &self,
        first_record_id: &str,
        second_record_id: &str,
        first_kind: &str,
        second_kind: &str,
    ) -> Result<RelationLink, CrmError> {
        self.associate_with_log(first_record_id, second_record_id, first_kind, second_kind)
            .await
            .map(|(link, _)| link)
    }

    /// Link two records and return the log of every probe and creation tried.
    #[tracing::instrument(skip(self))]
    pub async fn associate_with_log(
        &self,
        first_record_id: &str,
        second_record_id: &str,
        first_kind: &str,
        second_kind: &str,
    ) -> Result<(RelationLink, AttemptLog), CrmError> {
        let ctx = DiscoveryContext {
            gateway: self.gateway.clone(),
            first_kind: first_kind.to_string(),
            second_kind: second_kind.to_string(),
        };
        let probes: Vec<Box<dyn Attempt<DiscoveryContext, Output = AssociationDefinition>>> = self
            .probes(first_kind, second_kind)
            .into_iter()
            .map(|p| Box::new(p) as Box<dyn Attempt<DiscoveryContext, Output = AssociationDefinition>>)
            .collect();

        let (definition, mut log) = match first_success(&probes, &ctx).await {
            Ok((def, log)) => (Some(def), log),
            Err(log) => (None, log),
        };
        match &definition {
            Some(def) => tracing::debug!(association_id = %def.id, "association definition found"),
            None => tracing::debug!(probes = log.attempts(), "no association definition found"),
        }

        let relations: Vec<Box<dyn Attempt<Arc<dyn CrmGateway>, Output = RelationLink>>> =
            Self::relation_attempts(definition.as_ref(), first_record_id, second_record_id, first_kind)
                .into_iter()
                .map(|r| Box::new(r) as Box<dyn Attempt<Arc<dyn CrmGateway>, Output = RelationLink>>)
                .collect();

        match first_success(&relations, &self.gateway).await {
            Ok((link, relation_log)) => {
                log.extend(relation_log);
                tracing::info!(
                    association_id = ?link.association_id,
                    attempts = log.attempts(),
                    "records associated"
                );
                Ok((link, log))
            }
            Err(relation_log) => {
                log.extend(relation_log);
                tracing::warn!(
                    first_record_id,
                    second_record_id,
                    first_kind,
                    second_kind,
                    attempts = log.attempts(),
                    tried = ?log.labels(),
                    last_error = %log.last_error_message(),
                    "association failed"
                );
                Err(CrmError::AssociationUnresolved {
                    attempts: log.attempts(),
                    last_error: log.last_error_message(),
                })
            }
        }
    }
}
