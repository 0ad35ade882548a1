//! Object identity resolution
//!
//! Finds the stable identity of a logical object type ("quotes") through an
//! ordered list of strategies, stopping at the first hit:
//!
//! 1. the injected known-object table (no network)
//! 2. the object listing endpoint plus a name match, then a detail fetch
//! 3. direct detail fetches of guessed schema keys
//!
//! When the object must be written by id and only a schema key came back,
//! one more detail fetch backfills the id.

mod matching;
mod strategies;

pub use matching::{object_name_matches, select_object, NameMatch};
pub use strategies::{DirectSchemaStrategy, KnownIdStrategy, ListingStrategy};

use crate::attempt::{first_success, Attempt, AttemptLog};
use crate::config::{CrmConfig, KnownObject};
use crate::error::CrmError;
use crate::gateway::{ApiRequest, CrmGateway};
use crate::schema::{unwrap_detail, ObjectDescriptor};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Everything a resolution strategy may consult.
pub struct ResolveContext {
    pub logical_name: String,
    pub gateway: Arc<dyn CrmGateway>,
    pub known: Arc<HashMap<String, KnownObject>>,
}

pub type ResolutionStrategy = Box<dyn Attempt<ResolveContext, Output = ObjectDescriptor>>;

/// Resolves logical object names to remote descriptors.
///
/// Holds no cache: every call re-discovers, so schema changes on the
/// remote side are picked up immediately.
pub struct ObjectResolver {
    gateway: Arc<dyn CrmGateway>,
    known: Arc<HashMap<String, KnownObject>>,
    namespace: String,
    requires_id: HashSet<String>,
}

impl ObjectResolver {
    pub fn new(gateway: Arc<dyn CrmGateway>, config: &CrmConfig) -> Self {
        Self {
            gateway,
            known: Arc::new(config.known_objects.clone()),
            namespace: config.schema_namespace.clone(),
            requires_id: config.require_object_id.clone(),
        }
    }

    /// Replace the known-object table, e.g. per tenant.
    pub fn with_known_objects(mut self, known: HashMap<String, KnownObject>) -> Self {
        self.known = Arc::new(known);
        self
    }

    /// Mark a logical object as requiring id-addressed writes.
    pub fn require_object_id(mut self, logical_name: impl Into<String>) -> Self {
        self.requires_id.insert(logical_name.into());
        self
    }

    /// The strategies tried for `logical_name`, in priority order.
    pub fn strategies(&self, logical_name: &str) -> Vec<ResolutionStrategy> {
        let mut list: Vec<ResolutionStrategy> =
            vec![Box::new(KnownIdStrategy), Box::new(ListingStrategy)];
        for guess in schema_key_guesses(&self.namespace, logical_name) {
            list.push(Box::new(DirectSchemaStrategy::new(guess)));
        }
        list
    }

    pub async fn resolve(&self, logical_name: &str) -> Result<ObjectDescriptor, CrmError> {
        self.resolve_with_log(logical_name).await.map(|(d, _)| d)
    }

    /// Resolve and also return the log of strategies tried.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_with_log(
        &self,
        logical_name: &str,
    ) -> Result<(ObjectDescriptor, AttemptLog), CrmError> {
        let ctx = ResolveContext {
            logical_name: logical_name.to_string(),
            gateway: self.gateway.clone(),
            known: self.known.clone(),
        };

        let strategies = self.strategies(logical_name);
        let (descriptor, log) = first_success(&strategies, &ctx).await.map_err(|log| {
            CrmError::UnresolvedObject(format!(
                "'{}' not found after {} strategies: {}",
                logical_name,
                log.attempts(),
                log.last_error_message()
            ))
        })?;

        let descriptor = if self.requires_id.contains(logical_name) {
            self.backfill_object_id(descriptor).await?
        } else {
            descriptor
        };

        tracing::debug!(
            object_id = ?descriptor.object_id,
            schema_key = ?descriptor.schema_key,
            fields = descriptor.fields.len(),
            "object resolved"
        );
        Ok((descriptor, log))
    }

    /// Fetch the schema by key to pick up the id embedded in the response.
    async fn backfill_object_id(
        &self,
        mut descriptor: ObjectDescriptor,
    ) -> Result<ObjectDescriptor, CrmError> {
        if descriptor.object_id.is_some() {
            return Ok(descriptor);
        }
        let Some(key) = descriptor.schema_key.clone() else {
            return Err(CrmError::UnresolvedObject(format!(
                "'{}' resolved without id or schema key",
                descriptor.logical_name
            )));
        };

        let fetched = fetch_schema(self.gateway.as_ref(), &key, &descriptor.logical_name)
            .await
            .map_err(|e| {
                CrmError::UnresolvedObject(format!(
                    "'{}' requires an object id; lookup by '{}' failed: {}",
                    descriptor.logical_name, key, e
                ))
            })?;

        let Some(id) = fetched.object_id else {
            return Err(CrmError::UnresolvedObject(format!(
                "'{}' requires an object id but '{}' carries none",
                descriptor.logical_name, key
            )));
        };

        descriptor.object_id = Some(id);
        if descriptor.fields.is_empty() {
            descriptor.fields = fetched.fields;
        }
        Ok(descriptor)
    }
}

/// Fetch one object's schema detail by schema key or id.
pub(crate) async fn fetch_schema(
    gateway: &dyn CrmGateway,
    target: &str,
    logical_name: &str,
) -> Result<ObjectDescriptor, CrmError> {
    let request = ApiRequest::get(format!("/objects/{}", target))
        .with_query("locationId", gateway.location_id())
        .scoped(gateway.location_id());
    let body = gateway.call(request).await?;
    let remote = unwrap_detail(body)?;

    let mut descriptor = ObjectDescriptor::from_remote(logical_name, remote);
    if descriptor.schema_key.is_none() && target.contains('.') {
        descriptor.schema_key = Some(target.to_string());
    }
    Ok(descriptor)
}

/// Candidate schema keys for a logical name, most likely first.
pub fn schema_key_guesses(namespace: &str, logical_name: &str) -> Vec<String> {
    let name = logical_name.trim().to_lowercase();
    if name.is_empty() {
        return Vec::new();
    }
    if name.contains('.') {
        return vec![name];
    }

    let mut guesses = vec![format!("{}.{}", namespace, name)];
    let alternate = match name.strip_suffix('s') {
        Some(singular) if !singular.is_empty() => singular.to_string(),
        _ => format!("{}s", name),
    };
    guesses.push(format!("{}.{}", namespace, alternate));
    guesses
}
