//! Resolution strategies, one per discovery path

use super::matching::select_object;
use super::{fetch_schema, ResolveContext};
use crate::attempt::Attempt;
use crate::error::CrmError;
use crate::gateway::ApiRequest;
use crate::schema::{unwrap_listing, ObjectDescriptor};
use async_trait::async_trait;

/// Look the logical name up in the injected known-object table.
pub struct KnownIdStrategy;

#[async_trait]
impl Attempt<ResolveContext> for KnownIdStrategy {
    type Output = ObjectDescriptor;

    fn label(&self) -> String {
        "known-id table".to_string()
    }

    async fn attempt(&self, ctx: &ResolveContext) -> Result<Option<ObjectDescriptor>, CrmError> {
        let entry = ctx.known.get(&ctx.logical_name).or_else(|| {
            ctx.known
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&ctx.logical_name))
                .map(|(_, entry)| entry)
        });

        let Some(entry) = entry else {
            return Ok(None);
        };
        if entry.object_id.is_none() && entry.schema_key.is_none() {
            return Ok(None);
        }

        Ok(Some(ObjectDescriptor {
            logical_name: ctx.logical_name.clone(),
            object_id: entry.object_id.clone(),
            schema_key: entry.schema_key.clone(),
            fields: Vec::new(),
        }))
    }
}

/// List every object type, match by name, then fetch the match's schema.
///
/// A listing that errors (the endpoint is not enabled for every credential)
/// counts as an empty result, not a failure.
pub struct ListingStrategy;

#[async_trait]
impl Attempt<ResolveContext> for ListingStrategy {
    type Output = ObjectDescriptor;

    fn label(&self) -> String {
        "object listing".to_string()
    }

    async fn attempt(&self, ctx: &ResolveContext) -> Result<Option<ObjectDescriptor>, CrmError> {
        let location_id = ctx.gateway.location_id();
        let request = ApiRequest::get("/objects/")
            .with_query("locationId", location_id)
            .scoped(location_id);

        let objects = match ctx.gateway.call(request).await.and_then(unwrap_listing) {
            Ok(objects) => objects,
            Err(e) => {
                tracing::debug!(error = %e, "object listing unavailable");
                return Ok(None);
            }
        };

        let Some(matched) = select_object(&ctx.logical_name, &objects) else {
            return Ok(None);
        };
        let listed = ObjectDescriptor::from_remote(&ctx.logical_name, matched.clone());

        let Some(target) = listed.schema_target().map(str::to_string) else {
            return Ok(None);
        };

        match fetch_schema(ctx.gateway.as_ref(), &target, &ctx.logical_name).await {
            Ok(mut detailed) => {
                if detailed.object_id.is_none() {
                    detailed.object_id = listed.object_id;
                }
                if detailed.schema_key.is_none() {
                    detailed.schema_key = listed.schema_key;
                }
                Ok(Some(detailed))
            }
            Err(e) => {
                tracing::debug!(error = %e, target = %target, "detail fetch after listing failed");
                Ok(Some(listed))
            }
        }
    }
}

/// Fetch a guessed schema key directly, skipping the listing.
pub struct DirectSchemaStrategy {
    guess: String,
}

impl DirectSchemaStrategy {
    pub fn new(guess: impl Into<String>) -> Self {
        Self {
            guess: guess.into(),
        }
    }
}

#[async_trait]
impl Attempt<ResolveContext> for DirectSchemaStrategy {
    type Output = ObjectDescriptor;

    fn label(&self) -> String {
        format!("schema detail {}", self.guess)
    }

    async fn attempt(&self, ctx: &ResolveContext) -> Result<Option<ObjectDescriptor>, CrmError> {
        let descriptor = fetch_schema(ctx.gateway.as_ref(), &self.guess, &ctx.logical_name).await?;
        Ok(Some(descriptor))
    }
}
