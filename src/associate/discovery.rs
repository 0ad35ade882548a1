//! Association definition discovery
//!
//! Definitions are probed through several endpoints because deployments
//! expose them differently. Each probe unwraps whatever envelope came back
//! and keeps the first definition whose two entity keys fit the caller's
//! kind hints.

use crate::attempt::Attempt;
use crate::error::CrmError;
use crate::gateway::{ApiRequest, CrmGateway};
use crate::schema::{short_key, RemoteId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A remote rule saying two entity types may be linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationDefinition {
    pub id: String,
    pub key: Option<String>,
    pub first_entity_key: String,
    pub second_entity_key: String,
}

impl AssociationDefinition {
    /// Is `kind` the definition's first entity (as opposed to its second)?
    pub fn first_is(&self, kind: &str) -> bool {
        kind_matches(&self.first_entity_key, kind)
    }
}

/// Reduce an entity key or hint to a comparable stem:
/// `custom_objects.Quotes` → `quote`, `Contact` → `contact`.
pub fn kind_stem(kind: &str) -> String {
    let short = short_key(kind.trim()).to_lowercase();
    match short.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => short,
    }
}

/// Does a declared entity key refer to the hinted kind?
pub fn kind_matches(entity_key: &str, hint: &str) -> bool {
    let hint = kind_stem(hint);
    !hint.is_empty() && kind_stem(entity_key) == hint
}

/// Do the definition's two entity keys match the two hints, in either order?
pub fn definition_matches(definition: &AssociationDefinition, first_hint: &str, second_hint: &str) -> bool {
    let (a, b) = (&definition.first_entity_key, &definition.second_entity_key);
    (kind_matches(a, first_hint) && kind_matches(b, second_hint))
        || (kind_matches(a, second_hint) && kind_matches(b, first_hint))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "RawAssociation")]
struct RemoteAssociation {
    id: Option<String>,
    key: Option<String>,
    first: Option<String>,
    second: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssociation {
    #[serde(flatten)]
    ids: RemoteId,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    first_object_key: Option<String>,
    #[serde(default)]
    first_entity_key: Option<String>,
    #[serde(default)]
    second_object_key: Option<String>,
    #[serde(default)]
    second_entity_key: Option<String>,
}

impl From<RawAssociation> for RemoteAssociation {
    fn from(raw: RawAssociation) -> Self {
        Self {
            id: raw.ids.into_id(),
            key: raw.key,
            first: raw.first_object_key.or(raw.first_entity_key),
            second: raw.second_object_key.or(raw.second_entity_key),
        }
    }
}

impl RemoteAssociation {
    fn into_definition(self) -> Option<AssociationDefinition> {
        Some(AssociationDefinition {
            id: self.id?,
            key: self.key,
            first_entity_key: self.first.filter(|k| !k.trim().is_empty())?,
            second_entity_key: self.second.filter(|k| !k.trim().is_empty())?,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AssociationEnvelope {
    Associations { associations: Vec<RemoteAssociation> },
    DataList { data: Vec<RemoteAssociation> },
    Association { association: RemoteAssociation },
    DataOne { data: RemoteAssociation },
    BareList(Vec<RemoteAssociation>),
    Bare(RemoteAssociation),
}

/// Unwrap any association response into the complete definitions it holds.
pub fn unwrap_definitions(value: Value) -> Result<Vec<AssociationDefinition>, CrmError> {
    let envelope: AssociationEnvelope = serde_json::from_value(value)
        .map_err(|e| CrmError::Parse(format!("no recognizable association payload: {}", e)))?;

    let items = match envelope {
        AssociationEnvelope::Associations { associations } => associations,
        AssociationEnvelope::DataList { data } => data,
        AssociationEnvelope::BareList(list) => list,
        AssociationEnvelope::Association { association } => vec![association],
        AssociationEnvelope::DataOne { data } => vec![data],
        AssociationEnvelope::Bare(one) => vec![one],
    };

    Ok(items
        .into_iter()
        .filter_map(RemoteAssociation::into_definition)
        .collect())
}

/// Inputs shared by every discovery probe.
pub struct DiscoveryContext {
    pub gateway: Arc<dyn CrmGateway>,
    pub first_kind: String,
    pub second_kind: String,
}

/// One place an association definition may be found.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryProbe {
    /// `GET /associations/key/{key}`
    ByKey(String),
    /// `GET /associations/`
    Listing,
    /// `GET /associations/objectKeys?firstObjectKey=..&secondObjectKey=..`
    ByObjectKeys { first: String, second: String },
}

impl DiscoveryProbe {
    fn request(&self, location_id: &str) -> ApiRequest {
        let request = match self {
            Self::ByKey(key) => ApiRequest::get(format!("/associations/key/{}", key)),
            Self::Listing => ApiRequest::get("/associations/"),
            Self::ByObjectKeys { first, second } => ApiRequest::get("/associations/objectKeys")
                .with_query("firstObjectKey", first.as_str())
                .with_query("secondObjectKey", second.as_str()),
        };
        request.with_query("locationId", location_id).scoped(location_id)
    }
}

#[async_trait]
impl Attempt<DiscoveryContext> for DiscoveryProbe {
    type Output = AssociationDefinition;

    fn label(&self) -> String {
        match self {
            Self::ByKey(key) => format!("GET /associations/key/{}", key),
            Self::Listing => "GET /associations/".to_string(),
            Self::ByObjectKeys { first, second } => {
                format!("GET /associations/objectKeys ({}, {})", first, second)
            }
        }
    }

    async fn attempt(&self, ctx: &DiscoveryContext) -> Result<Option<AssociationDefinition>, CrmError> {
        let response = ctx.gateway.call(self.request(ctx.gateway.location_id())).await?;
        let found = unwrap_definitions(response)?
            .into_iter()
            .find(|d| definition_matches(d, &ctx.first_kind, &ctx.second_kind));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(first: &str, second: &str) -> AssociationDefinition {
        AssociationDefinition {
            id: "a1".into(),
            key: None,
            first_entity_key: first.into(),
            second_entity_key: second.into(),
        }
    }

    #[test]
    fn match_is_case_and_order_independent() {
        let def = definition("Quote", "contact");
        assert!(definition_matches(&def, "contact", "quote"));
        assert!(definition_matches(&def, "quote", "CONTACT"));
        assert!(!definition_matches(&def, "quote", "opportunity"));
    }

    #[test]
    fn match_tolerates_namespaced_and_plural_keys() {
        let def = definition("custom_objects.quotes", "contact");
        assert!(definition_matches(&def, "quote", "contact"));
        assert!(def.first_is("quotes"));
        assert!(!def.first_is("contact"));
    }

    #[test]
    fn blank_hint_never_matches() {
        assert!(!kind_matches("contact", "  "));
    }

    #[test]
    fn kind_stem_keeps_single_letter_s() {
        assert_eq!(kind_stem("s"), "s");
        assert_eq!(kind_stem("custom_objects.Quotes"), "quote");
    }

    #[test]
    fn definitions_unwrap_from_every_envelope() {
        let item = json!({"id": "a1", "firstObjectKey": "custom_objects.quotes", "secondObjectKey": "contact"});
        for body in [
            json!({"associations": [item.clone()]}),
            json!({"data": [item.clone()]}),
            json!({"association": item.clone()}),
            json!({"data": item.clone()}),
            json!([item.clone()]),
            item.clone(),
        ] {
            let defs = unwrap_definitions(body).unwrap();
            assert_eq!(defs.len(), 1);
            assert_eq!(defs[0].second_entity_key, "contact");
        }
    }

    #[test]
    fn incomplete_definitions_are_skipped() {
        let defs = unwrap_definitions(json!({"associations": [
            {"id": "a1", "firstObjectKey": "quote"},
            {"_id": 7, "firstEntityKey": "quote", "secondEntityKey": "contact"}
        ]}))
        .unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].id, "7");
    }

    #[test]
    fn object_key_probe_carries_both_keys_and_location() {
        let probe = DiscoveryProbe::ByObjectKeys {
            first: "quote".into(),
            second: "contact".into(),
        };
        let request = probe.request("loc-1");
        assert_eq!(request.path, "/associations/objectKeys");
        assert_eq!(request.query_param("firstObjectKey"), Some("quote"));
        assert_eq!(request.query_param("locationId"), Some("loc-1"));
        assert_eq!(request.header("Location-Id"), Some("loc-1"));
    }
}
