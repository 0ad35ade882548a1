//! Adapter configuration and credentials
//!
//! Configuration is a YAML file where every field has a default. The
//! credential and tenant scope come from the environment and are treated
//! as read-only inputs by every component.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ACCESS_TOKEN_VAR: &str = "CRM_ACCESS_TOKEN";
pub const LOCATION_ID_VAR: &str = "CRM_LOCATION_ID";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} must be provided")]
    MissingVar(&'static str),
}

/// A pre-known identity for a logical object name.
///
/// Either field may be absent; an entry with only a schema key still
/// skips discovery but may need the id backfilled.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct KnownObject {
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub schema_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Association key name to probe first, e.g. `quote_contact`
    pub key: Option<String>,
    /// Entity kind of the records this adapter creates
    pub record_kind: String,
    /// Entity kind of the records they link to
    pub contact_kind: String,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            key: None,
            record_kind: "quote".to_string(),
            contact_kind: "contact".to_string(),
        }
    }
}

/// Sales pipeline that quote opportunities are opened in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    pub pipeline_id: String,
    #[serde(default)]
    pub stage_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    pub base_url: String,
    /// Value of the `Version` header sent on every call
    pub api_version: String,
    pub timeout_secs: u64,
    /// Namespace used to guess schema keys, e.g. `custom_objects.quotes`
    pub schema_namespace: String,
    /// Logical name → pre-known identity, consulted before any discovery
    pub known_objects: HashMap<String, KnownObject>,
    /// Logical names whose writes must address the object by id
    pub require_object_id: HashSet<String>,
    pub association: AssociationConfig,
    pub pipeline: Option<PipelineConfig>,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://services.leadconnectorhq.com".to_string(),
            api_version: "2021-07-28".to_string(),
            timeout_secs: 30,
            schema_namespace: "custom_objects".to_string(),
            known_objects: HashMap::new(),
            require_object_id: HashSet::new(),
            association: AssociationConfig::default(),
            pipeline: None,
        }
    }
}

impl CrmConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Default config location (~/.config/crmlink/config.yaml)
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"));
        config_dir.join("crmlink").join("config.yaml")
    }
}

/// Bearer credential and tenant scope supplied by the calling layer.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub access_token: String,
    pub location_id: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            location_id: location_id.into(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token = read_var(ACCESS_TOKEN_VAR)?;
        let location_id = read_var(LOCATION_ID_VAR)?;
        Ok(Self {
            access_token,
            location_id,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("location_id", &self.location_id)
            .finish()
    }
}

fn read_var(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}
