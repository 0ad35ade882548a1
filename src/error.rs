//! Error taxonomy for CRM integration calls
//!
//! Every remote failure is classified into one of a small set of kinds so
//! callers can tell a configuration problem (missing remote object type)
//! from a credential problem or a transient one.

use serde_json::Value;
use thiserror::Error;

/// Maximum number of characters of a response body kept in an error.
const BODY_EXCERPT_LIMIT: usize = 512;

/// Coarse classification of a failure, used to decide how to react to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The remote object type or endpoint does not exist for this tenant
    Configuration,
    /// Token missing, expired or lacking a scope
    Credentials,
    /// The remote rejected the shape or content of what we sent
    Payload,
    /// Connection-level or server-side failure, worth retrying later
    Transient,
    Unknown,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Credentials => write!(f, "credentials"),
            Self::Payload => write!(f, "payload"),
            Self::Transient => write!(f, "transient"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Errors from CRM adapter operations.
#[derive(Debug, Clone, Error)]
pub enum CrmError {
    #[error("authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("not authorized ({status}): {message}")]
    Authorization { status: u16, message: String },

    #[error("unresolved object: {0}")]
    UnresolvedObject(String),

    #[error("payload rejected ({status}): {message}")]
    Validation {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    #[error("empty response from {0}")]
    EmptyResponse(String),

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("network error: {0}")]
    TransientNetwork(String),

    #[error("association unresolved after {attempts} attempts: {last_error}")]
    AssociationUnresolved { attempts: usize, last_error: String },

    #[error("remote error ({status}): {message}")]
    Remote {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    #[error("record not created after {attempts} attempts ({class}): {last}")]
    RecordNotCreated {
        attempts: usize,
        class: FailureClass,
        last: Box<CrmError>,
    },
}

impl CrmError {
    /// Build an error from a non-2xx response.
    ///
    /// `body` is the raw response text; `parsed` is its JSON form when it
    /// decoded. The message prefers the remote's own `message` field.
    pub fn from_status(status: u16, body: &str, parsed: Option<Value>) -> Self {
        let message = parsed
            .as_ref()
            .and_then(remote_message)
            .unwrap_or_else(|| excerpt(body));

        match status {
            401 => Self::Authentication { status, message },
            403 => Self::Authorization { status, message },
            400 | 422 => Self::Validation {
                status,
                message,
                details: parsed,
            },
            _ => Self::Remote {
                status,
                message,
                details: parsed,
            },
        }
    }

    /// HTTP status carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. }
            | Self::Authorization { status, .. }
            | Self::Validation { status, .. }
            | Self::Remote { status, .. } => Some(*status),
            Self::RecordNotCreated { last, .. } => last.status(),
            _ => None,
        }
    }

    pub fn classification(&self) -> FailureClass {
        match self {
            Self::Authentication { .. } | Self::Authorization { .. } => FailureClass::Credentials,
            Self::UnresolvedObject(_) => FailureClass::Configuration,
            Self::Validation { .. } | Self::EmptyResponse(_) | Self::Parse(_) => {
                FailureClass::Payload
            }
            Self::TransientNetwork(_) => FailureClass::Transient,
            Self::AssociationUnresolved { .. } => FailureClass::Configuration,
            Self::Remote { status, .. } => match status {
                404 => FailureClass::Configuration,
                429 | 500..=599 => FailureClass::Transient,
                _ => FailureClass::Unknown,
            },
            Self::RecordNotCreated { class, .. } => *class,
        }
    }
}

/// Pull a human-readable message out of a remote error payload.
///
/// Remote errors use `message` either as a string or as a list of strings.
fn remote_message(parsed: &Value) -> Option<String> {
    match parsed.get("message")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        _ => None,
    }
}

pub(crate) fn excerpt(body: &str) -> String {
    if body.chars().count() <= BODY_EXCERPT_LIMIT {
        body.to_string()
    } else {
        let cut: String = body.chars().take(BODY_EXCERPT_LIMIT).collect();
        format!("{}…", cut)
    }
}

/// Result type for CRM operations
pub type CrmResult<T> = Result<T, CrmError>;
