//! Request gateway: the single place raw HTTP I/O happens
//!
//! Every other component talks to the CRM through the `CrmGateway` trait,
//! so discovery, writes and association probing can be exercised against
//! `MockGateway` without a network.

mod http;
pub mod mock;

pub use http::HttpGateway;
pub use mock::MockGateway;

use crate::error::CrmError;
use async_trait::async_trait;
use serde_json::Value;

/// Header carrying the tenant/location scope on endpoints that want it
/// outside the query string.
pub const LOCATION_HEADER: &str = "Location-Id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// One outbound API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the configured base URL, starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Extra headers on top of the credential and version headers
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach the location scope as a header.
    pub fn scoped(self, location_id: &str) -> Self {
        self.with_header(LOCATION_HEADER, location_id)
    }

    /// Look up a query parameter by name.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up an extra header by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `METHOD /path` for diagnostics.
    pub fn describe(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Authenticated access to the CRM API.
///
/// Implementations inject the bearer credential and API version on every
/// call, read the body once, and turn non-2xx statuses, empty 2xx bodies
/// and undecodable bodies into typed `CrmError`s.
#[async_trait]
pub trait CrmGateway: Send + Sync {
    /// Tenant/location scope every write is made under.
    fn location_id(&self) -> &str;

    /// Perform the call and return the parsed JSON body.
    async fn call(&self, request: ApiRequest) -> Result<Value, CrmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_accumulates_query_body_and_headers() {
        let request = ApiRequest::post("/objects/abc/records")
            .with_query("locationId", "loc-1")
            .with_body(json!({"properties": {}}))
            .scoped("loc-1");

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.query_param("locationId"), Some("loc-1"));
        assert_eq!(request.header("location-id"), Some("loc-1"));
        assert!(request.body.is_some());
        assert_eq!(request.describe(), "POST /objects/abc/records");
    }
}
