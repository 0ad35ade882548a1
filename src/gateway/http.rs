//! reqwest-backed gateway

use super::{ApiRequest, CrmGateway, Method};
use crate::config::{CrmConfig, Credentials};
use crate::error::{excerpt, CrmError};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Gateway that performs real HTTPS calls against the CRM API.
#[derive(Clone, Debug)]
pub struct HttpGateway {
    /// The inner client used to make requests
    inner: reqwest::Client,
    base_url: String,
    api_version: String,
    credentials: Credentials,
}

impl HttpGateway {
    pub fn new(config: &CrmConfig, credentials: Credentials) -> Result<Self, CrmError> {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CrmError::TransientNetwork(format!("unable to build client: {}", e)))?;

        Ok(Self {
            inner,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            credentials,
        })
    }
}

impl HttpGateway {
    /// Build the outbound request: bearer credential and `Version` on every
    /// call, then the caller's query, headers and JSON body.
    fn build_request(&self, request: &ApiRequest) -> Result<reqwest::Request, CrmError> {
        let url = format!("{}{}", self.base_url, request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .inner
            .request(method, &url)
            .bearer_auth(&self.credentials.access_token)
            .header("Version", &self.api_version)
            .header("Accept", "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder
            .build()
            .map_err(|e| CrmError::Parse(format!("cannot build {}: {}", request.describe(), e)))
    }
}

#[async_trait]
impl CrmGateway for HttpGateway {
    fn location_id(&self) -> &str {
        &self.credentials.location_id
    }

    #[tracing::instrument(skip(self, request), fields(call = %request.describe()), level = "debug")]
    async fn call(&self, request: ApiRequest) -> Result<Value, CrmError> {
        let outbound = self.build_request(&request)?;

        let response = self
            .inner
            .execute(outbound)
            .await
            .map_err(|e| CrmError::TransientNetwork(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CrmError::TransientNetwork(e.to_string()))?;

        interpret_response(status.as_u16(), &text, &request.describe())
    }
}

/// Turn a status and body read exactly once into a parsed value or typed error.
fn interpret_response(status: u16, text: &str, call: &str) -> Result<Value, CrmError> {
    let parsed = serde_json::from_str::<Value>(text).ok();

    if !(200..300).contains(&status) {
        tracing::debug!(status, call, body = %excerpt(text), "remote call failed");
        return Err(CrmError::from_status(status, text, parsed));
    }

    if text.trim().is_empty() {
        return Err(CrmError::EmptyResponse(call.to_string()));
    }

    parsed.ok_or_else(|| {
        CrmError::Parse(format!("{} returned non-JSON body: {}", call, excerpt(text)))
    })
}
