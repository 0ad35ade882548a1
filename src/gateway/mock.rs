//! Mock gateway for testing: returns preconfigured responses and records calls

use super::{ApiRequest, CrmGateway, Method};
use crate::error::CrmError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Handler = Arc<dyn Fn(&ApiRequest) -> Result<Value, CrmError> + Send + Sync>;

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// In-memory `CrmGateway`.
///
/// Routes match on method and exact path (the query string is ignored);
/// the first registered route wins. Unmatched calls fail with a 404
/// `Remote` error, which is what the live API does for unknown paths.
/// Share it as `Arc<MockGateway>` to keep a handle for call assertions.
pub struct MockGateway {
    location_id: String,
    routes: Vec<Route>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockGateway {
    pub fn new(location_id: impl Into<String>) -> Self {
        Self {
            location_id: location_id.into(),
            routes: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn push_route(mut self, method: Method, path: impl Into<String>, handler: Handler) -> Self {
        self.routes.push(Route {
            method,
            path: path.into(),
            handler,
        });
        self
    }

    /// Answer `method path` with a fixed JSON body.
    pub fn with_response(self, method: Method, path: impl Into<String>, body: Value) -> Self {
        self.push_route(method, path, Arc::new(move |_| Ok(body.clone())))
    }

    /// Answer `method path` with a fixed error.
    pub fn with_failure(self, method: Method, path: impl Into<String>, error: CrmError) -> Self {
        self.push_route(method, path, Arc::new(move |_| Err(error.clone())))
    }

    /// Answer `method path` by inspecting the request.
    pub fn with_handler<F>(self, method: Method, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<Value, CrmError> + Send + Sync + 'static,
    {
        self.push_route(method, path, Arc::new(handler))
    }

    fn recorded(&self) -> MutexGuard<'_, Vec<ApiRequest>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.recorded().clone()
    }

    pub fn call_count(&self) -> usize {
        self.recorded().len()
    }

    /// Calls made to a specific method and path.
    pub fn calls_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.recorded()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CrmGateway for MockGateway {
    fn location_id(&self) -> &str {
        &self.location_id
    }

    async fn call(&self, request: ApiRequest) -> Result<Value, CrmError> {
        self.recorded().push(request.clone());

        match self
            .routes
            .iter()
            .find(|r| r.method == request.method && r.path == request.path)
        {
            Some(route) => (route.handler)(&request),
            None => Err(CrmError::Remote {
                status: 404,
                message: format!("no mock route for {}", request.describe()),
                details: None,
            }),
        }
    }
}
