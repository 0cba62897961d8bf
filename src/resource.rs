//! Boundary to the data layer: request identity, phase tracking and the tracked client
//! that feeds the request lifecycle coordinator.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::lock;
use crate::coordinator::RequestLifecycleCoordinator;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{status}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(pub u64);

/// Caller-chosen flags attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestOptions {
    pub suppress_loader: bool,
    pub suppress_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub show_as_toast: bool,
}

impl RequestOptions {
    pub fn silent() -> Self {
        Self {
            suppress_loader: true,
            suppress_error: true,
            ..Self::default()
        }
    }

    pub fn toast(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            show_as_toast: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedRequest {
    pub id: RequestId,
    #[serde(flatten)]
    pub options: RequestOptions,
}

impl TrackedRequest {
    pub fn new(id: u64, options: RequestOptions) -> Self {
        Self {
            id: RequestId(id),
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    Loading,
    Loaded,
    Error(ErrorInfo),
}

/// Derives begin/end/fail calls from observed request state transitions.
pub struct PhaseTracker {
    coordinator: RequestLifecycleCoordinator,
    phases: Mutex<HashMap<RequestId, RequestPhase>>,
}

impl PhaseTracker {
    pub fn new(coordinator: RequestLifecycleCoordinator) -> Self {
        Self {
            coordinator,
            phases: Mutex::new(HashMap::new()),
        }
    }

    pub fn observe(&self, request: &TrackedRequest, phase: RequestPhase) {
        let previous = lock(&self.phases).insert(request.id, phase.clone());
        let was_loading = matches!(previous, Some(RequestPhase::Loading));
        if previous.as_ref() == Some(&phase) {
            return;
        }
        match phase {
            RequestPhase::Loading => self.coordinator.begin(request),
            RequestPhase::Loaded | RequestPhase::Idle if was_loading => {
                self.coordinator.end(request)
            }
            RequestPhase::Loaded | RequestPhase::Idle => {}
            RequestPhase::Error(info) => {
                if was_loading {
                    self.coordinator.end(request);
                }
                self.coordinator.fail(request, info);
            }
        }
    }

    /// Drops the remembered phase, ending the request if it was still loading.
    pub fn forget(&self, request: &TrackedRequest) {
        let previous = lock(&self.phases).remove(&request.id);
        if matches!(previous, Some(RequestPhase::Loading)) {
            self.coordinator.end(request);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRequest {
    pub key: String,
    pub mutating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ResourceRequest {
    pub fn get(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            mutating: false,
            body: None,
        }
    }

    pub fn mutate(key: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            key: key.into(),
            mutating: true,
            body,
        }
    }
}

/// What the directory/file/linked-data services provide.
pub trait ResourceClient: Send + Sync {
    fn call(&self, request: ResourceRequest) -> BoxFuture<'static, Result<Value, ErrorInfo>>;

    /// Drops every cached response. Called after any mutating call.
    fn purge_all(&self);
}

/// Wraps a [`ResourceClient`] so every call drives the loading and error signals.
#[derive(Clone)]
pub struct TrackedClient {
    client: Arc<dyn ResourceClient>,
    coordinator: RequestLifecycleCoordinator,
}

impl TrackedClient {
    pub fn new(client: Arc<dyn ResourceClient>, coordinator: RequestLifecycleCoordinator) -> Self {
        Self {
            client,
            coordinator,
        }
    }

    pub async fn fetch(&self, key: impl Into<String>, options: RequestOptions) -> AppResult<Value> {
        self.run(ResourceRequest::get(key), options).await
    }

    pub async fn mutate(
        &self,
        key: impl Into<String>,
        body: Option<Value>,
        options: RequestOptions,
    ) -> AppResult<Value> {
        let result = self.run(ResourceRequest::mutate(key, body), options).await;
        self.client.purge_all();
        result
    }

    async fn run(&self, request: ResourceRequest, options: RequestOptions) -> AppResult<Value> {
        let tracked = TrackedRequest {
            id: self.coordinator.next_request_id(),
            options,
        };
        let in_flight = InFlight::begin(&self.coordinator, tracked);
        let result = self.client.call(request).await;
        let tracked = in_flight.finish();
        if let Err(info) = &result {
            tracing::debug!(request = tracked.id.0, error = %info, "resource call failed");
            self.coordinator.fail(&tracked, info.clone());
        }
        result.map_err(Into::into)
    }
}

/// Ends the request when dropped, so a cancelled call cannot leave the spinner up.
struct InFlight<'a> {
    coordinator: &'a RequestLifecycleCoordinator,
    request: TrackedRequest,
    ended: bool,
}

impl<'a> InFlight<'a> {
    fn begin(coordinator: &'a RequestLifecycleCoordinator, request: TrackedRequest) -> Self {
        coordinator.begin(&request);
        Self {
            coordinator,
            request,
            ended: false,
        }
    }

    fn finish(mut self) -> TrackedRequest {
        self.ended = true;
        self.coordinator.end(&self.request);
        self.request.clone()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.ended {
            self.coordinator.end(&self.request);
        }
    }
}
