//! Collapses concurrent request lifecycles into one debounced loading signal and one
//! grouped error surface.

use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::bus::lock;
use crate::config::CoordinatorConfig;
use crate::dialog::Toast;
use crate::event::{UiBus, UiEvent};
use crate::resource::{ErrorInfo, RequestId, TrackedRequest};
use crate::runtime::TaskRuntime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRequest {
    pub request_id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub show_as_toast: bool,
    pub error: ErrorInfo,
}

struct PendingTimer {
    token: u64,
    handle: JoinHandle<()>,
}

impl PendingTimer {
    fn cancel(self) {
        self.handle.abort();
    }
}

#[derive(Default)]
struct LoadingState {
    /// Open begins per id; a reused id must be ended as often as it was begun.
    in_flight: HashMap<RequestId, usize>,
    visible: bool,
    hide_timer: Option<PendingTimer>,
}

#[derive(Default)]
struct ErrorState {
    buffer: Vec<ErrorRequest>,
    flush_timer: Option<PendingTimer>,
}

struct Shared {
    bus: UiBus,
    runtime: TaskRuntime,
    hide_delay: Duration,
    flush_delay: Duration,
    default_message: String,
    loading: Mutex<LoadingState>,
    errors: Mutex<ErrorState>,
    next_token: AtomicU64,
    next_request: AtomicU64,
}

/// Cheap to clone; all clones drive the same signals.
#[derive(Clone)]
pub struct RequestLifecycleCoordinator {
    shared: Arc<Shared>,
}

impl RequestLifecycleCoordinator {
    pub fn new(bus: UiBus, config: &CoordinatorConfig, runtime: TaskRuntime) -> Self {
        Self {
            shared: Arc::new(Shared {
                bus,
                runtime,
                hide_delay: config.loading_hide_delay(),
                flush_delay: config.error_flush_delay(),
                default_message: config.default_error_message.clone(),
                loading: Mutex::new(LoadingState::default()),
                errors: Mutex::new(ErrorState::default()),
                next_token: AtomicU64::new(1),
                next_request: AtomicU64::new(1),
            }),
        }
    }

    /// Hands out an id no other client of this coordinator has been given.
    pub fn next_request_id(&self) -> RequestId {
        RequestId(self.shared.next_request.fetch_add(1, Ordering::Relaxed))
    }

    pub fn begin(&self, request: &TrackedRequest) {
        if request.options.suppress_loader {
            return;
        }
        let show = {
            let mut loading = lock(&self.shared.loading);
            if let Some(timer) = loading.hide_timer.take() {
                timer.cancel();
            }
            *loading.in_flight.entry(request.id).or_insert(0) += 1;
            !mem::replace(&mut loading.visible, true)
        };
        if show {
            tracing::debug!(request = request.id.0, "loading indicator shown");
            self.shared.bus.publish(UiEvent::LoadingUpdate { show: true });
        }
    }

    /// Unknown or repeated ends are ignored.
    pub fn end(&self, request: &TrackedRequest) {
        if request.options.suppress_loader {
            return;
        }
        let mut loading = lock(&self.shared.loading);
        let Some(open) = loading.in_flight.get_mut(&request.id) else {
            return;
        };
        *open -= 1;
        if *open == 0 {
            loading.in_flight.remove(&request.id);
        }
        if loading.in_flight.is_empty() && loading.visible && loading.hide_timer.is_none() {
            let token = self.shared.next_token.fetch_add(1, Ordering::Relaxed);
            let shared = Arc::downgrade(&self.shared);
            let delay = self.shared.hide_delay;
            let handle = self.shared.runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(shared) = Weak::upgrade(&shared) {
                    shared.finish_hide(token);
                }
            });
            loading.hide_timer = Some(PendingTimer { token, handle });
        }
    }

    pub fn fail(&self, request: &TrackedRequest, error: ErrorInfo) {
        if request.options.suppress_error {
            tracing::debug!(request = request.id.0, %error, "suppressed request error");
            return;
        }
        let mut errors = lock(&self.shared.errors);
        errors.buffer.push(ErrorRequest {
            request_id: request.id,
            message: request.options.message.clone(),
            show_as_toast: request.options.show_as_toast,
            error,
        });
        if errors.flush_timer.is_none() {
            let token = self.shared.next_token.fetch_add(1, Ordering::Relaxed);
            let shared = Arc::downgrade(&self.shared);
            let delay = self.shared.flush_delay;
            let handle = self.shared.runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(shared) = Weak::upgrade(&shared) {
                    shared.flush_errors(token);
                }
            });
            errors.flush_timer = Some(PendingTimer { token, handle });
        }
    }

    pub fn dismiss_errors(&self) {
        self.shared.bus.publish(UiEvent::ErrorUpdate {
            show: false,
            requests: Vec::new(),
        });
    }

    pub fn in_flight_len(&self) -> usize {
        lock(&self.shared.loading).in_flight.values().sum()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.shared.loading).visible
    }

    pub fn pending_errors(&self) -> usize {
        lock(&self.shared.errors).buffer.len()
    }
}

impl Shared {
    fn finish_hide(&self, token: u64) {
        {
            let mut loading = lock(&self.loading);
            if loading.hide_timer.as_ref().map(|timer| timer.token) != Some(token) {
                return;
            }
            loading.hide_timer = None;
            if !loading.in_flight.is_empty() || !loading.visible {
                return;
            }
            loading.visible = false;
        }
        tracing::debug!("loading indicator hidden");
        self.bus.publish(UiEvent::LoadingUpdate { show: false });
    }

    fn flush_errors(&self, token: u64) {
        let batch = {
            let mut errors = lock(&self.errors);
            if errors.flush_timer.as_ref().map(|timer| timer.token) != Some(token) {
                return;
            }
            errors.flush_timer = None;
            mem::take(&mut errors.buffer)
        };
        if batch.is_empty() {
            return;
        }

        let (toasts, grouped): (Vec<ErrorRequest>, Vec<ErrorRequest>) =
            batch.into_iter().partition(|request| request.show_as_toast);
        tracing::warn!(
            grouped = grouped.len(),
            toasts = toasts.len(),
            "flushing request errors"
        );
        if !grouped.is_empty() {
            self.bus.publish(UiEvent::ErrorUpdate {
                show: true,
                requests: grouped,
            });
        }
        for request in toasts {
            let text = request
                .message
                .unwrap_or_else(|| self.default_message.clone());
            self.bus.publish(UiEvent::ToastShow(Toast::error(text)));
        }
    }
}

#[cfg(test)]
pub(crate) fn test_coordinator(bus: UiBus) -> RequestLifecycleCoordinator {
    RequestLifecycleCoordinator::new(
        bus,
        &CoordinatorConfig::default(),
        TaskRuntime::new().expect("runtime should initialize"),
    )
}
