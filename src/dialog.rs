//! Modal dialog sequencing and toast requests. Rendering belongs to whoever listens on
//! the bus; this module only decides what is shown and when.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::bus::{Subscription, lock};
use crate::error::{AppError, AppResult};
use crate::event::{UiBus, UiEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub text: String,
    #[serde(default)]
    pub kind: ToastKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_time_ms: Option<u64>,
    /// Hold the toast until the next navigation has been published.
    #[serde(default)]
    pub show_on_page_load: bool,
}

impl Toast {
    pub fn new(kind: ToastKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            display_time_ms: None,
            show_on_page_load: false,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(ToastKind::Info, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(ToastKind::Error, text)
    }

    pub fn on_page_load(mut self) -> Self {
        self.show_on_page_load = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub actions: Vec<String>,
}

impl DialogRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            actions: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    Action(String),
    Dismissed,
}

/// Resolves once the dialog is acted on or closed.
#[derive(Debug)]
pub struct DialogTicket {
    id: u64,
    outcome: oneshot::Receiver<DialogOutcome>,
}

impl DialogTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn outcome(self) -> AppResult<DialogOutcome> {
        self.outcome
            .await
            .map_err(|_| AppError::DialogDropped(self.id))
    }
}

struct PendingDialog {
    id: u64,
    request: DialogRequest,
    resolve: oneshot::Sender<DialogOutcome>,
}

#[derive(Default)]
struct DialogState {
    next_id: u64,
    active: Option<PendingDialog>,
    queue: VecDeque<PendingDialog>,
}

pub struct DialogOrchestrator {
    bus: UiBus,
    state: Mutex<DialogState>,
    deferred: Arc<Mutex<Vec<Toast>>>,
    _navigation: Subscription,
}

impl DialogOrchestrator {
    pub fn new(bus: UiBus) -> Self {
        let deferred: Arc<Mutex<Vec<Toast>>> = Arc::default();
        let navigation = {
            let deferred = Arc::clone(&deferred);
            let relay = bus.clone();
            bus.subscribe(move |event: &UiEvent| {
                if event.as_navigation().is_none() {
                    return;
                }
                let toasts = std::mem::take(&mut *lock(&deferred));
                for toast in toasts {
                    relay.publish_deferred(UiEvent::ToastShow(toast));
                }
            })
        };
        Self {
            bus,
            state: Mutex::new(DialogState {
                next_id: 1,
                ..DialogState::default()
            }),
            deferred,
            _navigation: navigation,
        }
    }

    /// Opens immediately when no dialog is showing, otherwise queues behind it.
    pub fn open(&self, request: DialogRequest) -> DialogTicket {
        let (resolve, outcome) = oneshot::channel();
        let (id, opened) = {
            let mut state = lock(&self.state);
            let id = state.next_id;
            state.next_id += 1;
            let pending = PendingDialog {
                id,
                request,
                resolve,
            };
            if state.active.is_none() {
                let opened = pending.request.clone();
                state.active = Some(pending);
                (id, Some(opened))
            } else {
                state.queue.push_back(pending);
                (id, None)
            }
        };
        if let Some(request) = opened {
            self.bus.publish(UiEvent::DialogOpen { id, request });
        } else {
            tracing::debug!(dialog = id, "dialog queued behind active dialog");
        }
        DialogTicket { id, outcome }
    }

    pub fn action(&self, id: u64, action: &str) -> AppResult<()> {
        let pending = self.take_active(id)?;
        self.bus.publish(UiEvent::DialogAction {
            id,
            action: action.to_string(),
        });
        let _ = pending.resolve.send(DialogOutcome::Action(action.to_string()));
        self.bus.publish(UiEvent::DialogClose { id });
        self.open_next();
        Ok(())
    }

    /// Closing a queued dialog removes it without it ever being shown.
    pub fn close(&self, id: u64) -> AppResult<()> {
        let queued = {
            let mut state = lock(&self.state);
            let position = state.queue.iter().position(|pending| pending.id == id);
            position.and_then(|position| state.queue.remove(position))
        };
        if let Some(pending) = queued {
            let _ = pending.resolve.send(DialogOutcome::Dismissed);
            return Ok(());
        }

        let pending = self.take_active(id)?;
        let _ = pending.resolve.send(DialogOutcome::Dismissed);
        self.bus.publish(UiEvent::DialogClose { id });
        self.open_next();
        Ok(())
    }

    pub fn toast(&self, toast: Toast) {
        if toast.show_on_page_load {
            lock(&self.deferred).push(toast);
            return;
        }
        self.bus.publish(UiEvent::ToastShow(toast));
    }

    pub fn active(&self) -> Option<u64> {
        lock(&self.state).active.as_ref().map(|pending| pending.id)
    }

    pub fn queued_len(&self) -> usize {
        lock(&self.state).queue.len()
    }

    pub fn deferred_toasts(&self) -> usize {
        lock(&self.deferred).len()
    }

    fn take_active(&self, id: u64) -> AppResult<PendingDialog> {
        let mut state = lock(&self.state);
        match state.active.take() {
            Some(pending) if pending.id == id => Ok(pending),
            other => {
                state.active = other;
                Err(AppError::invalid_argument(format!("dialog {id} is not open")))
            }
        }
    }

    fn open_next(&self) {
        let opened = {
            let mut state = lock(&self.state);
            if state.active.is_some() {
                return;
            }
            let Some(next) = state.queue.pop_front() else {
                return;
            };
            let opened = (next.id, next.request.clone());
            state.active = Some(next);
            opened
        };
        let (id, request) = opened;
        self.bus.publish(UiEvent::DialogOpen { id, request });
    }
}
