use std::sync::Arc;

use serde::Serialize;

use crate::coordinator::ErrorRequest;
use crate::dialog::{DialogRequest, Toast};
use crate::navigation::NavigationEvent;
use crate::selection::Item;

/// Everything published on the session bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "topic", content = "payload", rename_all = "kebab-case")]
pub enum UiEvent {
    /// Published once per navigation.
    StateUpdate(Arc<NavigationEvent>),
    LoadingUpdate {
        show: bool,
    },
    ErrorUpdate {
        show: bool,
        requests: Vec<ErrorRequest>,
    },
    ToastShow(Toast),
    DialogOpen {
        id: u64,
        request: DialogRequest,
    },
    DialogAction {
        id: u64,
        action: String,
    },
    DialogClose {
        id: u64,
    },
    SelectionUpdate {
        page: String,
        selected: Vec<Item>,
    },
    SelectionSelectAll {
        page: String,
    },
}

impl UiEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::StateUpdate(_) => "state-update",
            Self::LoadingUpdate { .. } => "loading-update",
            Self::ErrorUpdate { .. } => "error-update",
            Self::ToastShow(_) => "toast-show",
            Self::DialogOpen { .. } => "dialog-open",
            Self::DialogAction { .. } => "dialog-action",
            Self::DialogClose { .. } => "dialog-close",
            Self::SelectionUpdate { .. } => "selection-update",
            Self::SelectionSelectAll { .. } => "selection-select-all",
        }
    }

    pub fn as_navigation(&self) -> Option<&Arc<NavigationEvent>> {
        match self {
            Self::StateUpdate(event) => Some(event),
            _ => None,
        }
    }
}

pub type UiBus = crate::bus::EventBus<UiEvent>;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::UiEvent;
    use crate::dialog::Toast;
    use crate::navigation::{Location, NavigationCause, NavigationEvent};

    #[test]
    fn events_serialize_with_topic_tag() {
        let event = UiEvent::LoadingUpdate { show: true };
        let json = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(json["topic"], "loading-update");
        assert_eq!(json["payload"]["show"], true);
        assert_eq!(event.topic(), "loading-update");
    }

    #[test]
    fn navigation_payload_carries_page_and_cause() {
        let location = Location::parse("/config/autopath?x=1").expect("location should parse");
        let event = UiEvent::StateUpdate(Arc::new(NavigationEvent::new(
            Arc::new(location),
            None,
            NavigationCause::Push,
        )));
        let json = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(json["topic"], "state-update");
        assert_eq!(json["payload"]["page"], "autopath");
        assert_eq!(json["payload"]["cause"], "push");
        assert_eq!(json["payload"]["location"]["query"]["x"], "1");
    }

    #[test]
    fn toast_payload_uses_kebab_case_kind() {
        let event = UiEvent::ToastShow(Toast::error("boom"));
        let json = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(json["payload"]["kind"], "error");
        assert_eq!(json["payload"]["show_on_page_load"], false);
    }
}
