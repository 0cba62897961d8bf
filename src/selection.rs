//! Session-wide item selection and the registry of live item widgets.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::bus::{Subscription, lock};
use crate::event::{UiBus, UiEvent};
use crate::query::{SortKey, SortValue};

/// A listing entry as returned by the directory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

impl Item {
    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            file_id: Some(id.into()),
            directory_id: None,
            name: name.into(),
            size: None,
            modified: None,
        }
    }

    pub fn directory(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            file_id: None,
            directory_id: Some(id.into()),
            name: name.into(),
            size: None,
            modified: None,
        }
    }

    /// `None` for an item carrying neither id; such items cannot be selected.
    pub fn key(&self) -> Option<ItemKey> {
        match (&self.file_id, &self.directory_id) {
            (Some(id), _) => Some(ItemKey::File(id.clone())),
            (None, Some(id)) => Some(ItemKey::Directory(id.clone())),
            (None, None) => None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.file_id.is_some()
    }
}

impl SortKey for Item {
    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "name" => Some(SortValue::Text(self.name.clone())),
            "size" => self.size.map(|size| SortValue::Number(size as f64)),
            "modified" => self.modified.clone().map(SortValue::Text),
            "type" => Some(SortValue::Text(
                if self.is_file() { "file" } else { "directory" }.to_string(),
            )),
            _ => None,
        }
    }
}

/// Files and directories live in separate id spaces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemKey {
    File(String),
    Directory(String),
}

struct LiveEntry {
    page: String,
    item: Item,
}

#[derive(Default)]
struct SelectionState {
    selected: Vec<Item>,
    active_page: String,
    live: BTreeMap<u64, LiveEntry>,
    next_live_id: u64,
}

impl SelectionState {
    fn position(&self, item: &Item) -> Option<usize> {
        let key = item.key()?;
        self.selected
            .iter()
            .position(|selected| selected.key().as_ref() == Some(&key))
    }

    fn snapshot(&self) -> (String, Vec<Item>) {
        (self.active_page.clone(), self.selected.clone())
    }
}

/// Shared selection set. Every mutation publishes one `selection-update`.
pub struct SelectionRegistry {
    bus: UiBus,
    state: Arc<Mutex<SelectionState>>,
}

impl SelectionRegistry {
    pub fn new(bus: UiBus) -> Self {
        Self {
            bus,
            state: Arc::new(Mutex::new(SelectionState {
                next_live_id: 1,
                ..SelectionState::default()
            })),
        }
    }

    /// Items without an id are ignored and publish nothing.
    pub fn toggle(&self, item: &Item) -> bool {
        if item.key().is_none() {
            tracing::debug!(name = %item.name, "item without id cannot be selected");
            return false;
        }
        let (selected_now, snapshot) = {
            let mut state = lock(&self.state);
            let selected_now = match state.position(item) {
                Some(index) => {
                    state.selected.remove(index);
                    false
                }
                None => {
                    state.selected.push(item.clone());
                    true
                }
            };
            (selected_now, state.snapshot())
        };
        self.broadcast(snapshot);
        selected_now
    }

    pub fn select_all(&self, page_items: &[Item]) {
        let snapshot = {
            let mut state = lock(&self.state);
            for item in page_items.iter().filter(|item| item.key().is_some()) {
                if state.position(item).is_none() {
                    state.selected.push(item.clone());
                }
            }
            state.snapshot()
        };
        self.broadcast(snapshot);
    }

    /// Header-checkbox behavior: deselects the page when it is fully selected,
    /// otherwise selects every item on it.
    pub fn toggle_all(&self, page_items: &[Item]) {
        if !self.all_selected_on_page(page_items) {
            self.select_all(page_items);
            return;
        }
        let snapshot = {
            let mut state = lock(&self.state);
            state
                .selected
                .retain(|selected| !page_items.iter().any(|item| item.key() == selected.key()));
            state.snapshot()
        };
        self.broadcast(snapshot);
    }

    pub fn clear(&self) {
        let snapshot = {
            let mut state = lock(&self.state);
            state.selected.clear();
            state.snapshot()
        };
        self.broadcast(snapshot);
    }

    pub fn is_selected(&self, item: &Item) -> bool {
        lock(&self.state).position(item).is_some()
    }

    /// False for a page with no selectable items.
    pub fn all_selected_on_page(&self, page_items: &[Item]) -> bool {
        let state = lock(&self.state);
        let mut selectable = page_items.iter().filter(|item| item.key().is_some()).peekable();
        selectable.peek().is_some() && selectable.all(|item| state.position(item).is_some())
    }

    pub fn selected(&self) -> Vec<Item> {
        lock(&self.state).selected.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).selected.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).selected.is_empty()
    }

    pub fn active_page(&self) -> String {
        lock(&self.state).active_page.clone()
    }

    pub(crate) fn set_active_page(&self, page: &str) {
        lock(&self.state).active_page = page.to_string();
    }

    /// Registers an item widget for `page`. Dropping the handle unregisters it.
    pub fn register_item(&self, page: impl Into<String>, item: Item) -> LiveItem {
        let mut state = lock(&self.state);
        let id = state.next_live_id;
        state.next_live_id = state.next_live_id.saturating_add(1);
        state.live.insert(
            id,
            LiveEntry {
                page: page.into(),
                item,
            },
        );
        LiveItem {
            id,
            state: Arc::downgrade(&self.state),
        }
    }

    pub fn live_count(&self) -> usize {
        lock(&self.state).live.len()
    }

    /// Publishes `selection-select-all`, then every live item on the active page
    /// selects itself. The set changes once, with one `selection-update`.
    pub fn request_select_all(&self) {
        let (page, items) = {
            let state = lock(&self.state);
            let items: Vec<Item> = state
                .live
                .values()
                .filter(|entry| entry.page == state.active_page)
                .map(|entry| entry.item.clone())
                .collect();
            (state.active_page.clone(), items)
        };
        self.bus.publish(UiEvent::SelectionSelectAll { page });
        self.select_all(&items);
    }

    /// Calls `handler` with the selection only while `page` is the active page.
    pub fn subscribe_active<F>(&self, page: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&[Item]) + Send + Sync + 'static,
    {
        let page = page.into();
        self.bus.subscribe(move |event| {
            if let UiEvent::SelectionUpdate {
                page: active,
                selected,
            } = event
                && *active == page
            {
                handler(selected);
            }
        })
    }

    fn broadcast(&self, (page, selected): (String, Vec<Item>)) {
        self.bus.publish(UiEvent::SelectionUpdate { page, selected });
    }
}

pub struct LiveItem {
    id: u64,
    state: Weak<Mutex<SelectionState>>,
}

impl Drop for LiveItem {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            lock(&state).live.remove(&self.id);
        }
    }
}

/// Clears the selection whenever the pathname changes and tracks the active page.
pub struct SelectionController {
    _subscription: Subscription,
}

impl SelectionController {
    pub fn attach(registry: Arc<SelectionRegistry>, bus: &UiBus) -> Self {
        let subscription = bus.subscribe(move |event| {
            let Some(navigation) = event.as_navigation() else {
                return;
            };
            registry.set_active_page(&navigation.page);
            if navigation.pathname_changed() && !registry.is_empty() {
                tracing::debug!(page = %navigation.page, "clearing selection after path change");
                registry.clear();
            }
        });
        Self {
            _subscription: subscription,
        }
    }
}
