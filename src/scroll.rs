//! Bounded scroll-position history used to restore offsets on back-navigation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;

use crate::bus::lock;
use crate::navigation::{Location, NavigationCause, NavigationEvent};

pub const DEFAULT_SCROLL_CAPACITY: usize = 20;

#[derive(Debug, Clone)]
pub struct ScrollHistoryEntry {
    pub page_token: String,
    pub scroll_offset: u32,
    pub location: Arc<Location>,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "offset")]
pub enum ScrollRestore {
    Top,
    Offset(u32),
}

/// Secondary predicate deciding whether a stored entry belongs to the new location.
pub enum ScrollMatch {
    /// Directory views: the stored pathname must match.
    Path,
    /// Search views: the stored query must match.
    Query,
    Custom(Box<dyn Fn(&Location, &Location) -> bool + Send + Sync>),
}

impl ScrollMatch {
    fn matches(&self, stored: &Location, target: &Location) -> bool {
        match self {
            Self::Path => stored.pathname == target.pathname,
            Self::Query => stored.query == target.query,
            Self::Custom(predicate) => predicate(stored, target),
        }
    }
}

pub struct ScrollHistory {
    entries: Mutex<VecDeque<ScrollHistoryEntry>>,
    capacity: usize,
}

impl Default for ScrollHistory {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLL_CAPACITY)
    }
}

impl ScrollHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(
        &self,
        page_token: impl Into<String>,
        scroll_offset: u32,
        location: Arc<Location>,
    ) {
        let mut entries = lock(&self.entries);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(ScrollHistoryEntry {
            page_token: page_token.into(),
            scroll_offset,
            location,
            timestamp: Instant::now(),
        });
    }

    pub fn last_offset_for(&self, page_token: &str) -> Option<u32> {
        lock(&self.entries)
            .iter()
            .rev()
            .find(|entry| entry.page_token == page_token)
            .map(|entry| entry.scroll_offset)
    }

    pub fn last_offset_matching<F>(&self, page_token: &str, predicate: F) -> Option<u32>
    where
        F: Fn(&ScrollHistoryEntry) -> bool,
    {
        lock(&self.entries)
            .iter()
            .rev()
            .find(|entry| entry.page_token == page_token && predicate(entry))
            .map(|entry| entry.scroll_offset)
    }

    /// Same pathname means a refresh or in-page query change, which scrolls to the top
    /// without looking at history.
    pub fn restore(&self, event: &NavigationEvent, matcher: &ScrollMatch) -> ScrollRestore {
        if !event.pathname_changed() {
            return ScrollRestore::Top;
        }
        self.last_offset_matching(&event.page, |entry| {
            matcher.matches(&entry.location, &event.location)
        })
        .map(ScrollRestore::Offset)
        .unwrap_or(ScrollRestore::Top)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}

#[derive(Default)]
struct TrackerState {
    current: Option<(String, Arc<Location>)>,
    offset: u32,
}

/// Per-widget view of the shared history: remembers the live offset and writes it
/// out on every navigation away. Shared between the widget task and the scroll source.
pub struct ScrollTracker {
    history: Arc<ScrollHistory>,
    matcher: ScrollMatch,
    state: Mutex<TrackerState>,
}

impl ScrollTracker {
    pub fn new(history: Arc<ScrollHistory>, matcher: ScrollMatch) -> Self {
        Self {
            history,
            matcher,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn on_scroll(&self, offset: u32) {
        let mut state = lock(&self.state);
        state.offset = offset;
        if let Some((page, location)) = &state.current {
            self.history.record(page.clone(), offset, Arc::clone(location));
        }
    }

    /// Records the outgoing position, then decides where the new view starts.
    /// Only history traversal consults stored offsets.
    pub fn on_navigation(&self, event: &NavigationEvent) -> ScrollRestore {
        let mut state = lock(&self.state);
        if let Some((page, location)) = state.current.take() {
            self.history.record(page, state.offset, location);
        }
        state.current = Some((event.page.clone(), Arc::clone(&event.location)));

        let restore = match event.cause {
            NavigationCause::Back | NavigationCause::Forward => {
                self.history.restore(event, &self.matcher)
            }
            NavigationCause::Push | NavigationCause::Replace => ScrollRestore::Top,
        };
        state.offset = match restore {
            ScrollRestore::Top => 0,
            ScrollRestore::Offset(offset) => offset,
        };
        restore
    }

    pub fn offset(&self) -> u32 {
        lock(&self.state).offset
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{ScrollHistory, ScrollMatch, ScrollRestore, ScrollTracker};
    use crate::navigation::{Location, NavigationCause, NavigationEvent};

    fn location(url: &str) -> Arc<Location> {
        Arc::new(Location::parse(url).unwrap())
    }

    fn event(to: &str, from: &str, cause: NavigationCause) -> NavigationEvent {
        NavigationEvent::new(location(to), Some(location(from)), cause)
    }

    #[test]
    fn ring_buffer_evicts_oldest_entries() {
        let history = ScrollHistory::new(20);
        for offset in 0..25 {
            history.record(format!("p{offset}"), offset, location("/directory/a"));
        }
        assert_eq!(history.len(), 20);
        assert_eq!(history.last_offset_for("p4"), None);
        assert_eq!(history.last_offset_for("p5"), Some(5));
    }

    #[test]
    fn newest_entry_wins() {
        let history = ScrollHistory::default();
        history.record("directory", 100, location("/directory/a"));
        history.record("directory", 250, location("/directory/a"));
        assert_eq!(history.last_offset_for("directory"), Some(250));
        assert_eq!(history.last_offset_for("search"), None);
    }

    #[test]
    fn restore_scrolls_top_when_pathname_unchanged() {
        let history = ScrollHistory::default();
        history.record("directory", 400, location("/directory/a"));
        let refresh = event("/directory/a?page=2", "/directory/a", NavigationCause::Back);
        assert_eq!(history.restore(&refresh, &ScrollMatch::Path), ScrollRestore::Top);
    }

    #[test]
    fn restore_requires_secondary_predicate() {
        let history = ScrollHistory::default();
        history.record("directory", 120, location("/directory/a"));
        history.record("directory", 480, location("/directory/b"));

        let back_to_a = event("/directory/a", "/file/x", NavigationCause::Back);
        assert_eq!(
            history.restore(&back_to_a, &ScrollMatch::Path),
            ScrollRestore::Offset(120)
        );

        history.record("search", 60, location("/search?q=one"));
        let search = event("/search?q=two", "/directory/a", NavigationCause::Back);
        assert_eq!(history.restore(&search, &ScrollMatch::Query), ScrollRestore::Top);
    }

    #[test]
    fn tracker_records_outgoing_offset_and_restores_on_back() {
        let history = Arc::new(ScrollHistory::default());
        let tracker = ScrollTracker::new(Arc::clone(&history), ScrollMatch::Path);

        let first = NavigationEvent::new(location("/directory/a"), None, NavigationCause::Push);
        assert_eq!(tracker.on_navigation(&first), ScrollRestore::Top);
        tracker.on_scroll(300);

        let away = event("/file/readme", "/directory/a", NavigationCause::Push);
        assert_eq!(tracker.on_navigation(&away), ScrollRestore::Top);
        assert_eq!(tracker.offset(), 0);

        let back = event("/directory/a", "/file/readme", NavigationCause::Back);
        assert_eq!(tracker.on_navigation(&back), ScrollRestore::Offset(300));
        assert_eq!(tracker.offset(), 300);
    }
}
