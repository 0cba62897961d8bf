use std::sync::{Arc, Mutex};

use crate::bus::lock;
use crate::error::AppResult;
use crate::event::{UiBus, UiEvent};

use super::{Location, NavigationCause, NavigationEvent};

const HISTORY_CAPACITY: usize = 64;

#[derive(Default)]
struct NavigatorState {
    entries: Vec<Arc<Location>>,
    cursor: usize,
}

impl NavigatorState {
    fn current(&self) -> Option<Arc<Location>> {
        self.entries.get(self.cursor).cloned()
    }

    fn push(&mut self, location: Arc<Location>) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        if self.entries.len() >= HISTORY_CAPACITY {
            self.entries.remove(0);
        }
        self.entries.push(location);
        self.cursor = self.entries.len() - 1;
    }

    fn replace(&mut self, location: Arc<Location>) {
        match self.entries.get_mut(self.cursor) {
            Some(slot) => *slot = location,
            None => self.push(location),
        }
    }
}

/// Owns the current location and publishes one `state-update` per navigation.
pub struct Navigator {
    bus: UiBus,
    state: Mutex<NavigatorState>,
}

impl Navigator {
    pub fn new(bus: UiBus) -> Self {
        Self {
            bus,
            state: Mutex::new(NavigatorState::default()),
        }
    }

    pub fn current(&self) -> Option<Arc<Location>> {
        lock(&self.state).current()
    }

    pub fn navigate(&self, url: &str) -> AppResult<Arc<NavigationEvent>> {
        let location = Arc::new(Location::parse(url)?);
        let event = {
            let mut state = lock(&self.state);
            let last_location = state.current();
            state.push(Arc::clone(&location));
            NavigationEvent::new(location, last_location, NavigationCause::Push)
        };
        Ok(self.publish(event))
    }

    pub fn replace(&self, url: &str) -> AppResult<Arc<NavigationEvent>> {
        let location = Arc::new(Location::parse(url)?);
        let event = {
            let mut state = lock(&self.state);
            let last_location = state.current();
            state.replace(Arc::clone(&location));
            NavigationEvent::new(location, last_location, NavigationCause::Replace)
        };
        Ok(self.publish(event))
    }

    /// Re-publishes the current location, e.g. after a mutation purged cached data.
    pub fn refresh(&self) -> Option<Arc<NavigationEvent>> {
        self.commit(NavigationCause::Replace, |state| state.current())
    }

    pub fn back(&self) -> Option<Arc<NavigationEvent>> {
        self.commit(NavigationCause::Back, |state| {
            if state.cursor == 0 || state.entries.is_empty() {
                return None;
            }
            state.cursor -= 1;
            state.current()
        })
    }

    pub fn forward(&self) -> Option<Arc<NavigationEvent>> {
        self.commit(NavigationCause::Forward, |state| {
            if state.cursor + 1 >= state.entries.len() {
                return None;
            }
            state.cursor += 1;
            state.current()
        })
    }

    fn commit<F>(&self, cause: NavigationCause, apply: F) -> Option<Arc<NavigationEvent>>
    where
        F: FnOnce(&mut NavigatorState) -> Option<Arc<Location>>,
    {
        let event = {
            let mut state = lock(&self.state);
            let last_location = state.current();
            let location = apply(&mut *state)?;
            NavigationEvent::new(location, last_location, cause)
        };
        Some(self.publish(event))
    }

    fn publish(&self, event: NavigationEvent) -> Arc<NavigationEvent> {
        let event = Arc::new(event);
        tracing::debug!(
            pathname = %event.location.pathname,
            page = %event.page,
            cause = ?event.cause,
            "navigation"
        );
        self.bus.publish(UiEvent::StateUpdate(Arc::clone(&event)));
        event
    }
}

#[cfg(test)]
mod tests {
    use super::Navigator;
    use crate::event::{UiBus, UiEvent};
    use crate::navigation::NavigationCause;

    #[test]
    fn navigate_publishes_exactly_one_state_update() {
        let bus = UiBus::new();
        let (_listener, rx) = bus.listen();
        let navigator = Navigator::new(bus);

        let event = navigator.navigate("/directory/a").unwrap();
        assert_eq!(event.page, "directory");
        assert!(event.last_location.is_none());

        let published: Vec<UiEvent> = rx.try_iter().collect();
        assert_eq!(published.len(), 1);
        assert!(matches!(
            &published[0],
            UiEvent::StateUpdate(e) if e.location.pathname == "/directory/a"
        ));
    }

    #[test]
    fn back_and_forward_walk_history() {
        let navigator = Navigator::new(UiBus::new());
        navigator.navigate("/directory/a").unwrap();
        navigator.navigate("/directory/b").unwrap();

        let back = navigator.back().expect("back should exist");
        assert_eq!(back.location.pathname, "/directory/a");
        assert_eq!(back.cause, NavigationCause::Back);
        assert_eq!(
            back.last_location.as_ref().map(|l| l.pathname.as_str()),
            Some("/directory/b")
        );
        assert!(navigator.back().is_none());

        let forward = navigator.forward().expect("forward should exist");
        assert_eq!(forward.location.pathname, "/directory/b");
        assert!(navigator.forward().is_none());
    }

    #[test]
    fn push_after_back_drops_forward_entries() {
        let navigator = Navigator::new(UiBus::new());
        navigator.navigate("/directory/a").unwrap();
        navigator.navigate("/directory/b").unwrap();
        navigator.back().unwrap();
        navigator.navigate("/file/c").unwrap();

        assert!(navigator.forward().is_none());
        assert_eq!(
            navigator.back().map(|e| e.location.pathname.clone()),
            Some("/directory/a".to_string())
        );
    }

    #[test]
    fn refresh_keeps_pathname() {
        let navigator = Navigator::new(UiBus::new());
        assert!(navigator.refresh().is_none());
        navigator.navigate("/directory/a?page=2").unwrap();
        let refreshed = navigator.refresh().unwrap();
        assert!(!refreshed.pathname_changed());
        assert_eq!(refreshed.cause, NavigationCause::Replace);
    }
}
