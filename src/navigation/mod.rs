mod location;
mod navigator;

use std::sync::Arc;

use serde::Serialize;

pub use location::{Location, RawQuery, parse_query, path_segments};
pub use navigator::Navigator;

const CONFIG_SEGMENT: &str = "config";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationCause {
    Push,
    Replace,
    Back,
    Forward,
}

/// One atomic change of location, shared read-only with every subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationEvent {
    pub location: Arc<Location>,
    pub last_location: Option<Arc<Location>>,
    pub page: String,
    pub last_page: Option<String>,
    pub cause: NavigationCause,
}

impl NavigationEvent {
    pub fn new(
        location: Arc<Location>,
        last_location: Option<Arc<Location>>,
        cause: NavigationCause,
    ) -> Self {
        let page = logical_page(&location);
        let last_page = last_location.as_deref().map(logical_page);
        Self {
            location,
            last_location,
            page,
            last_page,
            cause,
        }
    }

    /// True for the first navigation and whenever the pathname differs.
    pub fn pathname_changed(&self) -> bool {
        self.last_location
            .as_deref()
            .is_none_or(|last| !last.same_path(&self.location))
    }

    pub fn query_changed(&self) -> bool {
        self.last_location
            .as_deref()
            .is_none_or(|last| last.query != self.location.query)
    }

    pub fn page_changed(&self) -> bool {
        self.last_page.as_deref() != Some(self.page.as_str())
    }
}

/// First path segment, except that `/config/<name>` pages are their own logical page.
pub fn logical_page(location: &Location) -> String {
    let segments = location.segments();
    match segments.as_slice() {
        [] => String::new(),
        [first, second, ..] if first == CONFIG_SEGMENT => second.clone(),
        [first, ..] => first.clone(),
    }
}
