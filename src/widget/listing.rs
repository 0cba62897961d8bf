use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::barrier::NavigationBarrier;
use crate::error::AppResult;
use crate::navigation::NavigationEvent;
use crate::query::{Pagination, QueryCodec, SortSpec, TypeMap, TypedQuery, multi_sort};
use crate::resource::{RequestOptions, TrackedClient};
use crate::routes::{Breadcrumb, PathMatcher};
use crate::scroll::{ScrollHistory, ScrollMatch, ScrollRestore, ScrollTracker};
use crate::selection::{Item, LiveItem, SelectionRegistry};

use super::NavigationWidget;

const ROUTE_KEY: &str = "directory";
const SORT_FIELD: &str = "sort";
const FILTER_FIELD: &str = "filter";
const DEFAULT_SORT: &str = "type,name";

/// What a directory page shows after reacting to a navigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingView {
    /// False when the location is not a directory path; every other field is empty then.
    pub active: bool,
    pub path: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub query: TypedQuery,
    pub sort: SortSpec,
    pub items: Vec<Item>,
    pub pagination: Option<Pagination>,
    pub scroll: Option<ScrollRestore>,
}

/// Directory page: decodes its query, fetches the listing, sorts, paginates and
/// registers the visible rows with the selection registry.
pub struct DirectoryListing {
    client: TrackedClient,
    matcher: Arc<PathMatcher>,
    selection: Arc<SelectionRegistry>,
    scroll: Arc<ScrollTracker>,
    codec: QueryCodec,
    default_sort: SortSpec,
    live: Vec<LiveItem>,
    barrier: Option<NavigationBarrier>,
}

impl DirectoryListing {
    pub fn new(
        client: TrackedClient,
        matcher: Arc<PathMatcher>,
        selection: Arc<SelectionRegistry>,
        history: Arc<ScrollHistory>,
        codec: QueryCodec,
    ) -> Self {
        Self {
            client,
            matcher,
            selection,
            scroll: Arc::new(ScrollTracker::new(history, ScrollMatch::Path)),
            codec,
            default_sort: SortSpec::parse(DEFAULT_SORT),
            live: Vec::new(),
            barrier: None,
        }
    }

    pub fn type_map() -> TypeMap {
        TypeMap::new().string(SORT_FIELD).string(FILTER_FIELD)
    }

    /// Handle for whoever observes the scroll position of this view.
    pub fn scroll_tracker(&self) -> Arc<ScrollTracker> {
        Arc::clone(&self.scroll)
    }

    fn attached(&self) -> bool {
        self.barrier
            .as_ref()
            .is_none_or(NavigationBarrier::is_attached)
    }

    /// Shared scroll history and selection are left alone once unmounted.
    async fn reload(&mut self, event: Arc<NavigationEvent>) -> AppResult<ListingView> {
        if !self.attached() {
            return Ok(ListingView::default());
        }
        let restore = self.scroll.on_navigation(&event);
        let segments = event.location.segments();
        let route = self
            .matcher
            .match_route(&segments)
            .filter(|route| route.key == ROUTE_KEY);
        let Some(route) = route else {
            self.live.clear();
            return Ok(ListingView::default());
        };

        let query = self.codec.decode(&event.location.query);
        let sort = query
            .text(SORT_FIELD)
            .map(SortSpec::parse)
            .filter(|sort| !sort.is_empty())
            .unwrap_or_else(|| self.default_sort.clone());
        let path = format!("/{}", route.remainder.join("/"));

        let listing = self
            .client
            .fetch(format!("directory:{path}"), RequestOptions::default())
            .await?;
        if !self.attached() {
            self.live.clear();
            return Ok(ListingView::default());
        }
        let mut items: Vec<Item> = serde_json::from_value(listing)?;
        if let Some(filter) = query.text(FILTER_FIELD).map(str::to_lowercase) {
            items.retain(|item| item.name.to_lowercase().contains(&filter));
        }
        multi_sort(&mut items, &sort);

        let pagination = Pagination::new(
            items.len(),
            query.page(),
            query.page_size_or(self.codec.page_size()),
        );
        let visible = pagination.slice(&items).to_vec();
        self.live = visible
            .iter()
            .map(|item| self.selection.register_item(event.page.clone(), item.clone()))
            .collect();
        tracing::debug!(%path, shown = visible.len(), total = items.len(), "directory listed");

        Ok(ListingView {
            active: true,
            path,
            breadcrumbs: self.matcher.breadcrumbs(&segments),
            query,
            sort,
            items: visible,
            pagination: Some(pagination),
            scroll: Some(restore),
        })
    }
}

impl NavigationWidget for DirectoryListing {
    type View = ListingView;

    fn name(&self) -> &str {
        "directory-listing"
    }

    fn on_mount(&mut self, barrier: &NavigationBarrier) {
        self.barrier = Some(barrier.clone());
    }

    fn react(&mut self, event: Arc<NavigationEvent>) -> BoxFuture<'_, AppResult<ListingView>> {
        Box::pin(self.reload(event))
    }
}
