//! Composition root: builds the shared singletons once and hands them to widgets.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::config::Config;
use crate::coordinator::RequestLifecycleCoordinator;
use crate::dialog::DialogOrchestrator;
use crate::error::AppResult;
use crate::event::UiBus;
use crate::navigation::Navigator;
use crate::query::{QueryCodec, TypeMap};
use crate::resource::{PhaseTracker, ResourceClient, TrackedClient};
use crate::routes::PathMatcher;
use crate::runtime::TaskRuntime;
use crate::scroll::{ScrollHistory, ScrollTracker};
use crate::selection::{SelectionController, SelectionRegistry};
use crate::widget::{DirectoryListing, ListingView, NavigationWidget, WidgetHandle, WidgetHost};

pub struct Session {
    config: Config,
    bus: UiBus,
    runtime: TaskRuntime,
    navigator: Navigator,
    coordinator: RequestLifecycleCoordinator,
    selection: Arc<SelectionRegistry>,
    scroll: Arc<ScrollHistory>,
    matcher: Arc<PathMatcher>,
    dialogs: DialogOrchestrator,
    _selection_controller: SelectionController,
}

impl Session {
    pub fn new(config: Config) -> AppResult<Self> {
        Self::with_bus(config, UiBus::new())
    }

    /// Lets a caller subscribe to the bus before any component does.
    pub fn with_bus(config: Config, bus: UiBus) -> AppResult<Self> {
        let config = config.sanitized();
        let runtime = TaskRuntime::new()?;
        let coordinator =
            RequestLifecycleCoordinator::new(bus.clone(), &config.coordinator, runtime.clone());
        let selection = Arc::new(SelectionRegistry::new(bus.clone()));
        let selection_controller = SelectionController::attach(Arc::clone(&selection), &bus);
        let scroll = Arc::new(ScrollHistory::new(config.scroll.history_capacity));
        let matcher = Arc::new(PathMatcher::from_config(&config.routes));
        let dialogs = DialogOrchestrator::new(bus.clone());
        let navigator = Navigator::new(bus.clone());

        tracing::info!(
            routes = matcher.index().len(),
            page_size = config.query.page_size,
            "session ready"
        );
        Ok(Self {
            config,
            bus,
            runtime,
            navigator,
            coordinator,
            selection,
            scroll,
            matcher,
            dialogs,
            _selection_controller: selection_controller,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &UiBus {
        &self.bus
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn coordinator(&self) -> &RequestLifecycleCoordinator {
        &self.coordinator
    }

    pub fn selection(&self) -> &Arc<SelectionRegistry> {
        &self.selection
    }

    pub fn scroll_history(&self) -> &Arc<ScrollHistory> {
        &self.scroll
    }

    pub fn matcher(&self) -> &Arc<PathMatcher> {
        &self.matcher
    }

    pub fn dialogs(&self) -> &DialogOrchestrator {
        &self.dialogs
    }

    pub fn phase_tracker(&self) -> PhaseTracker {
        PhaseTracker::new(self.coordinator.clone())
    }

    pub fn tracked_client(&self, client: Arc<dyn ResourceClient>) -> TrackedClient {
        TrackedClient::new(client, self.coordinator.clone())
    }

    pub fn query_codec(&self, type_map: TypeMap) -> QueryCodec {
        QueryCodec::new(type_map, self.config.query.page_size)
            .with_unknown_fields(self.config.query.unknown_fields)
    }

    pub fn mount<W: NavigationWidget>(&self, widget: W) -> WidgetHandle<W::View> {
        WidgetHost::mount(&self.bus, &self.runtime, widget)
    }

    pub fn mount_directory_listing(
        &self,
        client: Arc<dyn ResourceClient>,
    ) -> (WidgetHandle<ListingView>, Arc<ScrollTracker>) {
        let listing = DirectoryListing::new(
            self.tracked_client(client),
            Arc::clone(&self.matcher),
            Arc::clone(&self.selection),
            Arc::clone(&self.scroll),
            self.query_codec(DirectoryListing::type_map()),
        );
        let tracker = listing.scroll_tracker();
        (self.mount(listing), tracker)
    }
}
