//! Mounting widgets on the navigation bus.

mod listing;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::barrier::{NavigationBarrier, SettleGuard};
use crate::bus::Subscription;
use crate::error::{AppError, AppResult};
use crate::event::{UiBus, UiEvent};
use crate::navigation::NavigationEvent;
use crate::runtime::TaskRuntime;

pub use listing::{DirectoryListing, ListingView};

/// Something that re-derives its state from every navigation.
pub trait NavigationWidget: Send + 'static {
    type View: Clone + Send + Sync + 'static;

    fn name(&self) -> &str;

    /// Called once before the first reaction. Widgets that touch shared state keep the
    /// barrier to stop doing so after unmount.
    fn on_mount(&mut self, _barrier: &NavigationBarrier) {}

    fn react(&mut self, event: Arc<NavigationEvent>) -> BoxFuture<'_, AppResult<Self::View>>;
}

pub struct WidgetHost;

impl WidgetHost {
    /// The bus callback arms the barrier before returning, so a caller that navigates and
    /// then awaits [`WidgetHandle::view_settled`] always waits for this navigation.
    pub fn mount<W: NavigationWidget>(
        bus: &UiBus,
        runtime: &TaskRuntime,
        mut widget: W,
    ) -> WidgetHandle<W::View> {
        let barrier = NavigationBarrier::new(widget.name());
        widget.on_mount(&barrier);
        let (view_tx, view_rx) = watch::channel(None);
        let (event_tx, event_rx) = flume::unbounded::<(Arc<NavigationEvent>, SettleGuard)>();

        let subscription = {
            let barrier = barrier.clone();
            bus.subscribe(move |event: &UiEvent| {
                let Some(navigation) = event.as_navigation() else {
                    return;
                };
                let guard = barrier.arm();
                if event_tx.send((Arc::clone(navigation), guard)).is_err() {
                    tracing::warn!(widget = barrier.name(), "widget task gone; event dropped");
                }
            })
        };
        let task = runtime.spawn(run_widget(widget, event_rx, view_tx, barrier.clone()));

        WidgetHandle {
            barrier,
            view: view_rx,
            subscription: Some(subscription),
            task,
        }
    }
}

async fn run_widget<W: NavigationWidget>(
    mut widget: W,
    events: flume::Receiver<(Arc<NavigationEvent>, SettleGuard)>,
    view: watch::Sender<Option<W::View>>,
    barrier: NavigationBarrier,
) {
    while let Ok((event, guard)) = events.recv_async().await {
        if !barrier.is_attached() {
            tracing::debug!(widget = barrier.name(), "detached; queued events skipped");
            break;
        }
        match widget.react(event).await {
            Ok(next) if barrier.is_attached() => {
                view.send_replace(Some(next));
            }
            Ok(_) => tracing::debug!(widget = barrier.name(), "detached during reaction"),
            Err(err) => tracing::warn!(
                widget = barrier.name(),
                error = %err,
                "widget failed to react to navigation"
            ),
        }
        drop(guard);
    }
}

pub struct WidgetHandle<V> {
    barrier: NavigationBarrier,
    view: watch::Receiver<Option<V>>,
    subscription: Option<Subscription>,
    task: JoinHandle<()>,
}

impl<V> WidgetHandle<V> {
    pub fn barrier(&self) -> &NavigationBarrier {
        &self.barrier
    }

    pub async fn settled(&self) {
        self.barrier.settled().await;
    }

    pub fn is_mounted(&self) -> bool {
        self.barrier.is_attached()
    }

    pub fn unmount(mut self) {
        self.detach();
    }

    /// Stops the reaction task without waiting for queued events.
    pub fn abort(mut self) {
        self.detach();
        self.task.abort();
    }

    fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
            self.barrier.detach();
            tracing::debug!(widget = self.barrier.name(), "widget unmounted");
        }
    }
}

impl<V: Clone> WidgetHandle<V> {
    /// Latest published view, which may predate a navigation still being processed.
    pub fn view(&self) -> Option<V> {
        self.view.borrow().clone()
    }

    /// `Ok(None)` means the widget has not produced a view yet, e.g. every reaction so far
    /// failed.
    pub async fn view_settled(&self) -> AppResult<Option<V>> {
        self.barrier.settled().await;
        if !self.barrier.is_attached() {
            return Err(AppError::detached(self.barrier.name()));
        }
        Ok(self.view.borrow().clone())
    }
}

impl<V> Drop for WidgetHandle<V> {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::future::BoxFuture;

    use super::{NavigationWidget, WidgetHost};
    use crate::error::{AppError, AppResult};
    use crate::event::UiBus;
    use crate::navigation::{NavigationEvent, Navigator};
    use crate::runtime::TaskRuntime;

    struct SlowEcho {
        delay: Duration,
        reactions: Arc<AtomicUsize>,
    }

    fn echo(delay_ms: u64) -> SlowEcho {
        SlowEcho {
            delay: Duration::from_millis(delay_ms),
            reactions: Arc::default(),
        }
    }

    impl NavigationWidget for SlowEcho {
        type View = String;

        fn name(&self) -> &str {
            "echo"
        }

        fn react(&mut self, event: Arc<NavigationEvent>) -> BoxFuture<'_, AppResult<String>> {
            let delay = self.delay;
            self.reactions.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                if event.location.pathname == "/broken" {
                    return Err(AppError::invalid_argument("broken"));
                }
                Ok(event.location.pathname.clone())
            })
        }
    }

    fn runtime() -> TaskRuntime {
        TaskRuntime::new().expect("runtime should initialize")
    }

    #[tokio::test(start_paused = true)]
    async fn view_settled_reflects_latest_navigation() {
        let bus = UiBus::new();
        let navigator = Navigator::new(bus.clone());
        let widget = WidgetHost::mount(&bus, &runtime(), echo(40));

        navigator.navigate("/directory/a").expect("navigation should succeed");
        navigator.navigate("/directory/b").expect("navigation should succeed");
        assert_eq!(widget.view(), None);

        let view = widget.view_settled().await.expect("widget should be mounted");
        assert_eq!(view.as_deref(), Some("/directory/b"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reaction_still_settles_and_keeps_previous_view() {
        let bus = UiBus::new();
        let navigator = Navigator::new(bus.clone());
        let widget = WidgetHost::mount(&bus, &runtime(), echo(5));

        navigator.navigate("/file/x").expect("navigation should succeed");
        navigator.navigate("/broken").expect("navigation should succeed");
        let view = widget.view_settled().await.expect("widget should be mounted");
        assert_eq!(view.as_deref(), Some("/file/x"));
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_mid_reaction_publishes_nothing() {
        let bus = UiBus::new();
        let navigator = Navigator::new(bus.clone());
        let widget = WidgetHost::mount(&bus, &runtime(), echo(50));
        let barrier = widget.barrier().clone();

        navigator.navigate("/directory/a").expect("navigation should succeed");
        assert_eq!(bus.subscriber_count(), 1);
        widget.unmount();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(!barrier.is_attached());

        tokio::time::sleep(Duration::from_millis(100)).await;
        barrier.settled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn view_settled_after_unmount_reports_detached() {
        let bus = UiBus::new();
        let widget = WidgetHost::mount(&bus, &runtime(), echo(0));
        widget.barrier().detach();
        assert!(matches!(
            widget.view_settled().await,
            Err(AppError::Detached(name)) if name == "echo"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn events_queued_before_unmount_are_never_reacted_to() {
        let bus = UiBus::new();
        let navigator = Navigator::new(bus.clone());
        let widget = echo(30);
        let reactions = Arc::clone(&widget.reactions);
        let handle = WidgetHost::mount(&bus, &runtime(), widget);

        navigator.navigate("/directory/a").expect("navigation should succeed");
        handle.settled().await;
        assert_eq!(reactions.load(Ordering::SeqCst), 1);

        navigator.navigate("/directory/b").expect("navigation should succeed");
        navigator.navigate("/directory/c").expect("navigation should succeed");
        let barrier = handle.barrier().clone();
        handle.unmount();

        tokio::time::sleep(Duration::from_millis(200)).await;
        barrier.settled().await;
        assert_eq!(reactions.load(Ordering::SeqCst), 1);
    }
}
