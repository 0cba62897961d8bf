//! Typed publish/subscribe channel.
//!
//! Delivery is synchronous: `publish` invokes every handler on the caller's thread, in
//! subscription order, before returning. Handlers run without the registry lock held, so
//! a handler may publish or subscribe again. [`EventBus::publish_deferred`] instead queues
//! an event until the delivery in progress has reached every subscriber.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct BusInner<E> {
    next_id: u64,
    handlers: Vec<(u64, Handler<E>)>,
    depth: usize,
    deferred: VecDeque<E>,
}

impl<E> BusInner<E> {
    fn remove(&mut self, id: u64) {
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
    }
}

pub struct EventBus<E> {
    inner: Arc<Mutex<BusInner<E>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                next_id: 1,
                handlers: Vec::new(),
                depth: 0,
                deferred: VecDeque::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id = inner.next_id.saturating_add(1);
            inner.handlers.push((id, Arc::new(handler)));
            id
        };
        let weak: Weak<Mutex<BusInner<E>>> = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    lock(&inner).remove(id);
                }
            })),
        }
    }

    /// Subscribes a channel instead of a callback, for consumers that drain events from
    /// an async task.
    pub fn listen(&self) -> (Subscription, flume::Receiver<E>)
    where
        E: Clone + Send,
    {
        let (tx, rx) = flume::unbounded();
        let subscription = self.subscribe(move |event: &E| {
            let _ = tx.send(event.clone());
        });
        (subscription, rx)
    }

    pub fn publish(&self, event: E) {
        lock(&self.inner).depth += 1;
        let mut delivery = Delivery {
            inner: &self.inner,
            active: true,
        };
        let mut event = event;
        loop {
            self.deliver(&event);
            let next = {
                let mut inner = lock(&self.inner);
                let next = if inner.depth == 1 {
                    inner.deferred.pop_front()
                } else {
                    None
                };
                if next.is_none() {
                    inner.depth -= 1;
                    delivery.active = false;
                }
                next
            };
            match next {
                Some(next) => event = next,
                None => return,
            }
        }
    }

    /// Publishes after the outermost delivery in progress returns, or right away when
    /// nothing is being delivered.
    pub fn publish_deferred(&self, event: E) {
        {
            let mut inner = lock(&self.inner);
            if inner.depth > 0 {
                inner.deferred.push_back(event);
                return;
            }
        }
        self.publish(event);
    }

    fn deliver(&self, event: &E) {
        let handlers: Vec<Handler<E>> = lock(&self.inner)
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).handlers.len()
    }
}

/// Leaves the delivery depth if a handler unwinds.
struct Delivery<'a, E> {
    inner: &'a Mutex<BusInner<E>>,
    active: bool,
}

impl<E> Drop for Delivery<'_, E> {
    fn drop(&mut self) {
        if self.active {
            lock(self.inner).depth -= 1;
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
