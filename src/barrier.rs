//! Per-widget settle handle for "has this widget finished reacting to the last
//! navigation".
//!
//! Each delivered navigation arms a new generation. Awaiting [`NavigationBarrier::settled`]
//! waits for the generation that was current when it was called, so a caller never reads
//! state derived from an earlier location.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BarrierState {
    armed: u64,
    settled: u64,
    detached: bool,
}

#[derive(Debug, Clone)]
pub struct NavigationBarrier {
    name: Arc<str>,
    state: Arc<watch::Sender<BarrierState>>,
}

impl NavigationBarrier {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        let (state, _) = watch::channel(BarrierState::default());
        Self {
            name: name.into(),
            state: Arc::new(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Must be called synchronously when the event is delivered, before any await.
    pub fn arm(&self) -> SettleGuard {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.armed += 1;
            generation = state.armed;
        });
        SettleGuard {
            state: Arc::clone(&self.state),
            generation,
            settled: false,
        }
    }

    /// Resolves immediately when nothing is armed or the barrier is detached.
    pub fn settled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.state.subscribe();
        let target = rx.borrow().armed;
        async move {
            let _ = rx
                .wait_for(|state| state.detached || state.settled >= target)
                .await;
        }
    }

    pub fn is_settled(&self) -> bool {
        let state = self.state.borrow();
        state.detached || state.settled >= state.armed
    }

    pub fn generation(&self) -> u64 {
        self.state.borrow().armed
    }

    /// Releases every waiter. Reactions still running must not publish after this.
    pub fn detach(&self) {
        self.state.send_modify(|state| state.detached = true);
    }

    pub fn is_attached(&self) -> bool {
        !self.state.borrow().detached
    }
}

/// Settles its generation when dropped, including on error or unwind.
#[derive(Debug)]
#[must_use = "dropping the guard settles the barrier immediately"]
pub struct SettleGuard {
    state: Arc<watch::Sender<BarrierState>>,
    generation: u64,
    settled: bool,
}

impl SettleGuard {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn settle(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.settled {
            return;
        }
        self.settled = true;
        let generation = self.generation;
        self.state.send_if_modified(|state| {
            if state.settled >= generation {
                return false;
            }
            state.settled = generation;
            true
        });
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use super::NavigationBarrier;

    #[tokio::test]
    async fn settled_resolves_immediately_when_idle() {
        let barrier = NavigationBarrier::new("listing");
        assert!(barrier.is_settled());
        timeout(Duration::from_millis(10), barrier.settled())
            .await
            .expect("idle barrier should be settled");
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_sees_the_generation_armed_when_it_asked() {
        let barrier = NavigationBarrier::new("listing");
        let first = barrier.arm();
        let waiter = tokio::spawn(barrier.settled());

        let second = barrier.arm();
        assert_eq!(second.generation(), 2);
        let late_waiter = tokio::spawn(barrier.settled());

        first.settle();
        waiter.await.expect("first waiter should finish");
        assert!(!late_waiter.is_finished());

        sleep(Duration::from_millis(5)).await;
        drop(second);
        late_waiter.await.expect("second waiter should finish");
        assert!(barrier.is_settled());
    }

    #[tokio::test]
    async fn guard_settles_on_panic() {
        let barrier = NavigationBarrier::new("listing");
        let guard = barrier.arm();
        let task = tokio::spawn(async move {
            let _guard = guard;
            panic!("widget reaction failed");
        });
        assert!(task.await.is_err());
        assert!(barrier.is_settled());
    }

    #[tokio::test]
    async fn detach_releases_waiters() {
        let barrier = NavigationBarrier::new("listing");
        let guard = barrier.arm();
        let waiter = tokio::spawn(barrier.settled());
        barrier.detach();
        waiter.await.expect("detached barrier should release waiters");
        assert!(!barrier.is_attached());
        drop(guard);
    }
}
