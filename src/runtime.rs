use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult};

/// Where debounce timers and widget tasks run. Reuses the ambient Tokio runtime when
/// there is one and owns a small multi-thread runtime otherwise.
#[derive(Clone)]
pub struct TaskRuntime {
    _owned: Option<Arc<Runtime>>,
    handle: Handle,
}

impl TaskRuntime {
    pub fn new() -> AppResult<Self> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(Self {
                _owned: None,
                handle,
            });
        }

        let runtime = Builder::new_multi_thread()
            .enable_all()
            .worker_threads(2)
            .thread_name("navsync-tasks")
            .build()
            .map_err(|err| AppError::io_with_context(err, "failed to start task runtime"))?;
        let handle = runtime.handle().clone();
        Ok(Self {
            _owned: Some(Arc::new(runtime)),
            handle,
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(task)
    }
}
