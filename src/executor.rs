//! Bounded parallel executor
//!
//! A fixed number of permits gates how many submitted items run at once.
//! Every item is spawned as its own tokio task that waits for a permit before
//! doing any work, and the caller awaits all of them as one barrier.
//!
//! ## Failure policy
//!
//! The first failure observed while waiting is returned to the caller. Items
//! that are still queued or running are **not** cancelled: their tasks stay
//! detached and run to completion in the background. Callers must not assume
//! prompt cancellation.

use crate::error::{Error, Result};
use futures::future::try_join_all;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, trace};

/// Fixed-capacity worker pool with order-preserving fan-out/fan-in
#[derive(Clone, Debug)]
pub struct BoundedExecutor {
    permits: Arc<Semaphore>,
    size: usize,
}

impl BoundedExecutor {
    /// Create an executor that runs at most `size` items concurrently (minimum 1)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Create an executor sized to the machine's available parallelism
    pub fn with_available_parallelism() -> Self {
        Self::new(default_parallelism())
    }

    /// Maximum number of concurrently running items
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `f` over every item and collect the results in input order
    ///
    /// `f` is called on the caller's task to build each future; the futures
    /// themselves run on the runtime, at most [`size`](Self::size) at a time.
    pub async fn map<T, R, F, Fut>(
        &self,
        items: impl IntoIterator<Item = T>,
        f: F,
    ) -> Result<Vec<R>>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Send + 'static,
    {
        let handles: Vec<JoinHandle<Result<R>>> = items
            .into_iter()
            .map(|item| {
                let permits = Arc::clone(&self.permits);
                let work = f(item);
                tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|_| Error::TaskFailed("executor is closed".to_string()))?;
                    work.await
                })
            })
            .collect();

        debug!(items = handles.len(), workers = self.size, "dispatched work items");
        try_join_all(handles.into_iter().map(join_item)).await
    }

    /// Like [`map`](Self::map), for synchronous work that may block
    ///
    /// Each item runs on tokio's blocking pool while holding one permit, so
    /// hashing or in-process parsing never stalls the async workers.
    pub async fn map_blocking<T, R, F>(
        &self,
        items: impl IntoIterator<Item = T>,
        f: F,
    ) -> Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Result<R> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.map(items, move |item| {
            let f = Arc::clone(&f);
            async move {
                tokio::task::spawn_blocking(move || f(item))
                    .await
                    .map_err(task_error)?
            }
        })
        .await
    }

    /// Run `f` over every item for its side effects
    pub async fn for_each<T, F, Fut>(&self, items: impl IntoIterator<Item = T>, f: F) -> Result<()>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.map(items, f).await.map(|_| ())
    }
}

impl Default for BoundedExecutor {
    fn default() -> Self {
        Self::with_available_parallelism()
    }
}

/// Worker count used when nothing else is configured
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
}

async fn join_item<R>(handle: JoinHandle<Result<R>>) -> Result<R> {
    let result = handle.await.map_err(task_error)?;
    if let Err(e) = &result {
        trace!(error = %e, "work item failed");
    }
    result
}

fn task_error(e: JoinError) -> Error {
    if e.is_panic() {
        Error::TaskFailed(format!("work item panicked: {}", e))
    } else {
        Error::TaskFailed(format!("work item was cancelled: {}", e))
    }
}
