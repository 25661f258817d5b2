//! Tracked fire-and-forget work.
//!
//! Revalidation writes and eviction run detached from the request that
//! started them. They are spawned here so a host (or a test) can wait for
//! the cache to settle.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::task::JoinSet;

/// Set of detached tasks that can be drained with [`settle`](Self::settle).
#[derive(Default)]
pub struct BackgroundTasks {
    set: Mutex<JoinSet<()>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` onto the current runtime.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        while set.try_join_next().is_some() {}
        set.spawn(task);
    }

    /// Tasks spawned and not yet reaped.
    pub fn pending(&self) -> usize {
        self.set.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Wait until every spawned task, including ones spawned meanwhile, has finished.
    pub async fn settle(&self) {
        loop {
            let mut drained = std::mem::take(&mut *self.set.lock().unwrap_or_else(PoisonError::into_inner));
            if drained.is_empty() {
                return;
            }
            while let Some(result) = drained.join_next().await {
                if let Err(err) = result {
                    tracing::warn!(error = %err, "background cache task failed");
                }
            }
        }
    }
}

impl std::fmt::Debug for BackgroundTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTasks").field("pending", &self.pending()).finish()
    }
}
