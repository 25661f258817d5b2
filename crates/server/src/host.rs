//! Host adapter for a worker driven over stdio.
//!
//! There are no client windows to claim and no navigation preload; the only
//! state kept is whether the worker asked to skip waiting, which the install
//! and message tools use to activate immediately.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use swcache_worker::Host;

#[derive(Debug, Default)]
pub struct ProcessHost {
    skip_waiting: AtomicBool,
}

impl ProcessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a pending skip-waiting request.
    pub fn take_skip_waiting(&self) -> bool {
        self.skip_waiting.swap(false, Ordering::SeqCst)
    }
}

#[async_trait]
impl Host for ProcessHost {
    async fn skip_waiting(&self) {
        tracing::debug!("worker requested skip waiting");
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    async fn claim_clients(&self) {
        tracing::debug!("no client views to claim");
    }
}
