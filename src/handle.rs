//! Lifecycle wrappers around the discovery cache's eviction loop.
//!
//! [`DiscoveryHandle`] owns a background task and cancels it when stopped or
//! dropped. [`EvictionService`] leaves the task to an external supervisor that
//! owns the cancellation token. Both run [`DiscoveryCache::run_eviction_loop`].

use std::{ops::Deref, sync::Arc};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{discovery::DiscoveryCache, error::DiscoveryError};

/// A discovery cache with its own eviction task.
///
/// Dropping the handle cancels the task; [`stop`](Self::stop) additionally
/// waits for it to finish.
#[derive(Debug)]
pub struct DiscoveryHandle {
    cache: Arc<DiscoveryCache>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DiscoveryHandle {
    /// Spawns the eviction loop for `cache` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn start(cache: Arc<DiscoveryCache>) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_logged(Arc::clone(&cache), cancel.clone()));
        info!("Discovery cache eviction task started");

        Self {
            cache,
            cancel,
            task: Some(task),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<DiscoveryCache> {
        &self.cache
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancels the eviction task and waits for it to end.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            match task.await {
                Ok(()) => info!("Discovery cache eviction task stopped"),
                Err(e) => error!(error = %e, "Discovery cache eviction task failed"),
            }
        }
    }
}

impl Deref for DiscoveryHandle {
    type Target = DiscoveryCache;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

impl Drop for DiscoveryHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The eviction loop of a discovery cache, to be driven by a task the caller
/// supervises.
#[derive(Debug, Clone)]
pub struct EvictionService {
    cache: Arc<DiscoveryCache>,
}

impl EvictionService {
    #[must_use]
    pub fn new(cache: Arc<DiscoveryCache>) -> Self {
        Self { cache }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<DiscoveryCache> {
        &self.cache
    }

    /// Runs the eviction loop until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Ends with [`DiscoveryError::Cancelled`] on cancellation.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), DiscoveryError> {
        self.cache.run_eviction_loop(cancel).await
    }
}

async fn run_logged(cache: Arc<DiscoveryCache>, cancel: CancellationToken) {
    match cache.run_eviction_loop(cancel).await {
        Ok(()) | Err(DiscoveryError::Cancelled) => debug!("Discovery eviction loop ended"),
        Err(e) => error!(error = %e, "Discovery eviction loop ended unexpectedly"),
    }
}
