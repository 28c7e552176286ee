//! Assembles the worker pool and the poller into a running engine.

use std::sync::Arc;
use std::time::Duration;

use linguist_events::ProgressBroadcaster;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::poller::JobPoller;
use crate::pool::WorkerPool;
use crate::processor::Processor;
use crate::store::JobStore;

/// A started pool plus its background poll loop.
pub struct Engine {
    pool: Arc<WorkerPool>,
    cancel: CancellationToken,
    poller: JoinHandle<()>,
}

impl Engine {
    /// Recover orphaned jobs, build the pool and spawn the poller.
    ///
    /// Jobs left `running` by a previous process are cancelled first; no
    /// worker in this process holds them.
    pub async fn start(
        config: &EngineConfig,
        store: Arc<dyn JobStore>,
        processor: Arc<dyn Processor>,
        broadcaster: ProgressBroadcaster,
    ) -> Self {
        match store.cancel_orphaned().await {
            Ok(0) => {}
            Ok(count) => tracing::warn!(count, "Cancelled jobs orphaned by a previous run"),
            Err(e) => tracing::error!(error = %e, "Failed to recover orphaned jobs"),
        }

        let pool = Arc::new(WorkerPool::new(
            config.pool_size,
            Arc::clone(&store),
            processor,
            broadcaster,
        ));
        let poller = JobPoller::new(
            store,
            Arc::clone(&pool),
            config.poll_interval,
            config.max_jobs_per_tick,
        );

        let cancel = CancellationToken::new();
        let poller_cancel = cancel.clone();
        let poller = tokio::spawn(async move {
            poller.run(poller_cancel).await;
        });

        tracing::info!(workers = config.pool_size, "Job engine started");
        Self {
            pool,
            cancel,
            poller,
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Stop polling, then cancel running jobs and wait up to `grace` for
    /// their executors.
    pub async fn shutdown(self, grace: Duration) {
        self.cancel.cancel();
        if let Err(e) = self.poller.await {
            tracing::error!(error = %e, "Job poller task failed");
        }
        self.pool.shutdown(grace).await;
        tracing::info!("Job engine stopped");
    }
}
