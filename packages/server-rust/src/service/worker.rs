//! Background workers.
//!
//! [`BackgroundWorker`] drives a [`BackgroundRunnable`] from an mpsc channel
//! plus a periodic tick. The admin server runs one: the [`ExpirySweeper`],
//! which purges expired cache entries and leases.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::cache::CacheStore;
use crate::lock::LockService;

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// Task handler executed by a [`BackgroundWorker`].
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    type Task: Send + 'static;

    async fn run(&mut self, task: Self::Task);

    /// Called on each tick interval. Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Called once when the worker stops. Default is a no-op.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Spawned task feeding a runnable from a channel and a ticker.
///
/// Ticks that fall behind are delayed rather than bursted.
pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: Option<mpsc::Sender<R::Task>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Spawns the worker. The task channel holds up to 64 pending tasks.
    pub fn start(mut runnable: R, tick: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<R::Task>(64);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    task = rx.recv() => match task {
                        Some(task) => runnable.run(task).await,
                        None => break,
                    },
                    _ = ticker.tick() => runnable.on_tick().await,
                    _ = &mut shutdown_rx => break,
                }
            }

            runnable.shutdown().await;
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Queues a task for the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has been stopped.
    pub async fn submit(&self, task: R::Task) -> anyhow::Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(task)
                .await
                .map_err(|_| anyhow::anyhow!("worker channel closed")),
            None => Err(anyhow::anyhow!("worker not running")),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signals shutdown and waits for the worker task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// ExpirySweeper
// ---------------------------------------------------------------------------

/// On-demand work for the [`ExpirySweeper`].
#[derive(Debug)]
pub enum SweepTask {
    /// Purge now and report what was removed.
    SweepNow {
        reply: Option<oneshot::Sender<SweepReport>>,
    },
}

/// Entries removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub cache_entries: usize,
    pub leases: usize,
}

/// Purges expired cache entries and leases on every tick.
///
/// Expired state is never served either way; sweeping only bounds memory.
pub struct ExpirySweeper {
    cache: Arc<dyn CacheStore>,
    locks: Arc<dyn LockService>,
}

impl ExpirySweeper {
    #[must_use]
    pub fn new(cache: Arc<dyn CacheStore>, locks: Arc<dyn LockService>) -> Self {
        Self { cache, locks }
    }

    fn sweep(&self) -> SweepReport {
        let report = SweepReport {
            cache_entries: self.cache.purge_expired(),
            leases: self.locks.purge_expired(),
        };
        if report != SweepReport::default() {
            tracing::debug!(
                cache_entries = report.cache_entries,
                leases = report.leases,
                "expired state purged"
            );
        }
        report
    }
}

#[async_trait]
impl BackgroundRunnable for ExpirySweeper {
    type Task = SweepTask;

    async fn run(&mut self, task: SweepTask) {
        match task {
            SweepTask::SweepNow { reply } => {
                let report = self.sweep();
                if let Some(reply) = reply {
                    let _ = reply.send(report);
                }
            }
        }
    }

    async fn on_tick(&mut self) {
        self.sweep();
    }

    async fn shutdown(&mut self) {
        tracing::debug!("expiry sweeper stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
