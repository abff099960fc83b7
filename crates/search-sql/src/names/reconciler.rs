//! Background reconciliation of staged directory candidates.
//!
//! Used with [`ReconcileMode::Deferred`](crate::config::ReconcileMode), where
//! lookups only stage ids and the cache is republished on a timer.
//!
//! # Example
//!
//! ```ignore
//! let mut reconciler = CandidateReconciler::from_config(&config);
//! let handle = reconciler.start(directory.clone());
//! // ...
//! reconciler.stop().await;
//! handle.await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SearchSqlConfig;

use super::Reconcile;

/// Periodically calls [`Reconcile::reconcile`] on a directory.
#[derive(Debug)]
pub struct CandidateReconciler {
    interval: Duration,

    /// Number of completed reconcile passes.
    passes: Arc<AtomicU64>,

    /// Shutdown channel.
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl CandidateReconciler {
    /// Creates a reconciler that runs every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            passes: Arc::new(AtomicU64::new(0)),
            shutdown_tx: None,
        }
    }

    /// Creates a reconciler running every `reconcile_interval_ms` of `config`.
    pub fn from_config(config: &SearchSqlConfig) -> Self {
        Self::new(config.reconcile_interval())
    }

    /// The interval between passes.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts the background loop.
    pub fn start<D: Reconcile>(&mut self, directory: Arc<D>) -> tokio::task::JoinHandle<()> {
        let (tx, rx) = mpsc::channel(1);
        self.shutdown_tx = Some(tx);

        let interval = self.interval;
        let passes = self.passes.clone();
        info!(interval_ms = interval.as_millis() as u64, "Starting candidate reconciler");

        tokio::spawn(async move {
            Self::reconcile_loop(rx, directory, interval, passes).await;
        })
    }

    /// Stops the background loop.
    ///
    /// The loop runs one last pass before exiting so no staged candidate is lost.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).await.is_err() {
                warn!("Candidate reconciler exited before shutdown was requested");
            }
        }
    }

    /// Returns true while the loop has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Number of reconcile passes completed so far.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    async fn reconcile_loop<D: Reconcile>(
        mut shutdown_rx: mpsc::Receiver<()>,
        directory: Arc<D>,
        interval: Duration,
        passes: Arc<AtomicU64>,
    ) {
        let mut interval = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    directory.reconcile();
                    passes.fetch_add(1, Ordering::Relaxed);
                    info!("Candidate reconciler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let merged = directory.reconcile();
                    passes.fetch_add(1, Ordering::Relaxed);
                    if merged > 0 {
                        debug!(merged, "Background reconcile published candidates");
                    }
                }
            }
        }
    }
}
