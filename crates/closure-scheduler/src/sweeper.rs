//! Closure Sweep Implementation

use alerting::{
    auto_close, Alert, AlertKey, AlertStatusStore, ClosureError, ClosureOutcome, Decision,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use storage::{Repository, StorageError};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Configuration for the closure sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Seconds between sweeps (default: 60)
    pub interval_secs: u64,
    /// Sweep immediately at startup instead of after the first interval
    pub run_on_start: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            run_on_start: true,
        }
    }
}

impl SweepConfig {
    /// Interval between sweeps, never shorter than one second
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Store operations the sweep needs beyond the status write
pub trait SweepStore: AlertStatusStore + Send + Sync + 'static {
    /// Open alerts with at least one participation
    fn closure_candidates(&self) -> Result<Vec<Alert>, StorageError>;

    /// Flush state after closures; `None` when nothing backs the store
    fn persist(&self) -> impl Future<Output = Result<Option<usize>, StorageError>> + Send;
}

impl SweepStore for Repository {
    fn closure_candidates(&self) -> Result<Vec<Alert>, StorageError> {
        Repository::closure_candidates(self)
    }

    async fn persist(&self) -> Result<Option<usize>, StorageError> {
        Repository::persist(self).await
    }
}

/// Summary of one sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub evaluated: usize,
    pub closed: usize,
    pub too_early: usize,
    pub insufficient_negatives: usize,
    pub failed: usize,
    /// Keys of the alerts closed in this sweep
    pub closed_alerts: Vec<AlertKey>,
    /// Set when closures were made but the store could not be flushed
    pub persist_error: Option<String>,
}

impl SweepReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            evaluated: 0,
            closed: 0,
            too_early: 0,
            insufficient_negatives: 0,
            failed: 0,
            closed_alerts: Vec::new(),
            persist_error: None,
        }
    }

    fn record(&mut self, key: AlertKey, result: Result<ClosureOutcome, ClosureError>) {
        self.evaluated += 1;

        match result {
            Ok(outcome) => match outcome.decision {
                Decision::Close(_) => {
                    self.closed += 1;
                    self.closed_alerts.push(key);
                }
                Decision::TooEarly { .. } => self.too_early += 1,
                Decision::InsufficientNegatives(_) => self.insufficient_negatives += 1,
            },
            Err(ClosureError::NotFound(missing)) => {
                self.failed += 1;
                warn!("Alert {} vanished before it could be closed", missing);
            }
            Err(e) => {
                self.failed += 1;
                warn!("Alert {} could not be closed: {}", key, e);
            }
        }
    }
}

/// Runs the auto-close policy over every closure candidate
pub struct ClosureSweeper<S: SweepStore> {
    store: Arc<S>,
    config: SweepConfig,
    report_tx: watch::Sender<Option<SweepReport>>,
}

impl<S: SweepStore> ClosureSweeper<S> {
    /// Create a new sweeper over `store`
    pub fn new(store: Arc<S>, config: SweepConfig) -> Self {
        let (report_tx, _) = watch::channel(None);
        info!("Closure sweeper created, interval {}s", config.interval().as_secs());
        Self {
            store,
            config,
            report_tx,
        }
    }

    /// Receive the latest report after every sweep
    pub fn subscribe(&self) -> watch::Receiver<Option<SweepReport>> {
        self.report_tx.subscribe()
    }

    /// Evaluate each candidate once at `now`.
    ///
    /// A failed alert is logged and counted; the sweep moves on and the
    /// alert is picked up again on the next sweep if it is still open.
    ///
    /// Closures are flushed once at the end; a failed flush is recorded in
    /// [`SweepReport::persist_error`].
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport, StorageError> {
        let candidates = self.store.closure_candidates()?;
        let mut report = SweepReport::new(now);

        debug!("Sweeping {} closure candidates", candidates.len());

        for alert in &candidates {
            report.record(alert.key(), auto_close(self.store.as_ref(), alert, now));
        }

        if report.closed > 0 {
            match self.store.persist().await {
                Ok(Some(n)) => debug!("Persisted {} alerts after sweep", n),
                Ok(None) => {}
                Err(e) => {
                    error!("{} alerts closed but not persisted: {}", report.closed, e);
                    report.persist_error = Some(e.to_string());
                }
            }
        }

        info!(
            "Sweep done: {} evaluated, {} closed, {} too early, {} kept open, {} failed",
            report.evaluated,
            report.closed,
            report.too_early,
            report.insufficient_negatives,
            report.failed
        );

        Ok(report)
    }

    async fn sweep_and_publish(&self) {
        match self.sweep_once(Utc::now()).await {
            Ok(report) => {
                self.report_tx.send_replace(Some(report));
            }
            Err(e) => warn!("Sweep aborted, could not list candidates: {}", e),
        }
    }

    /// Sweep on every tick until `shutdown` turns true or its sender drops
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.interval();
        let start = if self.config.run_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };

        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Starting closure sweeper");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep_and_publish().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Closure sweeper stopped");
    }
}
