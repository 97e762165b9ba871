//! Periodic sweep of expired replay records and counter buckets.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::schema::GatekeeperConfig;
use crate::config::validation::MAX_DURATION_SECS;
use crate::error::GatekeeperError;
use crate::limiter::RateLimiter;
use crate::observability::metrics;
use crate::replay::ReplayStore;

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub replay_removed: usize,
    pub buckets_removed: usize,
    pub replay_live: usize,
}

/// Sweep period: `housekeeping.sweep_interval_secs`, or the signature TTL when 0.
pub fn sweep_interval(config: &GatekeeperConfig) -> Duration {
    match config.housekeeping.sweep_interval_secs {
        0 => Duration::from_secs(config.signature.sign_expiration_secs),
        secs => Duration::from_secs(secs),
    }
}

#[derive(Clone)]
pub struct Housekeeper {
    replay: Arc<dyn ReplayStore>,
    limiter: RateLimiter,
    interval: Duration,
}

impl Housekeeper {
    pub fn new(replay: Arc<dyn ReplayStore>, limiter: RateLimiter, interval: Duration) -> Self {
        Self {
            replay,
            limiter,
            interval: interval.clamp(
                Duration::from_secs(1),
                Duration::from_secs(MAX_DURATION_SECS),
            ),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sweep once. Backend errors are logged and the sweep continues.
    pub async fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.replay.sweep().await {
            Ok(removed) => report.replay_removed = removed,
            Err(e) => {
                let err = GatekeeperError::from(e);
                tracing::warn!(error = %err, "Replay sweep failed");
            }
        }

        match self.limiter.sweep().await {
            Ok(removed) => report.buckets_removed = removed,
            Err(e) => {
                let err = GatekeeperError::from(e);
                tracing::warn!(error = %err, "Bucket sweep failed");
            }
        }

        if let Ok(stats) = self.replay.stats().await {
            report.replay_live = stats.total;
            metrics::set_replay_records(stats.total);
        }

        if report.replay_removed > 0 || report.buckets_removed > 0 {
            tracing::info!(
                replay_removed = report.replay_removed,
                buckets_removed = report.buckets_removed,
                replay_live = report.replay_live,
                "Housekeeping sweep completed"
            );
        }
        report
    }

    /// Sweep every interval until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Housekeeper starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing has expired yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Housekeeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
