//! Background loops.
//!
//! Two timers run for the life of the daemon: the configuration
//! refresh, which re-fetches the hosted documents and swaps the shared
//! snapshot, and the reconciliation pass, which joins closed proposals
//! back onto the board. Both loops absorb failures and proceed on the
//! next tick; neither ever takes the daemon down.

use std::sync::Arc;
use std::time::Duration;

use steward_core::AppContext;
use steward_core::config::ConfigHandle;
use steward_core::reconcile;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::config_source::HttpConfigSource;

/// Spawns the configuration refresh loop.
///
/// On a failed refresh the previous snapshot stays in place; handlers
/// keep running on the last good configuration.
pub fn spawn_config_refresh(
    source: HttpConfigSource,
    config: Arc<ConfigHandle>,
    refresh_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(refresh_secs);
        // The initial snapshot was loaded at startup; first refresh
        // waits a full period.
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match source.load().await {
                Ok(snapshot) => {
                    config.replace(snapshot);
                    info!("configuration snapshot refreshed");
                },
                Err(error) => {
                    warn!(%error, "configuration refresh failed, keeping previous snapshot");
                },
            }
        }
    })
}

/// Spawns the reconciliation loop.
pub fn spawn_reconcile_loop(ctx: AppContext, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match reconcile::run_once(&ctx).await {
                Ok(report) => {
                    if report.written > 0 || report.failed > 0 {
                        info!(
                            scanned = report.scanned,
                            closed = report.closed,
                            written = report.written,
                            skipped = report.skipped,
                            failed = report.failed,
                            "reconciliation pass complete"
                        );
                    }
                },
                Err(error) => {
                    warn!(%error, "reconciliation pass failed");
                },
            }
        }
    })
}
