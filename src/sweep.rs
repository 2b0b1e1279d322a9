//! Retention Sweeper.
//!
//! Deletes every workspace whose newest modification is older than the
//! retention age. Runs both as a best-effort pre-check before each submit
//! and as a periodic background task. Nothing here is ever fatal: listing
//! and removal failures are logged and counted, then swallowed.

use crate::workspace::WorkspaceStore;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Workspaces inspected.
    pub scanned: usize,
    /// Workspaces deleted by this pass.
    pub removed: usize,
    /// Expired workspaces that had already disappeared.
    pub vanished: usize,
    /// Expired workspaces that could not be deleted.
    pub failed: usize,
}

/// Delete every workspace older than `max_age`.
///
/// "Now" is read once, before enumeration starts, so a workspace allocated
/// while the pass is running is never older than `max_age` and is kept. A
/// modification time in the future counts as age zero.
pub async fn sweep(store: &dyn WorkspaceStore, max_age: Duration) -> SweepReport {
    let started = Instant::now();
    let now = SystemTime::now();
    let mut report = SweepReport::default();

    let mut entries = match store.list().await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Sweep skipped, cannot list '{}': {}", store.root().display(), e);
            return report;
        }
    };

    while let Some(entry) = entries.next().await {
        report.scanned += 1;
        let age = now.duration_since(entry.last_modified).unwrap_or_default();
        if age <= max_age {
            continue;
        }
        match store.remove(&entry.job_id).await {
            Ok(true) => {
                debug!("Swept workspace {} (age {}s)", entry.job_id, age.as_secs());
                report.removed += 1;
            }
            Ok(false) => report.vanished += 1,
            Err(e) => {
                warn!("Failed to sweep workspace {}: {}", entry.job_id, e);
                report.failed += 1;
            }
        }
    }

    if report.removed > 0 || report.failed > 0 {
        info!(
            "Sweep: {} scanned, {} removed, {} failed in {}ms",
            report.scanned,
            report.removed,
            report.failed,
            started.elapsed().as_millis()
        );
    }
    report
}

/// Run [`sweep`] every `interval` on the current Tokio runtime.
///
/// The first pass runs immediately. Abort the returned handle to stop.
pub fn spawn_retention_task(
    store: Arc<dyn WorkspaceStore>,
    max_age: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep(store.as_ref(), max_age).await;
        }
    })
}
