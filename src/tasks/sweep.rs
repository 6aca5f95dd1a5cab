//! Periodic Sweep Task
//!
//! Background task that wakes on a fixed interval and removes expired
//! entries from each of its targets. Worst-case staleness is one interval,
//! whatever the individual TTLs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{shutdown_requested, SweepTarget};
use crate::cache::{SharedTable, StatsCounters};
use crate::error::Result;

// == Memory Sweep ==
/// Sweep target for the in-memory entry table.
#[derive(Debug, Clone)]
pub struct MemorySweep {
    table: SharedTable,
}

impl MemorySweep {
    /// Sweeps `table`.
    pub fn new(table: SharedTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl SweepTarget for MemorySweep {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn sweep(&self) -> Result<usize> {
        let mut table = self.table.write().await;
        Ok(table.cleanup_expired(Instant::now()))
    }
}

/// Spawns a background task that periodically sweeps `targets`.
///
/// Each round sleeps for `interval`, then sweeps every target in order.
/// Shutdown is checked before the sleep ends and again before each target,
/// so nothing is removed once shutdown has been observed. A failing target
/// is logged and retried on the next round.
///
/// # Returns
/// A JoinHandle for the spawned task; it finishes once shutdown is signalled.
pub fn spawn_sweep_task(
    targets: Vec<Arc<dyn SweepTarget>>,
    interval: Duration,
    stats: Arc<StatsCounters>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            targets = targets.len(),
            "Starting periodic sweep task"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    debug!("Periodic sweep received shutdown signal");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            for target in &targets {
                if *shutdown.borrow() {
                    debug!("Periodic sweep stopping mid-round");
                    return;
                }

                match target.sweep().await {
                    Ok(0) => debug!(target = target.name(), "Sweep: no expired entries found"),
                    Ok(removed) => {
                        stats.record_evictions(removed);
                        info!(target = target.name(), removed, "Sweep removed expired entries");
                    }
                    Err(err) => warn!(target = target.name(), error = %err, "Sweep failed"),
                }
            }
        }
    })
}
