//! Precise Expiry Queue
//!
//! Evicts each in-memory entry at its own deadline with a single timer.
//!
//! Writers push an [`ExpiryRecord`] per write onto an unbounded channel.
//! One task drains the channel into a min-heap ordered by deadline and keeps
//! a single reusable timer armed for the earliest one. With a fixed TTL,
//! records arrive in deadline order and the heap behaves as a FIFO;
//! per-write TTL overrides can arrive out of order, which the heap absorbs.
//!
//! A fired record only triggers a check. The key is removed only if its
//! current entry has itself expired, so a key rewritten after the record was
//! queued survives until its newer record fires.
//!
//! The channel is unbounded: enqueueing never blocks, and there is no
//! backpressure between writers and the eviction loop.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::shutdown_requested;
use crate::cache::{SharedTable, StatsCounters};
use crate::error::{CacheError, Result};

// == Expiry Record ==
/// A pending expiry check for one write of `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryRecord {
    /// Key written
    pub key: String,
    /// When the write happened
    pub enqueued_at: Instant,
    /// When the write expires
    pub deadline: Instant,
}

impl ExpiryRecord {
    /// Creates a record for a write at `enqueued_at`.
    pub fn new(key: impl Into<String>, enqueued_at: Instant, deadline: Instant) -> Self {
        Self {
            key: key.into(),
            enqueued_at,
            deadline,
        }
    }
}

/// Heap slot ordered by deadline, then arrival.
#[derive(Debug, PartialEq, Eq)]
struct Pending {
    deadline: Instant,
    seq: u64,
    key: String,
    enqueued_at: Instant,
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// == Expiry Queue ==
/// Sending half of the precise expiry scheduler.
#[derive(Debug, Clone)]
pub struct ExpiryQueue {
    tx: mpsc::UnboundedSender<ExpiryRecord>,
}

impl ExpiryQueue {
    /// Spawns the eviction loop for `table`.
    ///
    /// # Returns
    /// The queue handle and the JoinHandle of the loop.
    pub fn spawn(
        table: SharedTable,
        stats: Arc<StatsCounters>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(expiry_loop(table, stats, rx, shutdown));
        (Self { tx }, handle)
    }

    /// Queues an expiry check.
    ///
    /// Fails with [`CacheError::QueueClosed`] once the loop has stopped.
    pub fn enqueue(&self, record: ExpiryRecord) -> Result<()> {
        self.tx.send(record).map_err(|_| CacheError::QueueClosed)
    }

}

/// The eviction loop.
async fn expiry_loop(
    table: SharedTable,
    stats: Arc<StatsCounters>,
    mut rx: mpsc::UnboundedReceiver<ExpiryRecord>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Starting precise expiry task");

    let mut pending: BinaryHeap<Reverse<Pending>> = BinaryHeap::new();
    let mut seq: u64 = 0;
    let timer = tokio::time::sleep(std::time::Duration::ZERO);
    tokio::pin!(timer);

    loop {
        let next_deadline = pending.peek().map(|Reverse(head)| head.deadline);
        if let Some(deadline) = next_deadline {
            timer.as_mut().reset(tokio::time::Instant::from_std(deadline));
        }

        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => {
                debug!(abandoned = pending.len(), "Precise expiry received shutdown signal");
                return;
            }
            received = rx.recv() => match received {
                Some(record) => {
                    trace!(key = %record.key, "Queued expiry check");
                    pending.push(Reverse(Pending {
                        deadline: record.deadline,
                        seq,
                        key: record.key,
                        enqueued_at: record.enqueued_at,
                    }));
                    seq = seq.wrapping_add(1);
                }
                None => {
                    debug!("Expiry queue closed by all writers");
                    return;
                }
            },
            _ = &mut timer, if next_deadline.is_some() => {
                let now = Instant::now();
                let mut due = Vec::new();
                while pending.peek().is_some_and(|Reverse(head)| head.deadline <= now) {
                    if let Some(Reverse(head)) = pending.pop() {
                        due.push(head);
                    }
                }

                if *shutdown.borrow() {
                    return;
                }

                let removed = {
                    let mut table = table.write().await;
                    due.iter()
                        .filter(|record| {
                            let evicted = table.remove_if_expired(&record.key, now);
                            if evicted {
                                trace!(
                                    key = %record.key,
                                    age_ms = now.duration_since(record.enqueued_at).as_millis() as u64,
                                    "Evicted expired entry"
                                );
                            }
                            evicted
                        })
                        .count()
                };
                stats.record_evictions(removed);
                debug!(checked = due.len(), removed, "Precise expiry fired");
            }
        }
    }
}
