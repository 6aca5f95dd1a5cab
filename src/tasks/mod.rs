//! Background Tasks Module
//!
//! Expiry schedulers owned by a [`Cache`](crate::Cache).
//!
//! # Tasks
//! - Periodic sweep: scans every [`SweepTarget`] on a fixed interval
//! - Precise expiry queue: one timer armed for the earliest pending deadline
//!
//! Both stop when the shutdown channel flips to `true` or its sender is dropped.

mod expiry_queue;
mod sweep;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;

pub use expiry_queue::{ExpiryQueue, ExpiryRecord};
pub use sweep::{spawn_sweep_task, MemorySweep};

/// Something the periodic sweep can evict expired entries from.
#[async_trait]
pub trait SweepTarget: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Removes expired entries, returning how many were removed.
    async fn sweep(&self) -> Result<usize>;
}

/// Resolves once shutdown has been requested or the sender is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
