//! Cache Module
//!
//! Provides the layered cache, its in-memory entry table and statistics.

mod client;
mod entry;
mod stats;
mod table;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use client::Cache;
pub use entry::{CacheEntry, Expiry, SetOptions};
pub use stats::{CacheStats, StatsCounters};
pub use table::{EntryTable, SharedTable};
