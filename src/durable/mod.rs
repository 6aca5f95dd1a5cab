//! Durable Tiers
//!
//! Storage that survives restarts, plus the read-only archive fallback.
//!
//! Every record is addressed by [`record_name`], the lowercase hex MD5 of the
//! logical key. Records written by earlier versions stay readable as long as
//! this naming is kept bit-for-bit.

mod archive;
mod engine;
mod files;

use async_trait::async_trait;
use md5::{Digest, Md5};

use crate::cache::Expiry;
use crate::codec::Payload;
use crate::error::Result;

pub use archive::{ArchiveSource, ArchiveTier};
pub use engine::{EngineTier, ENGINE_FILE_NAME};
pub use files::{FileSweep, FileTier};

/// Writable durable storage.
#[async_trait]
pub trait DurableTier: Send + Sync + std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Reads a record. A missing or expired record is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Payload>>;

    /// Writes a record, replacing any previous one.
    async fn set(&self, key: &str, payload: &Payload, expiry: Expiry) -> Result<()>;

    /// Removes a record, returning true if it existed.
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// File-safe identifier for a logical key.
pub fn record_name(key: &str) -> String {
    format!("{:x}", Md5::digest(key.as_bytes()))
}
