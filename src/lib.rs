//! Tiercache - An embedded TTL-aware key/value cache
//!
//! Values live in an in-memory table evicted by a periodic sweep or a
//! precise expiry queue, or in a durable tier (redb or flat files) with an
//! optional read-only archive behind it.

pub mod cache;
pub mod codec;
pub mod config;
pub mod durable;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheStats, Expiry, SetOptions};
pub use codec::Payload;
pub use config::{ClientOptions, DurableKind, ExpiryMode};
pub use durable::ArchiveSource;
pub use error::{CacheError, Result};
