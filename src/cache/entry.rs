//! Cache Entry Module
//!
//! Defines individual cache entries and their expiry policy.

use std::time::{Duration, Instant};

use crate::codec::Payload;

// == Expiry ==
/// How long an entry stays valid.
///
/// "Use the store default" is not a variant: it is the absence of an
/// override in [`SetOptions`], resolved to one of these at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiry {
    /// The entry is never evicted by a scheduler
    Never,
    /// The entry expires this long after it was written
    After(Duration),
}

impl Expiry {
    /// Maps a seconds count to an expiry, treating `0` as [`Expiry::Never`].
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Expiry::Never
        } else {
            Expiry::After(Duration::from_secs(secs))
        }
    }

    /// Returns the TTL, or None for entries that never expire.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Expiry::Never => None,
            Expiry::After(ttl) => Some(*ttl),
        }
    }

    /// Deadline for an entry written at `written_at`.
    pub fn deadline(&self, written_at: Instant) -> Option<Instant> {
        self.ttl().map(|ttl| written_at + ttl)
    }
}

// == Set Options ==
/// Per-write options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Overrides the store default when set
    pub ttl: Option<Expiry>,
}

impl SetOptions {
    /// Writes with an explicit expiry.
    pub fn ttl(ttl: Expiry) -> Self {
        Self { ttl: Some(ttl) }
    }

    /// Writes an entry that never expires.
    pub fn no_expiry() -> Self {
        Self::ttl(Expiry::Never)
    }

    /// Resolves the effective expiry against the store default.
    pub fn effective(&self, default_ttl: Expiry) -> Expiry {
        self.ttl.unwrap_or(default_ttl)
    }
}

// == Cache Entry ==
/// A single in-memory entry with payload and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored payload
    pub payload: Payload,
    /// Time of the last write
    pub inserted_at: Instant,
    /// Effective expiry resolved at write time
    pub expiry: Expiry,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry written now.
    pub fn new(payload: Payload, expiry: Expiry) -> Self {
        Self::written_at(payload, expiry, Instant::now())
    }

    /// Creates an entry with an explicit write time.
    pub fn written_at(payload: Payload, expiry: Expiry, inserted_at: Instant) -> Self {
        Self {
            payload,
            inserted_at,
            expiry,
        }
    }

    /// Returns when this entry expires, or None if it never does.
    pub fn deadline(&self) -> Option<Instant> {
        self.expiry.deadline(self.inserted_at)
    }

    // == Is Expired ==
    /// Checks whether the entry is older than its expiry at `now`.
    ///
    /// An entry is expired once `now` reaches its deadline.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// Checks expiry against the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Returns the remaining TTL, `Some(ZERO)` once expired, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
