//! Configuration Module
//!
//! Options for constructing a [`Cache`](crate::Cache), loadable from
//! environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::Expiry;
use crate::durable::ArchiveSource;
use crate::error::{CacheError, Result};

/// Store-wide TTL used when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Interval between periodic sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Which scheduler evicts in-memory entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryMode {
    /// Full-table scan on a fixed interval
    #[default]
    Periodic,
    /// One timer armed for the earliest pending deadline
    Precise,
}

/// Storage strategy for the durable tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurableKind {
    /// Transactional engine (redb) with emulated per-entry TTL
    #[default]
    Engine,
    /// One file per key, no TTL unless file sweeping is enabled
    Files,
}

/// Cache construction options.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Expiry applied to writes that don't override it
    pub default_ttl: Expiry,
    /// Durable directory; `None` keeps everything in memory
    pub directory: Option<PathBuf>,
    /// Read-only fallback consulted after the durable tier
    pub archive: Option<ArchiveSource>,
    /// Scheduler for the in-memory table
    pub expiry_mode: ExpiryMode,
    /// Strategy used when `directory` is set
    pub durable_kind: DurableKind,
    /// Periodic sweep interval
    pub sweep_interval: Duration,
    /// Sweep flat files by modification time against `default_ttl`
    pub sweep_files: bool,
}

impl ClientOptions {
    /// Creates options by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `TIERCACHE_TTL_SECS` - Default TTL in seconds, `0` = never expire (default: 1800)
    /// - `TIERCACHE_DIR` - Durable directory (default: none, in-memory)
    /// - `TIERCACHE_ARCHIVE_DIR` - Read-only archive directory (default: none)
    /// - `TIERCACHE_EXPIRY_MODE` - `periodic` or `precise` (default: periodic)
    /// - `TIERCACHE_DURABLE` - `engine` or `files` (default: engine)
    /// - `TIERCACHE_SWEEP_INTERVAL_SECS` - Sweep interval in seconds (default: 30)
    /// - `TIERCACHE_SWEEP_FILES` - `true` to sweep flat files (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: env::var("TIERCACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Expiry::from_secs)
                .unwrap_or(defaults.default_ttl),
            directory: env::var("TIERCACHE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            archive: env::var("TIERCACHE_ARCHIVE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| ArchiveSource::Directory(PathBuf::from(v))),
            expiry_mode: match env::var("TIERCACHE_EXPIRY_MODE").ok().as_deref() {
                Some("precise") => ExpiryMode::Precise,
                Some("periodic") => ExpiryMode::Periodic,
                _ => defaults.expiry_mode,
            },
            durable_kind: match env::var("TIERCACHE_DURABLE").ok().as_deref() {
                Some("files") => DurableKind::Files,
                Some("engine") => DurableKind::Engine,
                _ => defaults.durable_kind,
            },
            sweep_interval: env::var("TIERCACHE_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            sweep_files: env::var("TIERCACHE_SWEEP_FILES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_files),
        }
    }

    /// Sets the default expiry.
    pub fn with_ttl(mut self, ttl: Expiry) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enables the durable tier in `directory`.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Adds a read-only archive tier.
    pub fn with_archive(mut self, archive: ArchiveSource) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Selects the in-memory expiry scheduler.
    pub fn with_expiry_mode(mut self, mode: ExpiryMode) -> Self {
        self.expiry_mode = mode;
        self
    }

    /// Selects the durable storage strategy.
    pub fn with_durable_kind(mut self, kind: DurableKind) -> Self {
        self.durable_kind = kind;
        self
    }

    /// Sets the periodic sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Enables modification-time sweeping of flat files.
    pub fn with_file_sweep(mut self, enabled: bool) -> Self {
        self.sweep_files = enabled;
        self
    }

    // == Validate ==
    /// Rejects option combinations that can't be honored.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        if self.sweep_files && self.durable_kind != DurableKind::Files {
            return Err(CacheError::InvalidConfig(
                "file sweeping requires the flat-file durable tier".to_string(),
            ));
        }
        if self.sweep_files && self.directory.is_none() {
            return Err(CacheError::InvalidConfig(
                "file sweeping requires a durable directory".to_string(),
            ));
        }
        if matches!(&self.directory, Some(dir) if dir.as_os_str().is_empty()) {
            return Err(CacheError::InvalidConfig(
                "durable directory must not be empty; use None for in-memory".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            default_ttl: Expiry::After(DEFAULT_TTL),
            directory: None,
            archive: None,
            expiry_mode: ExpiryMode::Periodic,
            durable_kind: DurableKind::Engine,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            sweep_files: false,
        }
    }
}
