//! Flat-File Tier
//!
//! One file per key under the durable directory, named by [`record_name`].
//! Each write goes to its own temp file in the same directory and is renamed
//! over the record, so concurrent writers of one key never share a temp file
//! and readers see either the old or the new record. The tier tracks no TTL
//! of its own; a [`FileSweep`] can be layered on top to evict by modification
//! time.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::{info, trace, warn};

use super::{record_name, DurableTier};
use crate::cache::Expiry;
use crate::codec::Payload;
use crate::error::Result;
use crate::tasks::SweepTarget;

const TEMP_SUFFIX: &str = ".tmp";

// == File Tier ==
/// Durable tier backed by plain files.
#[derive(Debug, Clone)]
pub struct FileTier {
    dir: PathBuf,
}

impl FileTier {
    /// Opens the tier, creating `dir` if needed.
    pub async fn open(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        info!(dir = %dir.display(), "Opened flat-file tier");
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Path of the record for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(record_name(key))
    }

    // == Sweep Older Than ==
    /// Deletes record files last modified at least `ttl` ago.
    ///
    /// Files that can't be inspected or removed are skipped.
    pub async fn sweep_older_than(&self, ttl: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut dir = tokio::fs::read_dir(&self.dir).await?;

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().is_some() {
                continue;
            }
            let modified = match item.metadata().await.and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping unreadable record");
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age < ttl {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!(path = %path.display(), error = %err, "Failed to remove expired record"),
            }
        }
        Ok(removed)
    }
}

/// Reads and parses one record file. A missing file is `Ok(None)`.
pub(super) async fn read_record(path: &Path) -> Result<Option<Payload>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Payload::from_record(bytes).map(Some),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl DurableTier for FileTier {
    fn name(&self) -> &'static str {
        "files"
    }

    async fn get(&self, key: &str) -> Result<Option<Payload>> {
        read_record(&self.path_for(key)).await
    }

    async fn set(&self, key: &str, payload: &Payload, expiry: Expiry) -> Result<()> {
        let path = self.path_for(key);
        let dir = self.dir.clone();
        let record = payload.to_record();

        let target = path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            // Dropped (and removed) on any error before persist.
            let mut temp = tempfile::Builder::new()
                .suffix(TEMP_SUFFIX)
                .tempfile_in(&dir)?;
            temp.write_all(&record)?;
            temp.persist(&target).map_err(|err| err.error)?;
            Ok(())
        })
        .await??;

        trace!(path = %path.display(), ?expiry, "Wrote record file");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

// == File Sweep ==
/// Sweep target evicting record files by modification time.
#[derive(Debug, Clone)]
pub struct FileSweep {
    tier: Arc<FileTier>,
    ttl: Duration,
}

impl FileSweep {
    /// Sweeps `tier`, evicting files older than `ttl`.
    pub fn new(tier: Arc<FileTier>, ttl: Duration) -> Self {
        Self { tier, ttl }
    }
}

#[async_trait]
impl SweepTarget for FileSweep {
    fn name(&self) -> &'static str {
        "files"
    }

    async fn sweep(&self) -> Result<usize> {
        self.tier.sweep_older_than(self.ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_files_roundtrip_uses_hashed_name() {
        let dir = tempdir().unwrap();
        let tier = FileTier::open(dir.path()).await.unwrap();

        tier.set("hello", &Payload::raw("world"), Expiry::Never).await.unwrap();

        let expected = dir.path().join("5d41402abc4b2a76b9719d911017c592");
        assert_eq!(tier.path_for("hello"), expected);
        assert_eq!(std::fs::read(&expected).unwrap(), b"\x00world");
        assert_eq!(tier.get("hello").await.unwrap(), Some(Payload::raw("world")));
    }

    #[tokio::test]
    async fn test_files_missing_is_none() {
        let dir = tempdir().unwrap();
        let tier = FileTier::open(dir.path()).await.unwrap();

        assert_eq!(tier.get("nope").await.unwrap(), None);
        assert!(!tier.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_files_overwrite_not_append() {
        let dir = tempdir().unwrap();
        let tier = FileTier::open(dir.path()).await.unwrap();

        tier.set("k", &Payload::raw("first value"), Expiry::Never).await.unwrap();
        tier.set("k", &Payload::raw("2nd"), Expiry::Never).await.unwrap();

        assert_eq!(tier.get("k").await.unwrap(), Some(Payload::raw("2nd")));
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|item| item.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(record_name("k"))], "no temp files left behind");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_one_key() {
        let dir = tempdir().unwrap();
        let tier = Arc::new(FileTier::open(dir.path()).await.unwrap());
        let values: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 64 * 1024]).collect();

        let mut writers = Vec::new();
        for value in values.clone() {
            let tier = Arc::clone(&tier);
            writers.push(tokio::spawn(async move {
                for _ in 0..20 {
                    tier.set("hot", &Payload::raw(value.clone()), Expiry::Never).await.unwrap();
                }
            }));
        }
        let reader = {
            let tier = Arc::clone(&tier);
            let values = values.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    if let Some(payload) = tier.get("hot").await.unwrap() {
                        assert!(values.iter().any(|v| payload.bytes()[..] == v[..]), "torn record");
                    }
                }
            })
        };

        for writer in writers {
            writer.await.unwrap();
        }
        reader.await.unwrap();

        let last = tier.get("hot").await.unwrap().unwrap();
        assert!(values.iter().any(|v| last.bytes()[..] == v[..]));
    }

    #[tokio::test]
    async fn test_sweep_skips_temp_files() {
        let dir = tempdir().unwrap();
        let tier = FileTier::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join(format!(".tmpabc{TEMP_SUFFIX}")), b"partial").unwrap();

        assert_eq!(tier.sweep_older_than(Duration::ZERO).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_files_truncated_record_is_error() {
        let dir = tempdir().unwrap();
        let tier = FileTier::open(dir.path()).await.unwrap();

        std::fs::write(tier.path_for("broken"), b"").unwrap();
        assert!(matches!(tier.get("broken").await, Err(CacheError::Decode(_))));
    }

    #[tokio::test]
    async fn test_sweep_older_than() {
        let dir = tempdir().unwrap();
        let tier = Arc::new(FileTier::open(dir.path()).await.unwrap());

        tier.set("old", &Payload::raw("v"), Expiry::Never).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        tier.set("fresh", &Payload::raw("v"), Expiry::Never).await.unwrap();

        let sweep = FileSweep::new(Arc::clone(&tier), Duration::from_millis(100));
        assert_eq!(sweep.sweep().await.unwrap(), 1);
        assert_eq!(tier.get("old").await.unwrap(), None);
        assert!(tier.get("fresh").await.unwrap().is_some());
    }
}
