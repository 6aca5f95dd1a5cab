//! Engine Tier
//!
//! Durable storage on redb. One write transaction per `set`/`delete`, one
//! read transaction per `get`. redb has no native TTL, so each row carries
//! its deadline in Unix milliseconds (`0` = never) and the periodic sweep
//! purges rows past it. Expired rows that haven't been purged yet read as
//! absent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition, TableError};
use tracing::{debug, info, trace};

use super::{record_name, DurableTier};
use crate::cache::Expiry;
use crate::codec::Payload;
use crate::error::{CacheError, Result};
use crate::tasks::SweepTarget;

/// Database file created inside the durable directory.
pub const ENGINE_FILE_NAME: &str = "cache.redb";

/// record name -> (deadline in Unix ms, record bytes)
const RECORDS: TableDefinition<&str, (u64, &[u8])> = TableDefinition::new("records");

const NO_DEADLINE: u64 = 0;

// == Engine Tier ==
/// Transactional durable tier.
#[derive(Clone)]
pub struct EngineTier {
    db: Arc<Database>,
    path: PathBuf,
}

impl std::fmt::Debug for EngineTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineTier").field("path", &self.path).finish()
    }
}

impl EngineTier {
    /// Opens (or creates) the engine database inside `dir`.
    pub async fn open(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(ENGINE_FILE_NAME);

        let db_path = path.clone();
        let db = tokio::task::spawn_blocking(move || Database::create(db_path))
            .await?
            .map_err(CacheError::storage)?;

        info!(path = %path.display(), "Opened engine tier");
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    // == Purge Expired ==
    /// Deletes every row whose deadline has passed.
    ///
    /// Returns the number of rows removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || -> Result<usize> {
            let now = now_ms();
            let txn = db.begin_write().map_err(CacheError::storage)?;
            let removed = {
                let mut table = txn.open_table(RECORDS).map_err(CacheError::storage)?;

                let mut expired = Vec::new();
                for row in table.iter().map_err(CacheError::storage)? {
                    let (name, value) = row.map_err(CacheError::storage)?;
                    let (deadline, _) = value.value();
                    if is_past(deadline, now) {
                        expired.push(name.value().to_string());
                    }
                }

                for name in &expired {
                    table.remove(name.as_str()).map_err(CacheError::storage)?;
                }
                expired.len()
            };
            txn.commit().map_err(CacheError::storage)?;
            Ok(removed)
        })
        .await?
    }
}

#[async_trait]
impl DurableTier for EngineTier {
    fn name(&self) -> &'static str {
        "engine"
    }

    async fn get(&self, key: &str) -> Result<Option<Payload>> {
        let db = Arc::clone(&self.db);
        let name = record_name(key);

        tokio::task::spawn_blocking(move || -> Result<Option<Payload>> {
            let txn = db.begin_read().map_err(CacheError::storage)?;
            let table = match txn.open_table(RECORDS) {
                Ok(table) => table,
                // Nothing has been written yet
                Err(TableError::TableDoesNotExist(_)) => return Ok(None),
                Err(err) => return Err(CacheError::storage(err)),
            };

            let Some(row) = table.get(name.as_str()).map_err(CacheError::storage)? else {
                return Ok(None);
            };
            let (deadline, record) = row.value();
            if is_past(deadline, now_ms()) {
                trace!(record = %name, "Engine row expired, awaiting purge");
                return Ok(None);
            }
            Payload::from_record(record.to_vec()).map(Some)
        })
        .await?
    }

    async fn set(&self, key: &str, payload: &Payload, expiry: Expiry) -> Result<()> {
        let db = Arc::clone(&self.db);
        let name = record_name(key);
        let record = payload.to_record();
        let deadline = deadline_ms(expiry);

        tokio::task::spawn_blocking(move || -> Result<()> {
            let txn = db.begin_write().map_err(CacheError::storage)?;
            {
                let mut table = txn.open_table(RECORDS).map_err(CacheError::storage)?;
                table
                    .insert(name.as_str(), (deadline, record.as_slice()))
                    .map_err(CacheError::storage)?;
            }
            txn.commit().map_err(CacheError::storage)?;
            Ok(())
        })
        .await?
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let name = record_name(key);

        tokio::task::spawn_blocking(move || -> Result<bool> {
            let txn = db.begin_write().map_err(CacheError::storage)?;
            let existed = {
                let mut table = txn.open_table(RECORDS).map_err(CacheError::storage)?;
                let removed = table.remove(name.as_str()).map_err(CacheError::storage)?;
                removed.is_some()
            };
            txn.commit().map_err(CacheError::storage)?;
            Ok(existed)
        })
        .await?
    }
}

#[async_trait]
impl SweepTarget for EngineTier {
    fn name(&self) -> &'static str {
        "engine"
    }

    async fn sweep(&self) -> Result<usize> {
        let removed = self.purge_expired().await?;
        debug!(removed, "Purged expired engine rows");
        Ok(removed)
    }
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

fn deadline_ms(expiry: Expiry) -> u64 {
    match expiry {
        Expiry::Never => NO_DEADLINE,
        Expiry::After(ttl) => {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            now_ms().saturating_add(ttl_ms).max(1)
        }
    }
}

fn is_past(deadline: u64, now: u64) -> bool {
    deadline != NO_DEADLINE && now >= deadline
}
