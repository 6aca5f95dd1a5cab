//! Cache Module
//!
//! [`Cache`] composes the in-memory table, the durable tier and the archive
//! into one `get`/`set` surface and owns the background expiry task.
//!
//! Writes go to the durable tier when a directory is configured, otherwise
//! to the in-memory table. Reads consult that writable tier first and the
//! archive only on a miss there, so fresh writes shadow bundled records. The
//! first hit wins, and a hit that fails to decode is returned as an error
//! without consulting later tiers.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::cache::{CacheEntry, CacheStats, EntryTable, Expiry, SetOptions, SharedTable, StatsCounters};
use crate::codec::Payload;
use crate::config::{ClientOptions, DurableKind, ExpiryMode};
use crate::durable::{ArchiveTier, DurableTier, EngineTier, FileSweep, FileTier};
use crate::error::Result;
use crate::tasks::{spawn_sweep_task, ExpiryQueue, ExpiryRecord, MemorySweep, SweepTarget};

// == Cache ==
/// TTL-aware cache holding values of type `V`.
///
/// Share it between tasks with `Arc<Cache<V>>`.
#[derive(Debug)]
pub struct Cache<V> {
    /// In-memory entries (used when no durable tier is configured)
    table: SharedTable,
    /// Hit/miss/eviction counters
    stats: Arc<StatsCounters>,
    /// Expiry for writes without an override
    default_ttl: Expiry,
    /// Writable durable tier
    durable: Option<Arc<dyn DurableTier>>,
    /// Read-only fallback
    archive: Option<ArchiveTier>,
    /// Present in precise expiry mode
    queue: Option<ExpiryQueue>,
    /// Flipped to true to stop the background task
    shutdown: watch::Sender<bool>,
    /// Background task, taken on close
    task: Mutex<Option<JoinHandle<()>>>,
    _value: PhantomData<fn() -> V>,
}

impl<V> Cache<V> {
    // == Open ==
    /// Builds a cache from `options` and starts its expiry task.
    ///
    /// A task is started whenever something can expire: the in-memory table
    /// (periodic sweep or precise queue), the engine tier, or the flat-file
    /// tier with file sweeping enabled.
    pub async fn open(options: ClientOptions) -> Result<Self> {
        options.validate()?;

        let table = EntryTable::shared();
        let stats = Arc::new(StatsCounters::new());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut sweep_targets: Vec<Arc<dyn SweepTarget>> = Vec::new();

        let durable: Option<Arc<dyn DurableTier>> = match &options.directory {
            None => None,
            Some(dir) => match options.durable_kind {
                DurableKind::Engine => {
                    let engine = Arc::new(EngineTier::open(dir).await?);
                    sweep_targets.push(engine.clone());
                    Some(engine)
                }
                DurableKind::Files => {
                    let files = Arc::new(FileTier::open(dir).await?);
                    if options.sweep_files {
                        match options.default_ttl {
                            Expiry::After(ttl) => {
                                sweep_targets.push(Arc::new(FileSweep::new(files.clone(), ttl)));
                            }
                            Expiry::Never => {
                                warn!("File sweeping enabled without a default TTL; files persist")
                            }
                        }
                    }
                    Some(files)
                }
            },
        };

        let mut task = None;
        let mut queue = None;
        if durable.is_none() {
            match options.expiry_mode {
                ExpiryMode::Periodic => sweep_targets.push(Arc::new(MemorySweep::new(table.clone()))),
                ExpiryMode::Precise => {
                    let (expiry_queue, handle) =
                        ExpiryQueue::spawn(table.clone(), stats.clone(), shutdown_rx.clone());
                    queue = Some(expiry_queue);
                    task = Some(handle);
                }
            }
        }
        if !sweep_targets.is_empty() {
            task = Some(spawn_sweep_task(
                sweep_targets,
                options.sweep_interval,
                stats.clone(),
                shutdown_rx,
            ));
        }

        info!(
            durable = durable.as_ref().map(|tier| tier.name()),
            archive = options.archive.is_some(),
            expiry_mode = ?options.expiry_mode,
            default_ttl = ?options.default_ttl,
            "Cache opened"
        );

        Ok(Self {
            table,
            stats,
            default_ttl: options.default_ttl,
            durable,
            archive: options.archive.map(ArchiveTier::new),
            queue,
            shutdown,
            task: Mutex::new(task),
            _value: PhantomData,
        })
    }

    // == Set Raw ==
    /// Stores bytes through the raw fast path.
    ///
    /// They read back through [`Cache::get`] like any encoded value of a
    /// byte-like or string-like `V`.
    pub async fn set_raw(&self, key: &str, bytes: impl Into<Bytes>, options: SetOptions) -> Result<()> {
        self.store(key, Payload::raw(bytes), options).await
    }

    // == Get Raw ==
    /// Returns the stored bytes of the first tier holding `key`.
    pub async fn get_raw(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.lookup(key).await?.map(|payload| payload.bytes().clone()))
    }

    // == Delete ==
    /// Removes `key` from the writable tier, returning true if it existed.
    ///
    /// Archived records can't be removed and keep answering reads.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        match &self.durable {
            Some(durable) => durable.delete(key).await,
            None => Ok(self.table.write().await.remove(key)),
        }
    }

    // == Close ==
    /// Stops the background task and waits for it to finish.
    ///
    /// Calling it again is a no-op. Nothing is flushed to durable storage,
    /// and in-memory entries stay readable until the cache is dropped.
    pub async fn close(&self) -> Result<()> {
        self.shutdown.send_replace(true);
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            handle.await?;
            info!("Cache closed");
        }
        Ok(())
    }

    /// Returns true once [`Cache::close`] has been called.
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len().await)
    }

    // == Length ==
    /// Returns the number of in-memory entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    // == Is Empty ==
    /// Returns true if the in-memory table is empty.
    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }

    async fn store(&self, key: &str, payload: Payload, options: SetOptions) -> Result<()> {
        let expiry = options.effective(self.default_ttl);

        if let Some(durable) = &self.durable {
            return durable.set(key, &payload, expiry).await;
        }

        let now = Instant::now();
        let entry = CacheEntry::written_at(payload, expiry, now);

        // Enqueue under the write lock so the record and the entry land together.
        let mut table = self.table.write().await;
        if let (Some(queue), Some(deadline)) = (&self.queue, entry.deadline()) {
            queue.enqueue(ExpiryRecord::new(key, now, deadline))?;
        }
        table.insert(key.to_string(), entry);
        trace!(key, ?expiry, "Stored in memory");
        Ok(())
    }

    async fn lookup(&self, key: &str) -> Result<Option<Payload>> {
        let writable = match &self.durable {
            Some(durable) => durable.get(key).await?.map(|payload| (durable.name(), payload)),
            None => self
                .table
                .read()
                .await
                .get(key)
                .map(|entry| ("memory", entry.payload.clone())),
        };
        if let Some((tier, payload)) = writable {
            trace!(key, tier, "Cache hit");
            self.stats.record_hit();
            return Ok(Some(payload));
        }

        if let Some(archive) = &self.archive {
            if let Some(payload) = archive.get(key).await? {
                trace!(key, tier = "archive", "Cache hit");
                self.stats.record_hit();
                return Ok(Some(payload));
            }
        }

        debug!(key, "Cache miss");
        self.stats.record_miss();
        Ok(None)
    }
}

impl<V> Cache<V>
where
    V: Serialize + DeserializeOwned,
{
    // == Set ==
    /// Encodes `value` and stores it under `key`.
    ///
    /// If encoding fails, no tier is touched.
    pub async fn set(&self, key: &str, value: &V, options: SetOptions) -> Result<()> {
        let payload = Payload::encode(value)?;
        self.store(key, payload, options).await
    }

    // == Get ==
    /// Retrieves and decodes the value for `key`.
    ///
    /// A key no tier holds is `Ok(None)`; bytes that don't decode as `V`
    /// are an error.
    pub async fn get(&self, key: &str) -> Result<Option<V>> {
        match self.lookup(key).await? {
            Some(payload) => payload.decode().map(Some),
            None => Ok(None),
        }
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
