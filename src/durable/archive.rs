//! Archive Tier
//!
//! Read-only fallback consulted after the writable durable tier misses.
//! The archive uses the same record naming and format as the flat-file tier,
//! so a snapshot of a durable directory can be shipped as an archive as-is.

use std::collections::HashMap;
use std::path::PathBuf;

use bytes::Bytes;

use super::files::read_record;
use super::record_name;
use crate::codec::Payload;
use crate::error::Result;

// == Archive Source ==
/// Where archived records come from.
#[derive(Debug, Clone)]
pub enum ArchiveSource {
    /// A directory of record files
    Directory(PathBuf),
    /// Records bundled into the program, keyed by record name
    Embedded(HashMap<String, Bytes>),
}

impl ArchiveSource {
    /// Bundles raw record bytes (tag byte + body) under their logical keys.
    ///
    /// Suited to `include_bytes!` assets.
    pub fn from_records<K, R>(records: impl IntoIterator<Item = (K, R)>) -> Self
    where
        K: AsRef<str>,
        R: Into<Bytes>,
    {
        ArchiveSource::Embedded(
            records
                .into_iter()
                .map(|(key, record)| (record_name(key.as_ref()), record.into()))
                .collect(),
        )
    }

    /// Bundles payloads under their logical keys.
    pub fn from_payloads<K: AsRef<str>>(payloads: impl IntoIterator<Item = (K, Payload)>) -> Self {
        Self::from_records(
            payloads
                .into_iter()
                .map(|(key, payload)| (key, payload.to_record())),
        )
    }
}

// == Archive Tier ==
/// Read-only tier; it exposes no write path.
#[derive(Debug, Clone)]
pub struct ArchiveTier {
    source: ArchiveSource,
}

impl ArchiveTier {
    /// Wraps an archive source.
    pub fn new(source: ArchiveSource) -> Self {
        Self { source }
    }

    /// Reads an archived record. A key absent from the archive is `Ok(None)`.
    pub async fn get(&self, key: &str) -> Result<Option<Payload>> {
        let name = record_name(key);
        match &self.source {
            ArchiveSource::Directory(dir) => read_record(&dir.join(name)).await,
            ArchiveSource::Embedded(records) => records
                .get(&name)
                .cloned()
                .map(Payload::from_record)
                .transpose(),
        }
    }
}
