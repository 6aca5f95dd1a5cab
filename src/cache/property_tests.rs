//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check storage properties across tiers and value types.

use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{Cache, SetOptions};
use crate::codec::Payload;
use crate::config::{ClientOptions, DurableKind};

// == Strategies ==
/// Generates cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:/]{1,64}".prop_map(|s| s)
}

/// Generates string values
fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,256}".prop_map(|s| s)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Record {
    id: u64,
    label: String,
    tags: Vec<String>,
    score: Option<i32>,
}

fn record_strategy() -> impl Strategy<Value = Record> {
    (
        any::<u64>(),
        valid_value_strategy(),
        prop::collection::vec("[a-z]{1,8}", 0..5),
        any::<Option<i32>>(),
    )
        .prop_map(|(id, label, tags, score)| Record {
            id,
            label,
            tags,
            score,
        })
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    SetRaw { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::SetRaw { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Round-trip: a stored struct comes back decode-equal from memory.
    #[test]
    fn prop_roundtrip_memory(key in valid_key_strategy(), record in record_strategy()) {
        tokio_test::block_on(async {
            let cache = Cache::<Record>::open(ClientOptions::default()).await.unwrap();

            cache.set(&key, &record, SetOptions::default()).await.unwrap();
            let retrieved = cache.get(&key).await.unwrap();

            prop_assert_eq!(retrieved, Some(record));
            Ok(())
        })?;
    }

    // Overwrite: the second value wins and only one entry exists.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy()
    ) {
        tokio_test::block_on(async {
            let cache = Cache::<String>::open(ClientOptions::default()).await.unwrap();

            cache.set(&key, &value1, SetOptions::default()).await.unwrap();
            cache.set_raw(&key, value2.clone(), SetOptions::default()).await.unwrap();

            prop_assert_eq!(cache.get(&key).await.unwrap(), Some(value2));
            prop_assert_eq!(cache.len().await, 1);
            Ok(())
        })?;
    }

    // Decoding doesn't depend on which write path produced the bytes.
    #[test]
    fn prop_raw_and_encoded_symmetry(value in any::<String>(), bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let raw: String = Payload::raw(value.clone()).decode().unwrap();
        let encoded: String = Payload::encode(&value).unwrap().decode().unwrap();
        prop_assert_eq!(&raw, &encoded);
        prop_assert_eq!(raw, value);

        let raw_bytes: Vec<u8> = Payload::raw(bytes.clone()).decode().unwrap();
        let encoded_bytes: Vec<u8> = Payload::encode(&bytes).unwrap().decode().unwrap();
        prop_assert_eq!(&raw_bytes, &encoded_bytes);
        prop_assert_eq!(raw_bytes, bytes);
    }

    // The durable record format reproduces the payload exactly.
    #[test]
    fn prop_record_format_preserves_payload(bytes in prop::collection::vec(any::<u8>(), 0..128), raw in any::<bool>()) {
        let payload = if raw {
            Payload::raw(bytes)
        } else {
            Payload::Encoded(bytes.into())
        };
        prop_assert_eq!(Payload::from_record(payload.to_record()).unwrap(), payload);
    }
}

// Durable tiers touch the filesystem; fewer cases.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // Round-trip through both durable strategies.
    #[test]
    fn prop_roundtrip_durable(
        entries in prop::collection::hash_map(valid_key_strategy(), record_strategy(), 1..8),
        files in any::<bool>()
    ) {
        let dir = tempfile::tempdir().unwrap();
        let kind = if files { DurableKind::Files } else { DurableKind::Engine };

        tokio_test::block_on(async {
            let options = ClientOptions::default()
                .with_directory(dir.path())
                .with_durable_kind(kind);
            let cache = Cache::<Record>::open(options).await.unwrap();

            for (key, record) in &entries {
                cache.set(key, record, SetOptions::default()).await.unwrap();
            }
            for (key, record) in &entries {
                let got = cache.get(key).await.unwrap();
                prop_assert_eq!(got.as_ref(), Some(record));
            }
            cache.close().await.unwrap();
            Ok(())
        })?;
    }
}

// == Property Test for Concurrent Operation Correctness ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Concurrent reads return either an old or a new complete value.
    #[test]
    fn prop_concurrent_operation_correctness(
        initial_entries in prop::collection::vec(
            (valid_key_strategy(), valid_value_strategy()),
            1..20
        ),
        operations in prop::collection::vec(cache_op_strategy(), 10..50)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let cache = Arc::new(Cache::<String>::open(ClientOptions::default()).await.unwrap());

            for (key, value) in &initial_entries {
                cache.set(key, value, SetOptions::default()).await.unwrap();
            }

            // Every value ever written per key; a read must match one of them.
            let mut written: HashMap<String, Vec<String>> = HashMap::new();
            for (key, value) in &initial_entries {
                written.entry(key.clone()).or_default().push(value.clone());
            }
            for op in &operations {
                if let CacheOp::Set { key, value } | CacheOp::SetRaw { key, value } = op {
                    written.entry(key.clone()).or_default().push(value.clone());
                }
            }
            let written = Arc::new(written);

            let mut handles = vec![];
            for op in operations {
                let cache = Arc::clone(&cache);
                let written = Arc::clone(&written);

                handles.push(tokio::spawn(async move {
                    match op {
                        CacheOp::Set { key, value } => {
                            cache.set(&key, &value, SetOptions::default()).await.map_err(|e| e.to_string())
                        }
                        CacheOp::SetRaw { key, value } => {
                            cache.set_raw(&key, value, SetOptions::default()).await.map_err(|e| e.to_string())
                        }
                        CacheOp::Get { key } => match cache.get(&key).await {
                            Ok(Some(value)) => {
                                let known = written.get(&key).map(|vals| vals.contains(&value)).unwrap_or(false);
                                if known {
                                    Ok(())
                                } else {
                                    Err(format!("Torn or unknown value for key '{}': {:?}", key, value))
                                }
                            }
                            Ok(None) => Ok(()),
                            Err(err) => Err(err.to_string()),
                        },
                        CacheOp::Delete { key } => cache.delete(&key).await.map(|_| ()).map_err(|e| e.to_string()),
                    }
                }));
            }

            for handle in handles {
                let result = handle.await.expect("Task should not panic");
                prop_assert!(result.is_ok(), "Concurrent operation failed: {:?}", result);
            }

            let stats = cache.stats().await;
            let hit_rate = stats.hit_rate();
            prop_assert!((0.0..=1.0).contains(&hit_rate), "Hit rate out of range: {}", hit_rate);
            Ok(())
        })?;
    }
}

// == Additional Unit Tests for Edge Cases ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::record_name;

    #[test]
    fn test_distinct_keys_get_distinct_records() {
        assert_ne!(record_name("a"), record_name("b"));
        assert_eq!(record_name("a"), record_name("a"));
    }
}
