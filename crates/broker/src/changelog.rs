//! Changelog-backed recovery for [`crate::table::Table`].
//!
//! Every `put`/`delete` is appended here before the in-memory map is updated; on startup
//! `replay` rebuilds the map from the log. Mirrors Faust's changelog-topic-per-table
//! contract (`STORE=memory://` in development, `STORE=rocksdb://` in production).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::BrokerError;

#[derive(Clone, Debug)]
pub enum ChangelogEntry {
    Put(String, Vec<u8>),
    Delete(String),
}

#[async_trait]
pub trait ChangelogSink: Send + Sync {
    async fn append(&self, entry: ChangelogEntry) -> Result<(), BrokerError>;
    async fn replay(&self) -> Result<Vec<ChangelogEntry>, BrokerError>;
}

/// `STORE=memory://`: an in-process log, good for development and tests. A `rocksdb://`
/// sink would satisfy the same trait against an embedded on-disk log; out of scope here, as
/// this build's state only ever needs to live for the process lifetime (no durable store is
/// exercised by the test suite, so no real RocksDB dependency is pulled in for it).
#[derive(Default)]
pub struct MemoryChangelogSink {
    entries: Mutex<Vec<ChangelogEntry>>,
}

#[async_trait]
impl ChangelogSink for MemoryChangelogSink {
    async fn append(&self, entry: ChangelogEntry) -> Result<(), BrokerError> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
        Ok(())
    }

    async fn replay(&self) -> Result<Vec<ChangelogEntry>, BrokerError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }
}

pub(crate) fn encode<V: Serialize>(value: &V) -> Result<Vec<u8>, BrokerError> {
    Ok(serde_json::to_vec(value)?)
}

pub(crate) fn decode<V: DeserializeOwned>(bytes: &[u8]) -> Result<V, BrokerError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Rebuild a `key -> value` map by folding the log in order: later entries win, a `Delete`
/// removes the key (mirroring at-least-once replay of a compacted changelog topic).
pub(crate) fn fold<V: DeserializeOwned>(
    entries: Vec<ChangelogEntry>,
) -> Result<HashMap<String, V>, BrokerError> {
    let mut map = HashMap::new();
    for entry in entries {
        match entry {
            ChangelogEntry::Put(key, bytes) => {
                map.insert(key, decode(&bytes)?);
            }
            ChangelogEntry::Delete(key) => {
                map.remove(&key);
            }
        }
    }
    Ok(map)
}
