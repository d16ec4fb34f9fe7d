//! `key -> value` state tables with changelog-backed recovery (§4.1).
//!
//! A stateful handler (change-attack, change-host, ...) owns one `Table` per partition and
//! is the only task that ever calls `put`/`delete` on it: per-key serialization comes from
//! that single-writer discipline, not from locking inside `Table`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::changelog::{self, ChangelogEntry, ChangelogSink};
use crate::error::BrokerError;

pub struct Table<V> {
    sink: Arc<dyn ChangelogSink>,
    entries: RwLock<HashMap<String, V>>,
}

impl<V> Table<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    /// Replay the changelog and materialize the table's current state.
    pub async fn recover(sink: Arc<dyn ChangelogSink>) -> Result<Self, BrokerError> {
        let entries = changelog::fold(sink.replay().await?)?;
        Ok(Self {
            sink,
            entries: RwLock::new(entries),
        })
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn put(&self, key: impl Into<String>, value: V) -> Result<(), BrokerError> {
        let key = key.into();
        let encoded = changelog::encode(&value)?;
        self.sink
            .append(ChangelogEntry::Put(key.clone(), encoded))
            .await?;
        self.entries.write().await.insert(key, value);
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), BrokerError> {
        self.sink
            .append(ChangelogEntry::Delete(key.to_string()))
            .await?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    /// Snapshot of the keys currently materialized, for sweepers that iterate the whole
    /// table (wait-sweep, dump-writer, crawl-clean janitor).
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::MemoryChangelogSink;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let sink: Arc<dyn ChangelogSink> = Arc::new(MemoryChangelogSink::default());
        let table: Table<String> = Table::recover(sink).await.unwrap();

        table.put("k1", "v1".to_string()).await.unwrap();
        assert_eq!(table.get("k1").await, Some("v1".to_string()));
    }

    #[tokio::test]
    async fn delete_removes_the_key() {
        let sink: Arc<dyn ChangelogSink> = Arc::new(MemoryChangelogSink::default());
        let table: Table<String> = Table::recover(sink).await.unwrap();

        table.put("k1", "v1".to_string()).await.unwrap();
        table.delete("k1").await.unwrap();
        assert_eq!(table.get("k1").await, None);
    }

    #[tokio::test]
    async fn recover_replays_the_changelog() {
        let sink: Arc<dyn ChangelogSink> = Arc::new(MemoryChangelogSink::default());
        {
            let table: Table<String> = Table::recover(Arc::clone(&sink)).await.unwrap();
            table.put("k1", "v1".to_string()).await.unwrap();
            table.put("k2", "v2".to_string()).await.unwrap();
            table.delete("k2").await.unwrap();
        }

        let recovered: Table<String> = Table::recover(sink).await.unwrap();
        assert_eq!(recovered.get("k1").await, Some("v1".to_string()));
        assert_eq!(recovered.get("k2").await, None);
    }
}
