//! §4.5: Crawl Cache: `crawl_table[host] -> Crawl`, reused across attacks within a short
//! freshness window.

use std::sync::Arc;

use doscrawler_broker::Table;
use doscrawler_model::{Crawl, Settings};

use crate::error::SchedulerError;

pub struct CrawlCache {
    table: Arc<Table<Crawl>>,
}

impl CrawlCache {
    pub fn new(table: Arc<Table<Crawl>>) -> Self {
        Self { table }
    }

    pub async fn get_valid(&self, host: &str, settings: &Settings) -> Option<Crawl> {
        let crawl = self.table.get(host).await?;
        crawl.is_valid(settings, doscrawler_model::time::now()).then_some(crawl)
    }

    /// Write `crawl` iff it's newer than whatever is stored; an out-of-order add from a
    /// racing producer must never clobber a fresher one.
    pub async fn add(&self, crawl: Crawl) -> Result<(), SchedulerError> {
        let should_write = match self.table.get(&crawl.host).await {
            Some(existing) => crawl.time > existing.time,
            None => true,
        };
        if should_write {
            self.table.put(crawl.host.clone(), crawl).await?;
        }
        Ok(())
    }

    /// Delete iff the stored entry's `time` still equals the delete's snapshot.
    pub async fn delete(&self, host: &str, at: doscrawler_model::Timestamp) -> Result<(), SchedulerError> {
        if let Some(existing) = self.table.get(host).await {
            if existing.time == at {
                self.table.delete(host).await?;
            }
        }
        Ok(())
    }

    /// §4 "Timers & Janitors": periodic sweep removing entries that fail `is_valid`.
    pub async fn clean_expired(&self, settings: &Settings) -> Result<usize, SchedulerError> {
        let now = doscrawler_model::time::now();
        let mut removed = 0;
        for host in self.table.keys().await {
            if let Some(crawl) = self.table.get(&host).await {
                if !crawl.is_valid(settings, now) {
                    self.table.delete(&host).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doscrawler_broker::MemoryChangelogSink;

    async fn cache() -> CrawlCache {
        let table = Arc::new(Table::recover(Arc::new(MemoryChangelogSink::default())).await.unwrap());
        CrawlCache::new(table)
    }

    #[tokio::test]
    async fn stale_add_does_not_overwrite_a_newer_entry() {
        let cache = cache().await;
        let now = doscrawler_model::time::now();
        cache
            .add(Crawl {
                host: "victim.example".to_string(),
                status: 200,
                time: now,
                record: String::new(),
            })
            .await
            .unwrap();
        cache
            .add(Crawl {
                host: "victim.example".to_string(),
                status: 500,
                time: now - doscrawler_model::time::seconds(10),
                record: String::new(),
            })
            .await
            .unwrap();

        let stored = cache.table.get("victim.example").await.unwrap();
        assert_eq!(stored.status, 200);
    }
}
