//! Crawl Scheduler (§4.4): drives per-host HTTP fetches under a global concurrency cap,
//! enforces retry/backoff/repeat cadence, and maintains the wait queue of attacks deferred
//! until their next scheduled crawl moment.

pub mod cache;
pub mod error;
pub mod fetch;
pub mod wait;

use std::sync::Arc;

use doscrawler_model::{Attack, Crawl, CrawlKind, Settings};
use tokio::sync::Semaphore;

pub use cache::CrawlCache;
pub use error::SchedulerError;
pub use fetch::{build_client, fetch_host};
pub use wait::WaitQueue;

/// §4.4: the scheduler's public `enqueue` operation, tying the crawl cache, the HTTP
/// fetcher and the wait queue together for a single-host Attack.
pub struct Scheduler {
    settings: Settings,
    client: reqwest::Client,
    cache: CrawlCache,
    wait_queue: WaitQueue,
    /// Bounds simultaneous in-flight HTTP fetches to `CRAWL_CONCURRENCY`; `reqwest` pools
    /// connections per-host, not globally, so this is the actual concurrency cap.
    concurrency: Semaphore,
}

impl Scheduler {
    pub fn new(settings: Settings, cache: CrawlCache, wait_queue: WaitQueue) -> Result<Self, reqwest::Error> {
        let client = build_client(&settings)?;
        let concurrency = Semaphore::new(settings.crawl_concurrency);
        Ok(Self {
            settings,
            client,
            cache,
            wait_queue,
            concurrency,
        })
    }

    /// §4.4 steps 1-5. Returns the updated Attack once every host in `attack.hosts` either
    /// produced a fresh crawl or was served from the cache, or `None` if the crawl was
    /// deferred (not yet due) or dropped (TTL expired).
    pub async fn enqueue(&self, mut attack: Attack) -> Result<Option<Attack>, SchedulerError> {
        let Some((next_time, kind)) = attack.next_crawl(&self.settings) else {
            return Ok(None);
        };

        if next_time > doscrawler_model::time::now() {
            self.wait_queue.enqueue(attack, &self.settings).await?;
            return Ok(None);
        }

        if kind == CrawlKind::Repeat {
            attack.reset_crawls();
        }

        for host in attack.hosts.clone() {
            let crawl = match self.cache.get_valid(&host, &self.settings).await {
                Some(cached) => cached,
                None => {
                    let permit = self
                        .concurrency
                        .acquire()
                        .await
                        .expect("semaphore is never closed");
                    let crawl = fetch_host(&self.client, &host, attack.ip, &self.settings).await;
                    drop(permit);
                    self.cache.add(crawl.clone()).await?;
                    crawl
                }
            };
            merge_crawl(&mut attack, crawl);
        }

        self.wait_queue.enqueue(attack.clone(), &self.settings).await?;

        Ok(Some(attack))
    }

    /// §4.4.2: periodic release of due wait-queue entries back onto `self`.
    pub async fn wait_sweep(
        &self,
        scheduler_input: &doscrawler_broker::PartitionedTopic<Attack>,
    ) -> Result<usize, SchedulerError> {
        self.wait_queue.wait_sweep(&self.settings, scheduler_input).await
    }

    /// §4 "Timers & Janitors": periodic crawl-cache cleanup.
    pub async fn clean_cache(&self) -> Result<usize, SchedulerError> {
        self.cache.clean_expired(&self.settings).await
    }
}

fn merge_crawl(attack: &mut Attack, crawl: Crawl) {
    if !attack.crawls.iter().any(|existing| existing.key() == crawl.key()) {
        attack.crawls.push(crawl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doscrawler_broker::{MemoryChangelogSink, Table};

    async fn scheduler(settings: Settings) -> Scheduler {
        let crawl_table = Arc::new(Table::recover(Arc::new(MemoryChangelogSink::default())).await.unwrap());
        let wait_table = Arc::new(Table::recover(Arc::new(MemoryChangelogSink::default())).await.unwrap());
        Scheduler::new(settings, CrawlCache::new(crawl_table), WaitQueue::new(wait_table)).unwrap()
    }

    #[tokio::test]
    async fn fresh_attack_with_no_hosts_is_dropped() {
        let settings = Settings::default();
        let scheduler = scheduler(settings.clone()).await;
        let attack = Attack::new(
            "203.0.113.9".parse().unwrap(),
            doscrawler_model::time::now(),
            doscrawler_model::time::now(),
        );

        // no hosts resolved yet: next_crawl_for_hosts(&[]) is None, so enqueue drops it.
        let result = scheduler.enqueue(attack).await.unwrap();
        assert!(result.is_none());
    }
}
