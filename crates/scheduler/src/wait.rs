//! §4.4.2: the wait queue, attacks deferred until their next scheduled crawl moment.
//!
//! Grounded in `doscrawler/crawls/agents.py::change_wait_crawls` (there keyed by
//! `ip/start_time` over a `Target`'s whole host map; here keyed by `ip/start_time/hosts`
//! since the Host Resolver fans out to single-host Attacks, per `model::WaitEntry`).

use std::sync::Arc;

use doscrawler_broker::{PartitionedTopic, Table};
use doscrawler_model::{Attack, Settings, WaitEntry};

use crate::error::SchedulerError;

pub struct WaitQueue {
    table: Arc<Table<WaitEntry>>,
}

impl WaitQueue {
    pub fn new(table: Arc<Table<WaitEntry>>) -> Self {
        Self { table }
    }

    /// §4.4 step 5 / §4.4.2 add path: insert if absent, else replace only if the incoming
    /// attack's `latest_time` is newer; the older entry survives the race so the earliest
    /// scheduled moment is preserved.
    pub async fn enqueue(&self, attack: Attack, settings: &Settings) -> Result<(), SchedulerError> {
        if attack.next_crawl(settings).is_none() {
            return Ok(());
        }

        let entry = WaitEntry {
            ip: attack.ip,
            start_time: attack.start_time,
            hosts: attack.hosts.clone(),
            attack,
        };
        let key = entry.key();

        let should_write = match self.table.get(&key).await {
            Some(existing) => entry.attack.latest_time > existing.attack.latest_time,
            None => true,
        };

        if should_write {
            self.table.put(key, entry).await?;
        }

        Ok(())
    }

    /// §4.4.2: runs every `CRAWL_GET_WAIT_TIMER` seconds; releases any entry whose scheduled
    /// moment has arrived back onto `scheduler_input` for another `enqueue`/fetch pass.
    pub async fn wait_sweep(
        &self,
        settings: &Settings,
        scheduler_input: &PartitionedTopic<Attack>,
    ) -> Result<usize, SchedulerError> {
        let now = doscrawler_model::time::now();
        let mut released = 0;

        for key in self.table.keys().await {
            let Some(entry) = self.table.get(&key).await else {
                continue;
            };

            match entry.attack.next_crawl(settings) {
                Some((next_time, _)) if next_time <= now => {
                    self.release(&key, &entry, scheduler_input).await?;
                    released += 1;
                }
                None => {
                    self.table.delete(&key).await?;
                }
                Some(_) => {}
            }
        }

        Ok(released)
    }

    /// Delete iff the table's entry still carries the `latest_time` we observed, then
    /// republish the Attack to the scheduler's input topic.
    async fn release(
        &self,
        key: &str,
        observed: &WaitEntry,
        scheduler_input: &PartitionedTopic<Attack>,
    ) -> Result<(), SchedulerError> {
        if let Some(current) = self.table.get(key).await {
            if current.attack.latest_time == observed.attack.latest_time {
                self.table.delete(key).await?;
                scheduler_input
                    .send(key.to_string(), current.attack.clone())
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doscrawler_broker::MemoryChangelogSink;

    async fn queue() -> WaitQueue {
        let table = Arc::new(Table::recover(Arc::new(MemoryChangelogSink::default())).await.unwrap());
        WaitQueue::new(table)
    }

    fn settings() -> Settings {
        Settings {
            attack_ttl: 86_400,
            crawl_retries: 3,
            crawl_retries_backoff: 20,
            crawl_repeat_interval: 1200,
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn fresh_attack_is_enqueued_for_its_first_crawl() {
        let queue = queue().await;
        let settings = settings();
        let mut attack = Attack::new(
            "203.0.113.9".parse().unwrap(),
            doscrawler_model::time::now(),
            doscrawler_model::time::now(),
        );
        attack.hosts = vec!["victim.example".to_string()];

        queue.enqueue(attack.clone(), &settings).await.unwrap();

        let key = WaitEntry {
            ip: attack.ip,
            start_time: attack.start_time,
            hosts: attack.hosts.clone(),
            attack: attack.clone(),
        }
        .key();
        assert!(queue.table.get(&key).await.is_some());
    }

    #[tokio::test]
    async fn sweep_releases_due_entries() {
        let queue = queue().await;
        let settings = settings();
        let mut attack = Attack::new(
            "203.0.113.9".parse().unwrap(),
            doscrawler_model::time::now() - doscrawler_model::time::seconds(5),
            doscrawler_model::time::now(),
        );
        attack.hosts = vec!["victim.example".to_string()];
        queue.enqueue(attack, &settings).await.unwrap();

        let (topic, mut receivers) = PartitionedTopic::new(1, 8);
        let released = queue.wait_sweep(&settings, &topic).await.unwrap();
        assert_eq!(released, 1);
        assert!(receivers[0].try_recv().is_ok());
    }
}
