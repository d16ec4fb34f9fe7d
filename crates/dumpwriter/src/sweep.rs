//! §4.6 steps 1-4: the cron-fired dump sweep.
//!
//! Grounded in `doscrawler/dumps/models.py::Dump.write` and `_get_targets` (there scanning
//! `target_table`; here the canonical `attack_table`).

use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use doscrawler_broker::{PartitionedTopic, Table};
use doscrawler_merger::{attack_key, ChangeAttack};
use doscrawler_model::{Attack, Dump, DumpFile, Settings};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

use crate::error::DumpWriterError;
use crate::notify::{Notification, NotificationStatus, Notifier};

pub struct DumpWriter {
    settings: Settings,
    attack_table: Arc<Table<Attack>>,
    dump_table: Arc<Table<Dump>>,
    change_attack_topic: PartitionedTopic<ChangeAttack>,
    notifier: Arc<dyn Notifier>,
}

pub struct DumpCounts {
    pub attacks: usize,
    pub hosts: usize,
    pub crawls: usize,
}

impl DumpWriter {
    pub fn new(
        settings: Settings,
        attack_table: Arc<Table<Attack>>,
        dump_table: Arc<Table<Dump>>,
        change_attack_topic: PartitionedTopic<ChangeAttack>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            attack_table,
            dump_table,
            change_attack_topic,
            notifier,
        }
    }

    /// §4.6 steps 1-4, fired by the `DUMP_CRON` schedule.
    pub async fn run(&self) -> Result<(), DumpWriterError> {
        let now = doscrawler_model::time::now();
        let dump = Dump::with_time(now);

        let (file, counts) = self.collect(&dump).await?;
        self.write(&file).await?;
        self.dump_table.put(dump.name.clone(), dump).await?;

        self.notifier
            .notify(Notification {
                status: NotificationStatus::Success,
                title: "I saved a new dump!".to_string(),
                descriptions: vec![
                    format!("Dump: {}", file.name),
                    format!("Attacks: {}", counts.attacks),
                    format!("Hosts: {}", counts.hosts),
                    format!("Crawls: {}", counts.crawls),
                ],
            })
            .await;

        Ok(())
    }

    /// Step 1-2: snapshot expired attacks, decode their crawl records, and queue their
    /// removal from `attack_table` via the change-attack topic.
    async fn collect(&self, dump: &Dump) -> Result<(DumpFile, DumpCounts), DumpWriterError> {
        let mut attacks = Vec::new();
        let mut hosts = 0;
        let mut crawls = 0;

        for key in self.attack_table.keys().await {
            let Some(attack) = self.attack_table.get(&key).await else {
                continue;
            };

            if attack.is_alive(&self.settings) {
                continue;
            }

            hosts += attack.hosts.len();
            crawls += attack.crawls.len();
            attacks.push(attack.to_dump_attack(|record| {
                doscrawler_warc::decode_pair_lossy(record).unwrap_or_default()
            }));

            self.change_attack_topic
                .send(
                    attack_key(attack.ip, attack.start_time),
                    ChangeAttack::Delete {
                        ip: attack.ip,
                        start_time: attack.start_time,
                        latest_time: attack.latest_time,
                    },
                )
                .await?;
        }

        let counts = DumpCounts {
            attacks: attacks.len(),
            hosts,
            crawls,
        };

        Ok((
            DumpFile {
                name: dump.name.clone(),
                time: dump.time,
                attacks,
            },
            counts,
        ))
    }

    /// Step 3: write `{DUMP_DIR}/{name}.json.gz` at `DUMP_COMPRESS_LEVEL`.
    async fn write(&self, file: &DumpFile) -> Result<(), DumpWriterError> {
        std::fs::create_dir_all(&self.settings.dump_dir)?;
        let path = Path::new(&self.settings.dump_dir).join(format!("{}.json.gz", file.name));
        let json = serde_json::to_vec(file)?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.settings.dump_compress_level));
        encoder.write_all(&json)?;
        let gzipped = encoder.finish()?;

        std::fs::write(path, gzipped)?;
        Ok(())
    }

    /// §4.6 step 5: a second periodic job retires dump records past `RETENTION_INTERVAL`.
    pub async fn clean_expired(&self) -> Result<usize, DumpWriterError> {
        let now = doscrawler_model::time::now();
        let mut removed = 0;
        for key in self.dump_table.keys().await {
            if let Some(dump) = self.dump_table.get(&key).await {
                if !dump.is_valid(&self.settings, now) {
                    self.dump_table.delete(&key).await?;
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
    use doscrawler_model::AttackVector;
    use tempfile::tempdir;

    fn vector(start: i64, latest: i64) -> AttackVector {
        let now = doscrawler_model::time::now();
        AttackVector {
            target_ip: "203.0.113.9".parse().unwrap(),
            start_time: now + Duration::seconds(start),
            latest_time: now + Duration::seconds(latest),
            bin_time: now,
            attacker_ip_cnt: 1,
            attack_port_cnt: 1,
            target_port_cnt: 1,
            packet_cnt: 1,
            byte_cnt: 1,
            initial_packet_len: 1,
            target_protocol: 6,
            icmp_mismatches: 0,
            max_ppm_interval: 1,
        }
    }

    #[tokio::test]
    async fn expired_attacks_are_dumped_and_queued_for_deletion() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.attack_ttl = 1;
        settings.dump_dir = dir.path().to_string_lossy().to_string();

        let attack_table = Arc::new(Table::recover(Arc::new(MemoryChangelogSink::default())).await.unwrap());
        let dump_table = Arc::new(Table::recover(Arc::new(MemoryChangelogSink::default())).await.unwrap());
        let (change_attack_topic, mut receivers) = PartitionedTopic::new(1, 16);

        let mut attack = Attack::from_vector(vector(-7200, -7200));
        attack.hosts = vec!["victim.example".to_string()];
        attack_table
            .put(attack_key(attack.ip, attack.start_time), attack.clone())
            .await
            .unwrap();

        let writer = DumpWriter::new(
            settings,
            attack_table.clone(),
            dump_table,
            change_attack_topic,
            Arc::new(crate::notify::LoggingNotifier),
        );

        writer.run().await.unwrap();

        assert!(receivers[0].try_recv().is_ok());
        let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(written.len(), 1);
    }
}
