//! §4.2: the change-attack handler, concurrency 1 per partition, so per-IP merge/re-key
//! decisions never race within a partition.

use std::sync::Arc;

use doscrawler_broker::{PartitionedTopic, Table};
use doscrawler_model::{Attack, AttackCandidate, Settings};

use crate::error::MergerError;
use crate::message::{attack_key, ChangeAttack};

pub struct AttackMerger {
    settings: Settings,
    attack_table: Arc<Table<Attack>>,
    candidate_table: Arc<Table<AttackCandidate>>,
    host_topic: PartitionedTopic<Attack>,
}

impl AttackMerger {
    pub fn new(
        settings: Settings,
        attack_table: Arc<Table<Attack>>,
        candidate_table: Arc<Table<AttackCandidate>>,
        host_topic: PartitionedTopic<Attack>,
    ) -> Self {
        Self {
            settings,
            attack_table,
            candidate_table,
            host_topic,
        }
    }

    pub async fn handle(&self, message: ChangeAttack) -> Result<(), MergerError> {
        match message {
            ChangeAttack::Add(new) => self.handle_add(new).await,
            ChangeAttack::Delete {
                ip,
                start_time,
                latest_time,
            } => self.handle_delete(ip, start_time, latest_time).await,
        }
    }

    async fn handle_add(&self, new: Attack) -> Result<(), MergerError> {
        if !new.is_alive_soon(&self.settings) {
            return Ok(());
        }

        let ip_key = new.ip.to_string();
        let existing_candidate = self.candidate_table.get(&ip_key).await;

        let candidate = match existing_candidate {
            Some(candidate) if candidate.is_mergeable(new.ip, new.start_time, &self.settings) => {
                Some(self.merge_candidate(candidate, &new).await?)
            }
            Some(candidate) if candidate.is_stale_against(new.latest_time) => None,
            _ => Some(self.open_candidate(new.ip, new.start_time, new.latest_time).await?),
        };

        let attack_key = match &candidate {
            Some(candidate) => attack_key(candidate.ip, candidate.start_time),
            None => attack_key(new.ip, new.start_time),
        };

        match self.attack_table.get(&attack_key).await {
            Some(mut current) => {
                current.union_merge(&new);
                self.attack_table.put(attack_key, current).await?;
            }
            None => {
                let mut attack = match &candidate {
                    Some(candidate) => Attack::new(new.ip, candidate.start_time, candidate.latest_time),
                    None => Attack::new(new.ip, new.start_time, new.latest_time),
                };
                attack.union_merge(&new);
                self.attack_table.put(attack_key, attack).await?;
            }
        }

        Ok(())
    }

    /// §4.2: extend the candidate's window, re-keying the Attack in `attack_table` when the
    /// candidate's own start moves earlier.
    async fn merge_candidate(&self, candidate: AttackCandidate, new: &Attack) -> Result<AttackCandidate, MergerError> {
        let merged = candidate.merged_with(new.start_time, new.latest_time);

        if candidate.start_time > new.start_time {
            let old_key = attack_key(candidate.ip, candidate.start_time);
            if let Some(current) = self.attack_table.get(&old_key).await {
                let mut rekeyed = Attack::new(new.ip, merged.start_time, merged.latest_time);
                rekeyed.attack_vectors = current.attack_vectors;
                rekeyed.hosts = current.hosts;
                rekeyed.crawls = current.crawls;
                self.attack_table
                    .put(attack_key(rekeyed.ip, rekeyed.start_time), rekeyed)
                    .await?;
                self.attack_table.delete(&old_key).await?;
            }
        }

        self.candidate_table.put(merged.ip.to_string(), merged).await?;
        self.forward_to_host_resolution(&merged).await?;
        Ok(merged)
    }

    async fn open_candidate(
        &self,
        ip: std::net::Ipv4Addr,
        start_time: doscrawler_model::Timestamp,
        latest_time: doscrawler_model::Timestamp,
    ) -> Result<AttackCandidate, MergerError> {
        let candidate = AttackCandidate::new(ip, start_time, latest_time);
        self.candidate_table.put(ip.to_string(), candidate).await?;
        self.forward_to_host_resolution(&candidate).await?;
        Ok(candidate)
    }

    async fn forward_to_host_resolution(&self, candidate: &AttackCandidate) -> Result<(), MergerError> {
        let placeholder = Attack::new(candidate.ip, candidate.start_time, candidate.latest_time);
        self.host_topic
            .send(attack_key(candidate.ip, candidate.start_time), placeholder)
            .await?;
        Ok(())
    }

    /// §4.2 delete path: the delete carries the `latest_time` snapshot the sender observed;
    /// only act if the table's current value still matches it (lost-update guard).
    async fn handle_delete(
        &self,
        ip: std::net::Ipv4Addr,
        start_time: doscrawler_model::Timestamp,
        latest_time: doscrawler_model::Timestamp,
    ) -> Result<(), MergerError> {
        let ip_key = ip.to_string();
        if let Some(candidate) = self.candidate_table.get(&ip_key).await {
            if candidate.latest_time == latest_time {
                self.candidate_table.delete(&ip_key).await?;
            }
        }

        let key = attack_key(ip, start_time);
        if let Some(attack) = self.attack_table.get(&key).await {
            if attack.latest_time == latest_time {
                self.attack_table.delete(&key).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doscrawler_broker::MemoryChangelogSink;
    use doscrawler_model::AttackVector;

    fn vector(ip: &str, start: i64, latest: i64) -> AttackVector {
        let ip = ip.parse().unwrap();
        AttackVector {
            target_ip: ip,
            start_time: doscrawler_model::time::now() + doscrawler_model::time::seconds(start),
            latest_time: doscrawler_model::time::now() + doscrawler_model::time::seconds(latest),
            bin_time: doscrawler_model::time::now(),
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

    async fn merger() -> AttackMerger {
        let attack_table = Arc::new(Table::recover(Arc::new(MemoryChangelogSink::default())).await.unwrap());
        let candidate_table = Arc::new(Table::recover(Arc::new(MemoryChangelogSink::default())).await.unwrap());
        let (host_topic, _receivers) = PartitionedTopic::new(1, 16);
        AttackMerger::new(Settings::default(), attack_table, candidate_table, host_topic)
    }

    #[tokio::test]
    async fn first_vector_opens_a_candidate_and_an_attack() {
        let merger = merger().await;
        let v = vector("203.0.113.9", 0, 10);
        let attack = Attack::from_vector(v.clone());
        merger.handle(ChangeAttack::Add(attack)).await.unwrap();

        let stored = merger
            .attack_table
            .get(&attack_key(v.target_ip, v.start_time))
            .await
            .unwrap();
        assert_eq!(stored.attack_vectors.len(), 1);

        let candidate = merger.candidate_table.get(&v.target_ip.to_string()).await.unwrap();
        assert_eq!(candidate.start_time, v.start_time);
    }

    #[tokio::test]
    async fn second_adjacent_vector_merges_into_the_same_attack() {
        let merger = merger().await;
        let v1 = vector("203.0.113.9", 0, 10);
        merger.handle(ChangeAttack::Add(Attack::from_vector(v1.clone()))).await.unwrap();

        let mut v2 = vector("203.0.113.9", 20, 30);
        v2.start_time = v1.latest_time + doscrawler_model::time::seconds(5);
        v2.latest_time = v2.start_time + doscrawler_model::time::seconds(5);
        merger.handle(ChangeAttack::Add(Attack::from_vector(v2.clone()))).await.unwrap();

        let candidate = merger.candidate_table.get(&v1.target_ip.to_string()).await.unwrap();
        assert_eq!(candidate.start_time, v1.start_time);
        assert_eq!(candidate.latest_time, v2.latest_time);

        let stored = merger.attack_table.get(&attack_key(v1.target_ip, v1.start_time)).await.unwrap();
        assert_eq!(stored.attack_vectors.len(), 2);
    }
}
