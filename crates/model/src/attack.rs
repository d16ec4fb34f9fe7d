//! `Attack`: an aggregated session of attack vectors targeting a single IP.
//!
//! Grounded in `doscrawler/attacks/models.py::Attack`. Key in state is `ip/start_time`.

use std::net::Ipv4Addr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::attack_vector::AttackVector;
use crate::config::Settings;
use crate::crawl::{Crawl, CrawlKind};
use crate::time::{self, Timestamp};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub ip: Ipv4Addr,
    pub start_time: Timestamp,
    pub latest_time: Timestamp,
    #[serde(default)]
    pub attack_vectors: Vec<AttackVector>,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub crawls: Vec<Crawl>,
}

/// The key an `Attack` is stored under in `attack_table`: `ip/start_time`.
pub type AttackKey = (Ipv4Addr, Timestamp);

impl Attack {
    pub fn new(ip: Ipv4Addr, start_time: Timestamp, latest_time: Timestamp) -> Self {
        Self {
            ip,
            start_time,
            latest_time,
            attack_vectors: Vec::new(),
            hosts: Vec::new(),
            crawls: Vec::new(),
        }
    }

    pub fn from_vector(vector: AttackVector) -> Self {
        Self {
            ip: vector.target_ip,
            start_time: vector.start_time,
            latest_time: vector.latest_time,
            attack_vectors: vec![vector],
            hosts: Vec::new(),
            crawls: Vec::new(),
        }
    }

    pub fn key(&self) -> AttackKey {
        (self.ip, self.start_time)
    }

    /// §3: `TTL := latest_time + ATTACK_TTL − now`.
    pub fn ttl(&self, settings: &Settings, at: Timestamp) -> Duration {
        (self.latest_time + time::seconds(settings.attack_ttl)) - at
    }

    /// §3: alive iff `TTL(now) > 0`.
    pub fn is_alive(&self, settings: &Settings) -> bool {
        self.ttl(settings, time::now()) > Duration::zero()
    }

    /// §3: alive-soon iff `TTL(now+5s) > 0`.
    pub fn is_alive_soon(&self, settings: &Settings) -> bool {
        self.ttl(settings, time::now() + time::seconds(5)) > Duration::zero()
    }

    /// §3: a new vector is mergeable with a candidate iff same IP and
    /// `|vector.start_time − candidate.latest_time| ≤ ATTACK_MERGE_INTERVAL` (symmetric).
    pub fn is_mergeable_with(&self, candidate_latest_time: Timestamp, settings: &Settings) -> bool {
        let diff = (self.start_time - candidate_latest_time).num_seconds().abs();
        diff <= settings.attack_merge_interval
    }

    /// §4.2: union-merge `attack_vectors`, `hosts`, `crawls` by composite key.
    pub fn union_merge(&mut self, other: &Attack) {
        for vector in &other.attack_vectors {
            if !self
                .attack_vectors
                .iter()
                .any(|existing| existing.key() == vector.key())
            {
                self.attack_vectors.push(vector.clone());
            }
        }
        for host in &other.hosts {
            if !self.hosts.contains(host) {
                self.hosts.push(host.clone());
            }
        }
        for crawl in &other.crawls {
            if !self.crawls.iter().any(|existing| existing.key() == crawl.key()) {
                self.crawls.push(crawl.clone());
            }
        }
    }

    pub fn reset_crawls(&mut self) {
        self.crawls.clear();
    }

    fn crawls_for_host<'a>(&'a self, host: &str) -> impl Iterator<Item = &'a Crawl> {
        self.crawls.iter().filter(move |c| c.host == host)
    }

    fn latest_crawl_time(&self, hosts: &[String]) -> Option<Timestamp> {
        hosts
            .iter()
            .flat_map(|h| self.crawls_for_host(h))
            .map(|c| c.time)
            .max()
    }

    fn initial_crawl_time(&self, hosts: &[String]) -> Option<Timestamp> {
        hosts
            .iter()
            .flat_map(|h| self.crawls_for_host(h))
            .map(|c| c.time)
            .min()
    }

    /// §4.4 step 1: compute the time and kind of the next crawl for `self.hosts`, or
    /// `None` if the attack's TTL will have expired by then.
    pub fn next_crawl(&self, settings: &Settings) -> Option<(Timestamp, CrawlKind)> {
        self.next_crawl_for_hosts(&self.hosts, settings)
    }

    pub fn next_crawl_for_hosts(
        &self,
        hosts: &[String],
        settings: &Settings,
    ) -> Option<(Timestamp, CrawlKind)> {
        if hosts.is_empty() {
            return None;
        }

        let n = hosts
            .iter()
            .map(|h| self.crawls_for_host(h).count())
            .min()
            .expect("hosts is non-empty");

        let (next_type, next_time) = if n == 0 {
            (CrawlKind::Crawl, self.start_time)
        } else {
            let any_failed = hosts.iter().any(|h| {
                self.crawls_for_host(h)
                    .max_by_key(|c| c.time)
                    .map(|c| !c.is_success())
                    .unwrap_or(false)
            });

            if !any_failed {
                let initial = self
                    .initial_crawl_time(hosts)
                    .expect("n>0 implies crawls exist for every host");
                (
                    CrawlKind::Repeat,
                    initial + time::seconds(settings.crawl_repeat_interval),
                )
            } else if (n as u32) <= settings.crawl_retries {
                let kind = if n == 1 {
                    CrawlKind::RetryFirst
                } else {
                    CrawlKind::Retry
                };
                let latest = self
                    .latest_crawl_time(hosts)
                    .expect("n>0 implies crawls exist for every host");
                let backoff = 2i64.pow(n as u32 - 1) * settings.crawl_retries_backoff;
                (kind, latest + time::seconds(backoff))
            } else {
                let initial = self
                    .initial_crawl_time(hosts)
                    .expect("n>0 implies crawls exist for every host");
                (
                    CrawlKind::Repeat,
                    initial + time::seconds(settings.crawl_repeat_interval),
                )
            }
        };

        if self.ttl(settings, next_time) <= Duration::zero() {
            None
        } else {
            Some((next_time, next_type))
        }
    }
}

/// §3: the currently-open merge window for one IP. At most one per `ip`; the merger
/// keeps it alive as long as vectors keep arriving within `ATTACK_MERGE_INTERVAL` of its
/// `latest_time`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackCandidate {
    pub ip: Ipv4Addr,
    pub start_time: Timestamp,
    pub latest_time: Timestamp,
}

impl AttackCandidate {
    pub fn new(ip: Ipv4Addr, start_time: Timestamp, latest_time: Timestamp) -> Self {
        Self {
            ip,
            start_time,
            latest_time,
        }
    }

    pub fn key(&self) -> Ipv4Addr {
        self.ip
    }

    /// §3: a candidate expires `ATTACK_MERGE_INTERVAL` after its `latest_time` with no
    /// further vectors absorbed into it.
    pub fn is_alive(&self, settings: &Settings, at: Timestamp) -> bool {
        self.latest_time + time::seconds(settings.attack_merge_interval) > at
    }

    /// §4.2: same IP and `|vector.start_time − latest_time| ≤ ATTACK_MERGE_INTERVAL`.
    pub fn is_mergeable(&self, vector_ip: Ipv4Addr, vector_start_time: Timestamp, settings: &Settings) -> bool {
        if vector_ip != self.ip {
            return false;
        }
        let diff = (vector_start_time - self.latest_time).num_seconds().abs();
        diff <= settings.attack_merge_interval
    }

    /// §4.2: a vector that arrived before the candidate even opened cannot affect it and
    /// should be treated as if there were no candidate at all.
    pub fn is_stale_against(&self, vector_latest_time: Timestamp) -> bool {
        self.start_time > vector_latest_time
    }

    /// §4.2: merge a newly-arrived vector's window into this candidate.
    pub fn merged_with(&self, vector_start_time: Timestamp, vector_latest_time: Timestamp) -> Self {
        Self {
            ip: self.ip,
            start_time: self.start_time.min(vector_start_time),
            latest_time: self.latest_time.max(vector_latest_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::Crawl;
    use chrono::TimeZone;

    fn ip() -> Ipv4Addr {
        "1.2.3.4".parse().unwrap()
    }

    fn settings() -> Settings {
        Settings {
            attack_merge_interval: 15,
            attack_ttl: 240,
            crawl_retries: 3,
            crawl_retries_backoff: 5,
            crawl_repeat_interval: 60,
            ..Settings::default()
        }
    }

    fn t(offset_secs: i64) -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + time::seconds(offset_secs)
    }

    #[test]
    fn s1_merge_adjacent_vectors() {
        // vectors separated by 10s, within the 15s merge interval
        let v1 = AttackVector {
            target_ip: ip(),
            start_time: t(0),
            latest_time: t(5),
            bin_time: t(0),
            attacker_ip_cnt: 0,
            attack_port_cnt: 0,
            target_port_cnt: 0,
            packet_cnt: 0,
            byte_cnt: 0,
            initial_packet_len: 0,
            target_protocol: 0,
            icmp_mismatches: 0,
            max_ppm_interval: 0,
        };
        let mut v2 = v1.clone();
        v2.start_time = t(10);
        v2.latest_time = t(20);

        let mut attack = Attack::from_vector(v1.clone());
        attack.union_merge(&Attack::from_vector(v2.clone()));

        assert_eq!(attack.attack_vectors.len(), 2);
    }

    #[test]
    fn s4_retry_schedule_escalates_then_repeats() {
        let settings = settings();
        let mut attack = Attack::new(ip(), t(0), t(0));
        attack.hosts = vec!["example.invalid".to_string()];

        // Fourth attempt (n=4 > CRAWL_RETRIES=3) must be a repeat.
        for (i, crawl_time) in [0, 5, 15, 35].into_iter().enumerate() {
            attack.crawls.push(Crawl {
                host: "example.invalid".to_string(),
                status: -1,
                time: t(crawl_time),
                record: String::new(),
            });
            if i < 3 {
                let (_, kind) = attack.next_crawl(&settings).unwrap();
                assert_ne!(kind, CrawlKind::Repeat, "attempt {i} should still be retrying");
            }
        }

        let (next_time, kind) = attack.next_crawl(&settings).unwrap();
        assert_eq!(kind, CrawlKind::Repeat);
        // initial_crawl_time(H) is the earliest crawl, t(0), not the most recent attempt.
        assert_eq!(next_time, t(0) + time::seconds(60));
    }

    #[test]
    fn candidate_rekeys_when_new_vector_starts_earlier() {
        let settings = settings();
        let candidate = AttackCandidate::new(ip(), t(100), t(110));

        assert!(candidate.is_mergeable(ip(), t(90), &settings));
        let merged = candidate.merged_with(t(90), t(95));

        assert_eq!(merged.start_time, t(90));
        assert_eq!(merged.latest_time, t(110));
        // re-key condition from §4.2: the candidate started later than this vector reaches.
        assert!(candidate.start_time > t(90));
    }

    #[test]
    fn candidate_rejects_stale_arrival() {
        let candidate = AttackCandidate::new(ip(), t(100), t(110));
        // vector's latest_time is before the candidate's start_time: cannot affect it.
        assert!(candidate.is_stale_against(t(50)));
    }

    #[test]
    fn retry_backoff_is_exponential() {
        let settings = settings();
        let mut attack = Attack::new(ip(), t(0), t(0));
        attack.hosts = vec!["example.invalid".to_string()];
        attack.crawls.push(Crawl {
            host: "example.invalid".to_string(),
            status: -1,
            time: t(0),
            record: String::new(),
        });

        // n=1 after the first failed crawl -> retry-first at t(0) + 2^0*5 = t(5)
        let (next_time, kind) = attack.next_crawl(&settings).unwrap();
        assert_eq!(kind, CrawlKind::RetryFirst);
        assert_eq!(next_time, t(5));
    }
}
