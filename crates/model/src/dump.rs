//! `Dump`: a periodic, compressed JSON artifact containing finalized Attacks.
//!
//! Grounded in `doscrawler/dumps/models.py::Dump`.

use serde::{Deserialize, Serialize};

use crate::attack::Attack;
use crate::config::Settings;
use crate::time::{self, Timestamp};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dump {
    pub name: String,
    pub time: Timestamp,
}

impl Dump {
    pub fn with_time(time: Timestamp) -> Self {
        Self {
            name: name_for(time),
            time,
        }
    }

    /// §3: valid within `RETENTION_INTERVAL`.
    pub fn is_valid(&self, settings: &Settings, at: Timestamp) -> bool {
        let expires_at = self.time + time::seconds(settings.retention_interval);
        expires_at > at
    }
}

/// §6: `data-telescope-crawler-dos-YYYYMMDDHHMM`.
pub fn name_for(time: Timestamp) -> String {
    format!("data-telescope-crawler-dos-{}", time.format("%Y%m%d%H%M"))
}

/// The on-disk payload written to `{DUMP_DIR}/{name}.json.gz`, matching §6's dump file
/// shape.
#[derive(Clone, Debug, Serialize)]
pub struct DumpFile {
    pub name: String,
    #[serde(serialize_with = "time::serialize_dump_time")]
    pub time: Timestamp,
    pub attacks: Vec<DumpAttack>,
}

/// An `Attack` with its crawl bodies decoded to UTF-8 text, ready for JSON serialization.
#[derive(Clone, Debug, Serialize)]
pub struct DumpAttack {
    pub ip: std::net::Ipv4Addr,
    #[serde(serialize_with = "time::serialize_dump_time")]
    pub start_time: Timestamp,
    #[serde(serialize_with = "time::serialize_dump_time")]
    pub latest_time: Timestamp,
    pub attack_vectors: Vec<crate::attack_vector::AttackVector>,
    pub hosts: Vec<String>,
    pub crawls: Vec<DumpCrawl>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DumpCrawl {
    pub host: String,
    pub status: i32,
    #[serde(serialize_with = "time::serialize_dump_time")]
    pub time: Timestamp,
    pub record: String,
}

impl Attack {
    /// §4.6 step 2: decode crawls (ungzip+base64-decode `record` into UTF-8 with
    /// best-effort replacement), sort vectors/crawls, and produce the dump representation.
    pub fn to_dump_attack(&self, decode_record: impl Fn(&str) -> String) -> DumpAttack {
        let mut attack_vectors = self.attack_vectors.clone();
        attack_vectors.sort_by_key(|v| v.start_time);

        let mut crawls: Vec<DumpCrawl> = self
            .crawls
            .iter()
            .map(|crawl| DumpCrawl {
                host: crawl.host.clone(),
                status: crawl.status,
                time: crawl.time,
                record: decode_record(&crawl.record),
            })
            .collect();
        crawls.sort_by_key(|c| c.time);

        DumpAttack {
            ip: self.ip,
            start_time: self.start_time,
            latest_time: self.latest_time,
            attack_vectors,
            hosts: self.hosts.clone(),
            crawls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dump_name_matches_expected_format() {
        let time = chrono::Utc.with_ymd_and_hms(2024, 3, 7, 13, 5, 0).unwrap();
        assert_eq!(name_for(time), "data-telescope-crawler-dos-202403071305");
    }
}
