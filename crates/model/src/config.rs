//! Flattened, environment-overridable configuration, mirroring
//! `doscrawler/settings/{development,production}.py`.
//!
//! Every field can be overridden by an environment variable of the same name. There is no
//! dynamic attribute access: the record is a plain struct with explicit fields.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub debug: bool,
    pub broker: String,
    pub store: String,
    pub processing_guarantee: ProcessingGuarantee,
    pub topic_partitions: u32,

    pub attack_merge_interval: i64,
    pub attack_ttl: i64,
    pub attack_concurrency: usize,
    pub attack_random_attack_interval: u64,

    pub host_cache_interval: i64,
    pub host_concurrency: usize,
    pub host_max_num: usize,
    pub host_clean_timer: u64,

    pub crawl_concurrency: usize,
    pub crawl_retries: u32,
    pub crawl_retries_backoff: i64,
    pub crawl_repeat_interval: i64,
    pub crawl_request_header: HashMap<String, String>,
    pub crawl_request_timeout: u64,
    pub crawl_body_max_bytes: usize,
    pub crawl_cache_interval: i64,
    pub crawl_get_wait_timer: u64,
    pub crawl_clean_timer: u64,

    pub retention_interval: i64,
    pub dump_cron: String,
    pub dump_dir: String,
    pub dump_compress_level: u32,
    pub dump_clean_timer: u64,

    pub slack_token: String,
    pub slack_channel: String,

    /// Postgres DSN for the common-crawl lookup database. Ambient addition: the external
    /// DB is an out-of-scope collaborator, but a concrete connection string is needed to
    /// stand one up locally / in tests.
    pub dns_db_url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessingGuarantee {
    AtLeastOnce,
    ExactlyOnce,
}

impl FromStr for ProcessingGuarantee {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "at_least_once" => Ok(Self::AtLeastOnce),
            "exactly_once" => Ok(Self::ExactlyOnce),
            other => Err(format!("unknown processing guarantee {other}")),
        }
    }
}

pub const CRAWL_CHUNK_BYTES: usize = 20 * 1024;

impl Default for Settings {
    /// Development defaults, mirroring `doscrawler/settings/development.py`.
    fn default() -> Self {
        Self {
            debug: true,
            broker: "memory://localhost".to_string(),
            store: "memory://".to_string(),
            processing_guarantee: ProcessingGuarantee::AtLeastOnce,
            topic_partitions: 8,

            attack_merge_interval: 1800,
            attack_ttl: 10800,
            attack_concurrency: 2,
            attack_random_attack_interval: 30,

            host_cache_interval: 3600,
            host_concurrency: 2,
            host_max_num: 10,
            host_clean_timer: 3600,

            crawl_concurrency: 20,
            crawl_retries: 3,
            crawl_retries_backoff: 20,
            crawl_repeat_interval: 1200,
            crawl_request_header: HashMap::new(),
            crawl_request_timeout: 20,
            crawl_body_max_bytes: 2 * 1024 * 1024,
            crawl_cache_interval: 60,
            crawl_get_wait_timer: 5,
            crawl_clean_timer: 3600,

            retention_interval: 86400,
            dump_cron: "0 0 * * * *".to_string(),
            dump_dir: "data/".to_string(),
            dump_compress_level: 7,
            dump_clean_timer: 3600,

            slack_token: String::new(),
            slack_channel: String::new(),

            dns_db_url: "postgres://localhost/doscrawler".to_string(),
        }
    }
}

impl Settings {
    /// Production preset, mirroring `doscrawler/settings/production.py`. Only the values
    /// that differ from the development defaults are listed.
    pub fn production() -> Self {
        Self {
            debug: false,
            store: "rocksdb://".to_string(),
            processing_guarantee: ProcessingGuarantee::ExactlyOnce,
            topic_partitions: 1,
            ..Self::default()
        }
    }

    /// Apply any `UPPER_SNAKE_CASE` environment variable overrides for the scalar fields.
    /// Unset variables leave the existing value untouched; malformed values are reported
    /// back as an error listing every field that failed to parse.
    pub fn apply_env_overrides(mut self) -> Result<Self, String> {
        let mut errors = Vec::new();

        macro_rules! override_parsed {
            ($field:ident, $env_name:literal) => {
                if let Ok(value) = env::var($env_name) {
                    match value.parse() {
                        Ok(parsed) => self.$field = parsed,
                        Err(_) => errors.push(format!("{}={value:?} is not valid", $env_name)),
                    }
                }
            };
        }

        override_parsed!(debug, "DEBUG");
        if let Ok(value) = env::var("BROKER") {
            self.broker = value;
        }
        if let Ok(value) = env::var("STORE") {
            self.store = value;
        }
        if let Ok(value) = env::var("PROCESSING_GUARANTEE") {
            match value.parse() {
                Ok(parsed) => self.processing_guarantee = parsed,
                Err(err) => errors.push(err),
            }
        }
        override_parsed!(topic_partitions, "TOPIC_PARTITIONS");
        override_parsed!(attack_merge_interval, "ATTACK_MERGE_INTERVAL");
        override_parsed!(attack_ttl, "ATTACK_TTL");
        override_parsed!(attack_concurrency, "ATTACK_CONCURRENCY");
        override_parsed!(host_cache_interval, "HOST_CACHE_INTERVAL");
        override_parsed!(host_concurrency, "HOST_CONCURRENCY");
        override_parsed!(host_max_num, "HOST_MAX_NUM");
        override_parsed!(host_clean_timer, "HOST_CLEAN_TIMER");
        override_parsed!(crawl_concurrency, "CRAWL_CONCURRENCY");
        override_parsed!(crawl_retries, "CRAWL_RETRIES");
        override_parsed!(crawl_retries_backoff, "CRAWL_RETRIES_BACKOFF");
        override_parsed!(crawl_repeat_interval, "CRAWL_REPEAT_INTERVAL");
        override_parsed!(crawl_request_timeout, "CRAWL_REQUEST_TIMEOUT");
        override_parsed!(crawl_body_max_bytes, "CRAWL_BODY_MAX_BYTES");
        override_parsed!(crawl_cache_interval, "CRAWL_CACHE_INTERVAL");
        override_parsed!(crawl_get_wait_timer, "CRAWL_GET_WAIT_TIMER");
        override_parsed!(crawl_clean_timer, "CRAWL_CLEAN_TIMER");
        override_parsed!(retention_interval, "RETENTION_INTERVAL");
        if let Ok(value) = env::var("DUMP_CRON") {
            self.dump_cron = value;
        }
        if let Ok(value) = env::var("DUMP_DIR") {
            self.dump_dir = value;
        }
        override_parsed!(dump_compress_level, "DUMP_COMPRESS_LEVEL");
        override_parsed!(dump_clean_timer, "DUMP_CLEAN_TIMER");
        if let Ok(value) = env::var("SLACK_TOKEN") {
            self.slack_token = value;
        }
        if let Ok(value) = env::var("SLACK_CHANNEL") {
            self.slack_channel = value;
        }
        if let Ok(value) = env::var("DNS_DB_URL") {
            self.dns_db_url = value;
        }

        if errors.is_empty() {
            Ok(self)
        } else {
            Err(errors.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_differs_from_development_only_where_documented() {
        let dev = Settings::default();
        let prod = Settings::production();
        assert_ne!(dev.store, prod.store);
        assert_eq!(dev.attack_ttl, prod.attack_ttl);
    }

    #[test]
    fn processing_guarantee_parses_known_values() {
        assert_eq!(
            "at_least_once".parse::<ProcessingGuarantee>().unwrap(),
            ProcessingGuarantee::AtLeastOnce
        );
        assert!("bogus".parse::<ProcessingGuarantee>().is_err());
    }
}
