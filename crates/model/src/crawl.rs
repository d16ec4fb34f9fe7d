//! `Crawl`: one HTTP fetch attempt against one host, stored as a WARC-record pair.
//!
//! Grounded in `doscrawler/crawls/models.py::Crawl`.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::config::Settings;
use crate::time::{self, Timestamp};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Crawl {
    pub host: String,
    pub status: i32,
    pub time: Timestamp,
    /// Gzip-compressed, base64-encoded WARC request/response (or request/metadata) pair.
    pub record: String,
}

/// Composite key a `Crawl` is de-duplicated by within an `Attack`.
pub type CrawlKey = (String, Timestamp);

impl Crawl {
    pub fn key(&self) -> CrawlKey {
        (self.host.clone(), self.time)
    }

    /// §3: success iff `status > 0`.
    pub fn is_success(&self) -> bool {
        self.status > 0
    }

    /// §3: valid iff recent enough: successes live `CRAWL_CACHE_INTERVAL`, failures live
    /// `CRAWL_RETRIES_BACKOFF` so retries aren't short-circuited by the cache.
    pub fn is_valid(&self, settings: &Settings, at: Timestamp) -> bool {
        let ttl_seconds = if self.is_success() {
            settings.crawl_cache_interval
        } else {
            settings.crawl_retries_backoff
        };
        let expires_at = self.time + time::seconds(ttl_seconds);
        expires_at > at
    }
}

/// §4.4: the kind of crawl scheduled next for an attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
pub enum CrawlKind {
    Crawl,
    RetryFirst,
    Retry,
    Repeat,
}
