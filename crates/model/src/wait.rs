//! `WaitEntry`: an Attack awaiting its next crawl moment.
//!
//! One per `(ip, start_time, hosts)` triple. Grounded in
//! `doscrawler/crawls/tables.py::wait_crawl_table` and `doscrawler/crawls/agents.py::change_wait_crawls`.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::attack::Attack;
use crate::time::Timestamp;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaitEntry {
    pub ip: Ipv4Addr,
    pub start_time: Timestamp,
    pub hosts: Vec<String>,
    /// The Attack snapshot used to compute `next_crawl_time`.
    pub attack: Attack,
}

impl WaitEntry {
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.ip,
            self.start_time.timestamp_micros(),
            self.hosts.join("/")
        )
    }
}
