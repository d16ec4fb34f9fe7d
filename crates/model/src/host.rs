//! `HostGroup`: the set of host names resolved for a given IP, with a freshness timestamp.
//!
//! Grounded in `doscrawler/hosts/models.py::HostGroup`.

use std::net::Ipv4Addr;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::time::{self, Timestamp};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostGroup {
    pub ip: Ipv4Addr,
    pub names: Vec<String>,
    pub time: Timestamp,
}

impl HostGroup {
    pub fn new(ip: Ipv4Addr, names: Vec<String>, time: Timestamp) -> Self {
        Self { ip, names, time }
    }

    /// §3: valid iff `time + HOST_CACHE_INTERVAL > now`.
    pub fn is_valid(&self, settings: &Settings, at: Timestamp) -> bool {
        let expires_at = self.time + time::seconds(settings.host_cache_interval);
        expires_at > at
    }
}

/// §4.3 step 4 / §8 property 6: deterministic sampling seeded by `ip`, so repeated
/// resolutions of the same victim always cap to the same subset of names.
///
/// Grounded directly in `doscrawler/hosts/models.py`'s `random.seed(ip); random.sample(...)`.
pub fn sample_names(ip: Ipv4Addr, mut names: Vec<String>, max_num: usize) -> Vec<String> {
    if names.len() <= max_num {
        return names;
    }

    names.sort();
    let seed = u64::from(u32::from(ip));
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    names
        .choose_multiple(&mut rng, max_num)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_is_deterministic_given_ip() {
        let ip: Ipv4Addr = "192.0.2.1".parse().unwrap();
        let names: Vec<String> = (0..50).map(|i| format!("host{i}.example")).collect();

        let first = sample_names(ip, names.clone(), 10);
        let second = sample_names(ip, names, 10);

        assert_eq!(first.len(), 10);
        assert_eq!(first, second);
    }

    #[test]
    fn sampling_is_noop_when_under_the_cap() {
        let ip: Ipv4Addr = "192.0.2.1".parse().unwrap();
        let names = vec!["a.example".to_string(), "b.example".to_string()];
        let sampled = sample_names(ip, names.clone(), 10);
        assert_eq!(sampled, names);
    }
}
