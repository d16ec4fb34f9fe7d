//! Consistent-key-to-partition hashing.
//!
//! A real broker's consumer-group protocol assigns a partition's keys to exactly one
//! worker; this standalone build runs every partition in one process (§5), so this hash is
//! what actually pins a key to the `tokio::task` that owns it.

use std::hash::{Hash, Hasher};

/// FNV-1a: fast, stable across runs (unlike `DefaultHasher`, which is randomized per
/// process), and the changelog depends on the same key always landing on the same partition.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    let mut hasher = Fnv1a::default();
    key.hash(&mut hasher);
    (hasher.finish() % u64::from(partitions)) as u32
}

struct Fnv1a(u64);

impl Default for Fnv1a {
    fn default() -> Self {
        Self(0xcbf29ce484222325)
    }
}

impl Hasher for Fnv1a {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(0x100000001b3);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_always_lands_on_the_same_partition() {
        let p1 = partition_for("203.0.113.9", 8);
        let p2 = partition_for("203.0.113.9", 8);
        assert_eq!(p1, p2);
        assert!(p1 < 8);
    }

    #[test]
    fn distributes_across_partitions() {
        let partitions = 8;
        let mut seen = std::collections::HashSet::new();
        for i in 0..200 {
            seen.insert(partition_for(&format!("192.0.2.{i}"), partitions));
        }
        assert!(seen.len() > 1, "all keys landed on the same partition");
    }
}
