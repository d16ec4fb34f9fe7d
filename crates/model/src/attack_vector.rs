//! `AttackVector`: one telescope-observed event describing a portion of an attack.
//!
//! Grounded in `doscrawler/attacks/models.py::AttackVector`. Produced by upstream, consumed
//! once, never mutated.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackVector {
    pub target_ip: Ipv4Addr,
    pub start_time: Timestamp,
    pub latest_time: Timestamp,
    pub bin_time: Timestamp,

    pub attacker_ip_cnt: u32,
    pub attack_port_cnt: u32,
    pub target_port_cnt: u32,
    pub packet_cnt: u64,
    pub byte_cnt: u64,
    pub initial_packet_len: u32,
    pub target_protocol: u8,
    pub icmp_mismatches: u32,
    pub max_ppm_interval: u32,
}

/// Composite key an `AttackVector` is de-duplicated by within an `Attack`.
pub type AttackVectorKey = (Timestamp, Timestamp);

impl AttackVector {
    pub fn key(&self) -> AttackVectorKey {
        (self.start_time, self.latest_time)
    }
}

/// Mirrors the upstream wire field names from §6, decoded from a 32-bit IP and
/// `(seconds, microseconds)` time pairs. The Avro decode step itself is out of scope; this
/// type is the seam a real decoder plugs into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireAttackVector {
    pub target_ip: u32,
    pub start_time_sec: i64,
    pub start_time_usec: u32,
    pub latest_time_sec: i64,
    pub latest_time_usec: u32,
    pub bin_timestamp_sec: i64,
    pub bin_timestamp_usec: u32,
    pub initial_packet_len: u32,
    pub target_protocol: u8,
    pub attacker_ip_cnt: u32,
    pub attack_port_cnt: u32,
    pub target_port_cnt: u32,
    pub packet_cnt: u64,
    pub icmp_mismatches: u32,
    pub byte_cnt: u64,
    pub max_ppm_interval: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum WireDecodeError {
    #[error("attack vector has an invalid start_time")]
    InvalidStartTime,
    #[error("attack vector has an invalid latest_time")]
    InvalidLatestTime,
    #[error("attack vector has an invalid bin_time")]
    InvalidBinTime,
}

impl TryFrom<WireAttackVector> for AttackVector {
    type Error = WireDecodeError;

    fn try_from(wire: WireAttackVector) -> Result<Self, Self::Error> {
        let start_time = crate::time::from_seconds_and_micros(wire.start_time_sec, wire.start_time_usec)
            .ok_or(WireDecodeError::InvalidStartTime)?;
        let latest_time =
            crate::time::from_seconds_and_micros(wire.latest_time_sec, wire.latest_time_usec)
                .ok_or(WireDecodeError::InvalidLatestTime)?;
        let bin_time =
            crate::time::from_seconds_and_micros(wire.bin_timestamp_sec, wire.bin_timestamp_usec)
                .ok_or(WireDecodeError::InvalidBinTime)?;

        Ok(AttackVector {
            target_ip: Ipv4Addr::from(wire.target_ip),
            start_time,
            latest_time,
            bin_time,
            attacker_ip_cnt: wire.attacker_ip_cnt,
            attack_port_cnt: wire.attack_port_cnt,
            target_port_cnt: wire.target_port_cnt,
            packet_cnt: wire.packet_cnt,
            byte_cnt: wire.byte_cnt,
            initial_packet_len: wire.initial_packet_len,
            target_protocol: wire.target_protocol,
            icmp_mismatches: wire.icmp_mismatches,
            max_ppm_interval: wire.max_ppm_interval,
        })
    }
}
