//! Attack Merger (§4.2): joins raw attack vectors into Attack sessions keyed by victim IP
//! and session start, through a merge-candidate index per IP.

pub mod error;
pub mod ingest;
pub mod merge;
pub mod message;

pub use error::MergerError;
pub use ingest::ingest_vector;
pub use merge::AttackMerger;
pub use message::{attack_key, ChangeAttack};
