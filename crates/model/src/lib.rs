//! Shared data model for the DoS telescope crawler: the records the pipeline's topics and
//! tables carry, and the pure invariants (TTL, merge, retry scheduling) each component
//! applies to them.
//!
//! Grounded in `doscrawler/{attacks,hosts,crawls,dumps,settings}/models.py`.

pub mod attack;
pub mod attack_vector;
pub mod config;
pub mod crawl;
pub mod dump;
pub mod host;
pub mod time;
pub mod wait;

pub use attack::{Attack, AttackCandidate, AttackKey};
pub use attack_vector::{AttackVector, AttackVectorKey, WireAttackVector, WireDecodeError};
pub use config::{ProcessingGuarantee, Settings, CRAWL_CHUNK_BYTES};
pub use crawl::{Crawl, CrawlKey, CrawlKind};
pub use dump::{Dump, DumpAttack, DumpCrawl, DumpFile};
pub use host::HostGroup;
pub use time::Timestamp;
pub use wait::WaitEntry;
