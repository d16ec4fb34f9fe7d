//! In-process partitioned broker: a stand-in for the out-of-scope Kafka-compatible broker.
//!
//! Provides the two primitives §4.1 requires: [`topic::PartitionedTopic`] (typed
//! publish/subscribe with per-key ordering within a partition) and [`table::Table`]
//! (changelog-backed `key -> value` state), over `tokio::sync::mpsc` so the pipeline runs
//! and is tested without a real cluster.

pub mod changelog;
pub mod error;
pub mod partition;
pub mod table;
pub mod topic;

pub use changelog::{ChangelogEntry, ChangelogSink, MemoryChangelogSink};
pub use error::BrokerError;
pub use partition::partition_for;
pub use table::Table;
pub use topic::{Envelope, PartitionedTopic};

/// Identifies the concrete broker backend a deployment is pointed at (the `BROKER` setting,
/// e.g. `memory://localhost` in development or a real `kafka://` DSN in production). This
/// build only ever constructs [`topic::PartitionedTopic`]/[`table::Table`] directly, since
/// the real broker's wire protocol and consumer-group rebalancing are out of scope, but a
/// production client would implement this trait against its DSN.
pub trait BrokerClient: Send + Sync {
    /// The DSN this client is connected to, e.g. `memory://localhost`.
    fn broker_url(&self) -> &str;
}

/// The only [`BrokerClient`] this build ships: everything lives in this process's memory,
/// matching the development default `BROKER=memory://localhost`.
pub struct InProcessBroker {
    url: String,
}

impl InProcessBroker {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl BrokerClient for InProcessBroker {
    fn broker_url(&self) -> &str {
        &self.url
    }
}
