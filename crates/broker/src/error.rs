#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("topic partition {0} is no longer accepting sends (consumer task gone)")]
    Closed(u32),
    #[error("changelog write failed: {0}")]
    ChangelogWrite(String),
    #[error("changelog record failed to (de)serialize: {0}")]
    Serialization(#[from] serde_json::Error),
}
