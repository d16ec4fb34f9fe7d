#[derive(Debug, thiserror::Error)]
pub enum DumpWriterError {
    #[error("table or topic operation failed: {0}")]
    Broker(#[from] doscrawler_broker::BrokerError),
    #[error("{0}")]
    Decode(#[from] doscrawler_warc::DecodeError),
    #[error("failed to serialize dump: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write dump file: {0}")]
    Io(#[from] std::io::Error),
    #[error("DUMP_CRON is not a valid cron expression: {0}")]
    Cron(#[from] cron::error::Error),
}
