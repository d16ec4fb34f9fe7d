#[derive(Debug, thiserror::Error)]
pub enum MergerError {
    #[error("table or topic operation failed: {0}")]
    Broker(#[from] doscrawler_broker::BrokerError),
    #[error("attack vector is malformed: {0}")]
    Decode(#[from] doscrawler_model::WireDecodeError),
}
