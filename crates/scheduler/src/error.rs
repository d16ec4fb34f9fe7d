#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("table or topic operation failed: {0}")]
    Broker(#[from] doscrawler_broker::BrokerError),
}
