#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("common-crawl lookup DB query failed: {0}")]
    Db(#[from] sqlx::Error),
    #[error("table operation failed: {0}")]
    Broker(#[from] doscrawler_broker::BrokerError),
}
