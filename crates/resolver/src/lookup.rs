//! The external common-crawl lookup database: `ip -> domains`, plus the best-effort
//! `lookup_count` audit row. Grounded in `doscrawler/hosts/models.py`'s
//! `get_names_common_crawl`/`update_lookup_count`, reimplemented against `sqlx::PgPool`
//! instead of a raw `psycopg2` cursor.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::ResolverError;

#[async_trait]
pub trait CommonCrawlLookup: Send + Sync {
    /// `SELECT domain FROM common_crawl WHERE ip = $1`.
    async fn domains_for(&self, ip: Ipv4Addr) -> Result<Vec<String>, ResolverError>;

    /// `INSERT INTO lookup_count (datetime, ip, datasource) VALUES (...)`. Failures are the
    /// caller's to log and swallow; this is an audit trail, not load-bearing state.
    async fn record_lookup(&self, ip: Ipv4Addr, datasource: &str) -> Result<(), ResolverError>;
}

pub struct PgCommonCrawlLookup {
    pool: sqlx::PgPool,
}

impl PgCommonCrawlLookup {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(dns_db_url: &str) -> Result<Self, ResolverError> {
        let pool = sqlx::PgPool::connect(dns_db_url).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CommonCrawlLookup for PgCommonCrawlLookup {
    async fn domains_for(&self, ip: Ipv4Addr) -> Result<Vec<String>, ResolverError> {
        let ip_text = ip.to_string();
        let rows: Vec<(String,)> = sqlx::query_as("SELECT domain FROM common_crawl WHERE ip = $1")
            .bind(ip_text)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(domain,)| domain).collect())
    }

    async fn record_lookup(&self, ip: Ipv4Addr, datasource: &str) -> Result<(), ResolverError> {
        sqlx::query("INSERT INTO lookup_count (datetime, ip, datasource) VALUES ($1, $2, $3)")
            .bind(Utc::now())
            .bind(ip.to_string())
            .bind(datasource)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
