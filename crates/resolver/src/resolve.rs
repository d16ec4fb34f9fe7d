//! §4.3: `resolve(ip) -> HostGroup`, the Host Resolver's public operation.

use std::net::Ipv4Addr;
use std::sync::Arc;

use doscrawler_broker::Table;
use doscrawler_model::{host, HostGroup, Settings};
use tokio::sync::Semaphore;

use crate::error::ResolverError;
use crate::lookup::CommonCrawlLookup;
use crate::reverse_dns::ReverseDnsLookup;

/// Datasources are tried in order; the first with a non-empty result wins (§4.3 step 2).
const DATASOURCE_COMMON_CRAWL: &str = "common_crawl";
const DATASOURCE_REVERSE_DNS: &str = "reverse_dns_lookup";
const DATASOURCE_NONE: &str = "none";

pub struct HostResolver<C, D> {
    settings: Settings,
    host_table: Arc<Table<HostGroup>>,
    common_crawl: C,
    reverse_dns: D,
    /// Bounds in-flight `resolve` calls to `HOST_CONCURRENCY` (§4.3, §5).
    concurrency: Semaphore,
}

impl<C, D> HostResolver<C, D>
where
    C: CommonCrawlLookup,
    D: ReverseDnsLookup,
{
    pub fn new(settings: Settings, host_table: Arc<Table<HostGroup>>, common_crawl: C, reverse_dns: D) -> Self {
        let permits = settings.host_concurrency;
        Self {
            settings,
            host_table,
            common_crawl,
            reverse_dns,
            concurrency: Semaphore::new(permits),
        }
    }

    pub async fn resolve(&self, ip: Ipv4Addr) -> Result<HostGroup, ResolverError> {
        let _permit = self
            .concurrency
            .acquire()
            .await
            .expect("semaphore is never closed while the resolver is alive");

        let key = ip.to_string();
        let now = doscrawler_model::time::now();

        if let Some(cached) = self.host_table.get(&key).await {
            if cached.is_valid(&self.settings, now) {
                return Ok(cached);
            }
        }

        let (names, datasource) = self.resolve_names(ip).await?;
        let sampled = host::sample_names(ip, names, self.settings.host_max_num);

        if let Err(err) = self.common_crawl.record_lookup(ip, datasource).await {
            log::warn!("failed to record lookup audit row for {ip}: {err}");
        }

        let group = HostGroup::new(ip, sampled, now);
        self.host_table.put(key, group.clone()).await?;
        Ok(group)
    }

    async fn resolve_names(&self, ip: Ipv4Addr) -> Result<(Vec<String>, &'static str), ResolverError> {
        let common_crawl_names = self.common_crawl.domains_for(ip).await?;
        if !common_crawl_names.is_empty() {
            return Ok((common_crawl_names, DATASOURCE_COMMON_CRAWL));
        }

        let reverse_dns_names = self.reverse_dns.names_for(ip).await;
        if !reverse_dns_names.is_empty() {
            return Ok((reverse_dns_names, DATASOURCE_REVERSE_DNS));
        }

        Ok((vec![ip.to_string()], DATASOURCE_NONE))
    }
}

/// §4 "Timers & Janitors": periodic sweep removing `host[ip]` entries past
/// `HOST_CACHE_INTERVAL`, run every `HOST_CLEAN_TIMER` seconds.
pub async fn clean_expired(host_table: &Table<HostGroup>, settings: &Settings) -> Result<usize, ResolverError> {
    let now = doscrawler_model::time::now();
    let mut removed = 0;
    for key in host_table.keys().await {
        if let Some(group) = host_table.get(&key).await {
            if !group.is_valid(settings, now) {
                host_table.delete(&key).await?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doscrawler_broker::MemoryChangelogSink;
    use std::sync::Mutex;

    struct FakeCommonCrawl {
        domains: Vec<String>,
        recorded: Mutex<Vec<(Ipv4Addr, String)>>,
    }

    #[async_trait::async_trait]
    impl CommonCrawlLookup for FakeCommonCrawl {
        async fn domains_for(&self, _ip: Ipv4Addr) -> Result<Vec<String>, ResolverError> {
            Ok(self.domains.clone())
        }

        async fn record_lookup(&self, ip: Ipv4Addr, datasource: &str) -> Result<(), ResolverError> {
            self.recorded.lock().unwrap().push((ip, datasource.to_string()));
            Ok(())
        }
    }

    struct FakeReverseDns {
        names: Vec<String>,
    }

    #[async_trait::async_trait]
    impl ReverseDnsLookup for FakeReverseDns {
        async fn names_for(&self, _ip: Ipv4Addr) -> Vec<String> {
            self.names.clone()
        }
    }

    async fn host_table() -> Arc<Table<HostGroup>> {
        let sink = Arc::new(MemoryChangelogSink::default());
        Arc::new(Table::recover(sink).await.unwrap())
    }

    #[tokio::test]
    async fn prefers_common_crawl_over_reverse_dns() {
        let resolver = HostResolver::new(
            Settings::default(),
            host_table().await,
            FakeCommonCrawl {
                domains: vec!["victim.example".to_string()],
                recorded: Mutex::new(Vec::new()),
            },
            FakeReverseDns {
                names: vec!["fallback.example".to_string()],
            },
        );

        let ip: Ipv4Addr = "203.0.113.9".parse().unwrap();
        let group = resolver.resolve(ip).await.unwrap();
        assert_eq!(group.names, vec!["victim.example".to_string()]);
    }

    #[tokio::test]
    async fn falls_back_to_ip_when_both_sources_are_empty() {
        let resolver = HostResolver::new(
            Settings::default(),
            host_table().await,
            FakeCommonCrawl {
                domains: Vec::new(),
                recorded: Mutex::new(Vec::new()),
            },
            FakeReverseDns { names: Vec::new() },
        );

        let ip: Ipv4Addr = "203.0.113.9".parse().unwrap();
        let group = resolver.resolve(ip).await.unwrap();
        assert_eq!(group.names, vec![ip.to_string()]);
    }

    #[tokio::test]
    async fn second_resolve_reuses_the_cached_group() {
        let common_crawl = FakeCommonCrawl {
            domains: vec!["victim.example".to_string()],
            recorded: Mutex::new(Vec::new()),
        };
        let resolver = HostResolver::new(
            Settings::default(),
            host_table().await,
            common_crawl,
            FakeReverseDns { names: Vec::new() },
        );

        let ip: Ipv4Addr = "203.0.113.9".parse().unwrap();
        resolver.resolve(ip).await.unwrap();
        resolver.resolve(ip).await.unwrap();

        // both resolutions recorded a lookup only if the cache was bypassed twice; here we
        // only assert the second call succeeds and returns the same names.
        let group = resolver.resolve(ip).await.unwrap();
        assert_eq!(group.names, vec!["victim.example".to_string()]);
    }
}
