//! PTR-record reverse DNS lookup, the fallback data source once the common-crawl DB has
//! nothing for an IP. Grounded in `doscrawler/hosts/models.py`'s `get_names_reverse_dns`
//! (`socket.gethostbyaddr`), reimplemented against `hickory_resolver` since the standard
//! library exposes no reverse-lookup API.

use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;

#[async_trait]
pub trait ReverseDnsLookup: Send + Sync {
    /// Names found. Empty on NXDOMAIN/any resolution error (herror-equivalent): the caller
    /// falls back to `[ip]`, exactly as `get_names_reverse_dns` returns `[]` on `socket.herror`.
    async fn names_for(&self, ip: Ipv4Addr) -> Vec<String>;
}

pub struct SystemReverseDnsLookup {
    resolver: TokioAsyncResolver,
}

impl SystemReverseDnsLookup {
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }
}

impl Default for SystemReverseDnsLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReverseDnsLookup for SystemReverseDnsLookup {
    async fn names_for(&self, ip: Ipv4Addr) -> Vec<String> {
        match self.resolver.reverse_lookup(IpAddr::V4(ip)).await {
            Ok(lookup) => {
                let mut names: Vec<String> = lookup
                    .iter()
                    .map(|name| name.to_string().trim_end_matches('.').to_string())
                    .collect();
                names.sort();
                names.dedup();
                names
            }
            Err(err) => {
                log::debug!("reverse DNS lookup failed for {ip}: {err}");
                Vec::new()
            }
        }
    }
}
