//! Host Resolver (§4.3): victim IP → set of host names, via a two-tier lookup cached with
//! TTL in the `host` table.

pub mod error;
pub mod lookup;
pub mod resolve;
pub mod reverse_dns;

pub use error::ResolverError;
pub use lookup::{CommonCrawlLookup, PgCommonCrawlLookup};
pub use resolve::{clean_expired, HostResolver};
pub use reverse_dns::{ReverseDnsLookup, SystemReverseDnsLookup};
