//! SRV lookups over DNS.
//!
//! # Responsibilities
//! - Ask a DNS server (Consul's DNS interface by default) for a service's SRV records
//! - Resolve every SRV target to an address
//!
//! # Design Decisions
//! - NXDOMAIN and empty answers are an empty list, like an unknown service elsewhere
//! - Targets without an address record are skipped, not fatal
//! - One attempt per query; the resolver already bounds the whole call

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{
    NameServerConfigGroup, ResolverConfig as NameServers, ResolverOpts,
};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::TokioAsyncResolver;

use crate::config::DnsConfig;
use crate::discovery::types::{ProviderError, ProviderResult, SrvRecord};
use crate::discovery::DnsProvider;

/// DNS provider that queries `SRV` records and resolves their targets.
pub struct SrvDnsProvider {
    resolver: TokioAsyncResolver,
    template: String,
}

impl SrvDnsProvider {
    /// Build a resolver for the nameserver in `config`, or the system
    /// resolver when none is set.
    pub fn new(config: &DnsConfig) -> ProviderResult<Self> {
        let (servers, mut opts) = if config.nameserver.is_empty() {
            hickory_resolver::system_conf::read_system_conf()?
        } else {
            let addr: SocketAddr = config.nameserver.parse().map_err(|e| {
                ProviderError::InvalidAddress(format!("'{}': {}", config.nameserver, e))
            })?;
            let group = NameServerConfigGroup::from_ips_clear(&[addr.ip()], addr.port(), true);
            (NameServers::from_parts(None, Vec::new(), group), ResolverOpts::default())
        };
        opts.timeout = Duration::from_millis(config.timeout_ms);
        opts.attempts = 1;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(servers, opts),
            template: config.domain_template.clone(),
        })
    }

    /// Fully qualified query name for `service`.
    fn query_name(&self, service: &str) -> String {
        let mut name = self.template.replace("{service}", service);
        if !name.ends_with('.') {
            name.push('.');
        }
        name
    }
}

fn is_empty_answer(err: &ResolveError) -> bool {
    matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

#[async_trait]
impl DnsProvider for SrvDnsProvider {
    async fn resolve_dns(&self, service: &str) -> ProviderResult<Vec<SrvRecord>> {
        let query = self.query_name(service);
        let lookup = match self.resolver.srv_lookup(query.as_str()).await {
            Ok(lookup) => lookup,
            Err(e) if is_empty_answer(&e) => {
                tracing::debug!(query = %query, "No SRV records");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for srv in lookup.iter() {
            let target = srv.target();
            let ip = match self.resolver.lookup_ip(target.clone()).await {
                Ok(ips) => ips.iter().next(),
                Err(e) if is_empty_answer(&e) => None,
                Err(e) => return Err(e.into()),
            };
            let Some(ip) = ip else {
                tracing::debug!(query = %query, target = %target, "SRV target has no address, skipping");
                continue;
            };

            records.push(SrvRecord {
                name: target.to_utf8().trim_end_matches('.').to_string(),
                ip: ip.to_string(),
                port: srv.port(),
                priority: srv.priority(),
                weight: srv.weight(),
            });
        }

        tracing::debug!(query = %query, records = records.len(), "SRV lookup answered");
        Ok(records)
    }
}
