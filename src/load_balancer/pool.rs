//! Candidate pool reconciliation.
//!
//! # Responsibilities
//! - Order SRV records by priority and extract the preferred tier
//! - Intersect directory instances with DNS records by address
//! - Narrow candidates to the preferred tier without ever emptying the pool
//! - Resolve the endpoint (DNS port preferred) for a chosen instance

use std::collections::{HashMap, HashSet};

use crate::discovery::{Endpoint, ServiceInstance, SrvRecord};

/// DNS attributes attached to a directory instance through its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsAttributes {
    pub weight: u16,
    pub port: u16,
    pub priority: u16,
}

/// Stable sort, lowest (most preferred) priority first.
pub fn sort_by_priority(records: &mut [SrvRecord]) {
    records.sort_by_key(|r| r.priority);
}

/// Records sharing the minimum priority value. Expects priority-sorted input.
pub fn top_priority_tier(sorted: &[SrvRecord]) -> Vec<SrvRecord> {
    match sorted.first() {
        Some(first) => sorted
            .iter()
            .take_while(|r| r.priority == first.priority)
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

/// Directory instances that DNS also knows about.
#[derive(Debug, Clone)]
pub struct CandidatePool {
    /// Every instance whose address appears in DNS.
    pub matched: Vec<ServiceInstance>,
    /// `matched` narrowed to the preferred tier (or all of `matched`).
    pub candidates: Vec<ServiceInstance>,
    /// Largest DNS weight across all records, floored at 1.
    pub max_dns_weight: f64,
    dns_by_address: HashMap<String, DnsAttributes>,
}

impl CandidatePool {
    /// Build the pool from priority-sorted `records` and their preferred `tier`.
    ///
    /// Returns `None` when no instance address matches a DNS record.
    pub fn reconcile(
        instances: &[ServiceInstance],
        records: &[SrvRecord],
        tier: &[SrvRecord],
    ) -> Option<Self> {
        let mut dns_by_address: HashMap<String, DnsAttributes> = HashMap::new();
        for record in records {
            // Several records on one address: keep the most preferred.
            dns_by_address
                .entry(record.ip.clone())
                .or_insert(DnsAttributes {
                    weight: record.weight,
                    port: record.port,
                    priority: record.priority,
                });
        }

        let matched: Vec<ServiceInstance> = instances
            .iter()
            .filter(|i| dns_by_address.contains_key(&i.address))
            .cloned()
            .collect();
        if matched.is_empty() {
            return None;
        }

        let tier_addresses: HashSet<&str> = tier.iter().map(|r| r.ip.as_str()).collect();
        let narrowed: Vec<ServiceInstance> = matched
            .iter()
            .filter(|i| tier_addresses.contains(i.address.as_str()))
            .cloned()
            .collect();
        let candidates = if narrowed.is_empty() {
            matched.clone()
        } else {
            narrowed
        };

        let max_dns_weight = records
            .iter()
            .map(|r| f64::from(r.weight))
            .fold(1.0, f64::max);

        Some(Self {
            matched,
            candidates,
            max_dns_weight,
            dns_by_address,
        })
    }

    /// DNS attributes for an instance, if its address is known.
    pub fn dns(&self, instance: &ServiceInstance) -> Option<DnsAttributes> {
        self.dns_by_address.get(&instance.address).copied()
    }

    /// DNS weight for an instance; 0 when unknown.
    pub fn dns_weight(&self, instance: &ServiceInstance) -> f64 {
        self.dns(instance).map(|d| f64::from(d.weight)).unwrap_or(0.0)
    }

    /// Endpoint for an instance, preferring the DNS-declared port.
    pub fn endpoint_for(&self, instance: &ServiceInstance) -> Endpoint {
        let port = match self.dns(instance) {
            Some(dns) if dns.port != 0 => dns.port,
            _ => instance.port,
        };
        Endpoint::new(instance.address.clone(), port)
    }

    /// Endpoints for the whole matched set.
    pub fn matched_endpoints(&self) -> Vec<Endpoint> {
        self.matched.iter().map(|i| self.endpoint_for(i)).collect()
    }
}
