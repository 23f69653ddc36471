// src/core/scanner/hosting_scanner.rs

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AuditConfig;
use crate::core::domain::AuditTarget;
use crate::core::errors::ProbeError;
use crate::core::models::{ProbeContext, ProbeKind, ProbeResult, SectionBuilder, SectionData, fields};
use crate::core::net::http::header_text;
use crate::core::probe::{Probe, ProbeEnv};
use crate::core::scanner::{Budget, root_headers};

/// Per-lookup cap inside the hosting probe.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the site is served from: addresses, server headers, reverse DNS and, when WHOIS
/// brought none, the domain's nameservers. The provider label is added at assembly.
pub struct HostingProbe;

#[async_trait]
impl Probe for HostingProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Hosting
    }

    fn deadline(&self, config: &AuditConfig) -> Duration {
        config.probes.hosting()
    }

    async fn run(&self, target: &AuditTarget, ctx: &ProbeContext, env: &ProbeEnv, budget: Duration) -> ProbeResult {
        let budget = Budget::new(budget);
        let domain = target.as_str();
        info!(target = %target, "Starting hosting scan.");

        let (addresses, headers, nameservers) = tokio::join!(
            resolve_addresses(env, domain, budget),
            root_headers(&env.http, domain, budget.remaining()),
            lookup_nameservers(env, domain, ctx, budget),
        );

        let headers = headers
            .map_err(|e| debug!(target = %target, error = %e, "No response headers for hosting scan."))
            .ok();
        let server = headers.as_ref().and_then(|h| header_text(h, "server"));
        let powered_by = headers.as_ref().and_then(|h| header_text(h, "x-powered-by"));

        if addresses.is_empty() && server.is_none() {
            return Err(ProbeError::Empty(format!("{domain} did not resolve and sent no server header")));
        }

        let reverse = match addresses.first() {
            Some(ip) => reverse_dns(env, *ip, budget).await,
            None => None,
        };

        let facts = HostingFacts {
            addresses,
            server,
            powered_by,
            reverse,
            resolver: env.config.resolver.nameservers.clone(),
            nameservers,
        };
        info!(target = %target, ips = facts.addresses.len(), server = ?facts.server, "Hosting scan finished.");
        Ok(hosting_section(facts))
    }
}

struct HostingFacts {
    addresses: Vec<IpAddr>,
    server: Option<String>,
    powered_by: Option<String>,
    reverse: Option<String>,
    resolver: Vec<String>,
    nameservers: Vec<String>,
}

fn hosting_section(facts: HostingFacts) -> SectionData {
    SectionBuilder::new()
        .maybe_text(fields::IP_ADDRESS, facts.addresses.first().map(IpAddr::to_string))
        .list("IP Addresses", facts.addresses.iter().map(IpAddr::to_string))
        .maybe_text(fields::SERVER, facts.server)
        .maybe_text("Powered By", facts.powered_by)
        .maybe_text("Reverse DNS", facts.reverse)
        .text("Resolver", facts.resolver.join(", "))
        .list(fields::NAME_SERVERS, facts.nameservers)
        .build()
}

/// A records from the configured resolver, falling back to the system resolver.
async fn resolve_addresses(env: &ProbeEnv, domain: &str, budget: Budget) -> Vec<IpAddr> {
    match budget.within(LOOKUP_TIMEOUT, env.resolver.ipv4_lookup(domain)).await {
        Some(Ok(answer)) => {
            let ips: Vec<IpAddr> = answer.iter().map(|a| IpAddr::V4(a.0)).collect();
            if !ips.is_empty() {
                return ips;
            }
        }
        Some(Err(e)) => debug!(domain, error = %e, "A lookup failed, trying the system resolver."),
        None => debug!(domain, "A lookup timed out, trying the system resolver."),
    }

    match budget.within(LOOKUP_TIMEOUT, tokio::net::lookup_host((domain, 0))).await {
        Some(Ok(addrs)) => {
            let mut ips: Vec<IpAddr> = Vec::new();
            for addr in addrs {
                if !ips.contains(&addr.ip()) {
                    ips.push(addr.ip());
                }
            }
            ips
        }
        Some(Err(e)) => {
            warn!(domain, error = %e, "System resolver could not resolve domain.");
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// NS records, looked up only when WHOIS did not supply any.
async fn lookup_nameservers(env: &ProbeEnv, domain: &str, ctx: &ProbeContext, budget: Budget) -> Vec<String> {
    if !ctx.nameservers.is_empty() {
        return Vec::new();
    }
    match budget.within(LOOKUP_TIMEOUT, env.resolver.ns_lookup(domain)).await {
        Some(Ok(answer)) => answer.iter().map(|ns| trim_dot(&ns.to_string())).collect(),
        Some(Err(e)) => {
            debug!(domain, error = %e, "NS lookup failed.");
            Vec::new()
        }
        None => Vec::new(),
    }
}

async fn reverse_dns(env: &ProbeEnv, ip: IpAddr, budget: Budget) -> Option<String> {
    match budget.within(LOOKUP_TIMEOUT, env.resolver.reverse_lookup(ip)).await? {
        Ok(answer) => answer.iter().next().map(|ptr| trim_dot(&ptr.to_string())),
        Err(e) => {
            debug!(ip = %ip, error = %e, "Reverse lookup failed.");
            None
        }
    }
}

fn trim_dot(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn facts() -> HostingFacts {
        HostingFacts {
            addresses: vec![IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)), IpAddr::V4(Ipv4Addr::new(93, 184, 216, 35))],
            server: Some("ECS (dcb/7F83)".into()),
            powered_by: None,
            reverse: Some("edge.example.net".into()),
            resolver: vec!["8.8.8.8".into(), "1.1.1.1".into()],
            nameservers: Vec::new(),
        }
    }

    #[test]
    fn first_address_is_the_primary_ip() {
        let section = hosting_section(facts());
        assert_eq!(section[fields::IP_ADDRESS], "93.184.216.34");
        assert_eq!(section["IP Addresses"].as_array().unwrap().len(), 2);
        assert_eq!(section[fields::SERVER], "ECS (dcb/7F83)");
        assert_eq!(section["Resolver"], "8.8.8.8, 1.1.1.1");
        assert!(!section.contains_key("Powered By"));
    }

    #[test]
    fn hosting_section_never_guesses_a_provider() {
        assert!(!hosting_section(facts()).contains_key(fields::PROVIDER));
    }

    #[test]
    fn names_lose_their_trailing_dot() {
        assert_eq!(trim_dot("NS1.Example.COM."), "ns1.example.com");
    }
}
