// src/core/assembler.rs

//! Turns raw probe outcomes into the report: cross-probe enrichment, then the
//! "omit empty" policy.

use serde_json::{Map, Value};

use crate::core::knowledge_base::SignatureTables;
use crate::core::models::{AuditReport, ProbeContext, ProbeKind, ProbeOutcome, ProbeResults, SectionData, fields};

pub fn assemble(results: &ProbeResults, tables: &SignatureTables) -> AuditReport {
    let mut report = AuditReport::default();
    for (kind, outcome) in &results.outcomes {
        let ProbeOutcome::Success(data) = outcome else { continue };
        let mut data = data.clone();
        match kind {
            ProbeKind::Hosting => enrich_hosting(&mut data, &results.context, tables),
            ProbeKind::Mx => enrich_email(&mut data, tables),
            _ => {}
        }
        let data = prune_map(data);
        if !data.is_empty() {
            report.insert(*kind, data);
        }
    }
    report
}

fn enrich_hosting(data: &mut SectionData, context: &ProbeContext, tables: &SignatureTables) {
    let own_nameservers = string_list(data.get(fields::NAME_SERVERS));
    let nameservers = if context.nameservers.is_empty() {
        &own_nameservers
    } else {
        &context.nameservers
    };
    let ip = data.get(fields::IP_ADDRESS).and_then(Value::as_str);
    let server = data.get(fields::SERVER).and_then(Value::as_str);

    if let Some(provider) = infer_provider(ip, server, nameservers, tables) {
        data.insert(fields::PROVIDER.to_string(), Value::String(provider));
    }
}

fn enrich_email(data: &mut SectionData, tables: &SignatureTables) {
    let mx = string_list(data.get(fields::MX_RECORDS));
    if let Some(provider) = infer_email_provider(&mx, tables) {
        data.insert(fields::PROVIDER.to_string(), Value::String(provider));
    }
}

/// Labels the hosting provider from the site's IP, `Server` header and nameservers.
///
/// Direct evidence (server header, IP range) is checked across the whole table before any
/// nameserver evidence, since a domain's DNS host is often not its web host. Returns the
/// generic fallback when nothing matches but an IP is known, and `None` without an IP.
pub fn infer_provider(
    ip: Option<&str>,
    server: Option<&str>,
    nameservers: &[String],
    tables: &SignatureTables,
) -> Option<String> {
    let ip = ip.map(str::trim).filter(|s| !s.is_empty())?;
    let server = server.unwrap_or_default().to_ascii_lowercase();
    let nameservers: Vec<String> = nameservers.iter().map(|ns| ns.to_ascii_lowercase()).collect();

    let direct = tables.hosting.iter().find(|sig| {
        (!server.is_empty() && sig.server_markers.iter().any(|m| server.contains(m)))
            || sig.ip_prefixes.iter().any(|p| ip.starts_with(p))
    });
    let by_nameserver = || {
        tables.hosting.iter().find(|sig| {
            sig.nameserver_markers
                .iter()
                .any(|m| nameservers.iter().any(|ns| ns.contains(m)))
        })
    };

    let provider = direct
        .or_else(by_nameserver)
        .map(|sig| sig.provider)
        .unwrap_or(tables.hosting_fallback);
    Some(provider.to_string())
}

/// Labels the mailbox provider from MX hosts by ordered signature matching.
pub fn infer_email_provider(mx: &[String], tables: &SignatureTables) -> Option<String> {
    if mx.is_empty() {
        return None;
    }
    let hosts: Vec<String> = mx.iter().map(|h| h.to_ascii_lowercase()).collect();
    let provider = tables
        .email
        .iter()
        .find(|sig| sig.mx_markers.iter().any(|m| hosts.iter().any(|h| h.contains(m))))
        .map(|sig| sig.provider)
        .unwrap_or(tables.email_fallback);
    Some(provider.to_string())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

// --- Pruning ---

/// Drops nulls, blank strings, empty arrays and empty objects, recursively.
fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::Array(items) => {
            let items: Vec<Value> = items.into_iter().filter_map(prune).collect();
            (!items.is_empty()).then_some(Value::Array(items))
        }
        Value::Object(map) => {
            let map = prune_map(map);
            (!map.is_empty()).then_some(Value::Object(map))
        }
        other => Some(other),
    }
}

fn prune_map(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter_map(|(key, value)| prune(value).map(|v| (key, v)))
        .collect()
}
