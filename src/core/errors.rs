// src/core/errors.rs

use thiserror::Error;

use crate::core::models::ProbeKind;
use crate::core::net::http::FetchError;
use crate::core::net::whois::WhoisError;

/// Errors surfaced by an audit as a whole. Probe failures never end up here.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The input does not normalize to a valid hostname.
    #[error("Invalid domain format")]
    InvalidDomain(String),

    /// A probe implementation panicked. This is a defect, not a network failure.
    #[error("a probe panicked while auditing {domain}")]
    ProbePanicked { domain: String },

    #[error("internal audit error: {0}")]
    Internal(String),
}

/// Why a single probe produced no section.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("DNS lookup failed: {0}")]
    Dns(#[from] hickory_resolver::error::ResolveError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Whois(#[from] WhoisError),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("TLS inspection failed: {0}")]
    Tls(String),

    #[error("probe task failed: {0}")]
    Task(String),

    #[error("no usable data: {0}")]
    Empty(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("two probes claim the '{0}' section")]
    DuplicateSection(ProbeKind),
}

/// Failures while building the shared probe environment at startup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Http(#[from] FetchError),

    #[error(transparent)]
    Whois(#[from] WhoisError),
}
