// src/core/scanner/ssl_scanner.rs

use chrono::{DateTime, Utc};
use native_tls::{Certificate, Protocol, TlsConnector};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use x509_parser::prelude::*;

use crate::core::errors::ProbeError;
use crate::core::models::{AnalysisFinding, Severity};

const TLS_PORT: u16 = 443;
/// Days before expiry at which a certificate is flagged.
const EXPIRY_WARNING_DAYS: i64 = 30;

pub const TLS_12_SUPPORTED: &str = "TLS 1.2 supported";
pub const TLS_13_ONLY: &str = "TLS 1.3 only";

#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub subject_name: String,
    pub issuer_name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateStatus {
    Valid,
    Expired,
    NotYetValid,
}

impl CertificateStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CertificateStatus::Valid => "Valid",
            CertificateStatus::Expired => "Expired",
            CertificateStatus::NotYetValid => "Not Yet Valid",
        }
    }
}

impl CertificateInfo {
    pub fn status(&self, now: DateTime<Utc>) -> CertificateStatus {
        if now < self.not_before {
            CertificateStatus::NotYetValid
        } else if now > self.not_after {
            CertificateStatus::Expired
        } else {
            CertificateStatus::Valid
        }
    }

    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.not_after.signed_duration_since(now).num_days()
    }
}

/// What the handshakes on port 443 revealed.
#[derive(Debug, Clone)]
pub struct SslData {
    /// The chain verified against the system trust store for this hostname.
    pub trusted: bool,
    pub certificate: CertificateInfo,
    /// `None` when the version check itself could not connect.
    pub tls_version: Option<&'static str>,
}

/// Connects to port 443 and inspects the served certificate.
///
/// The handshake is blocking, so it runs on tokio's blocking pool. If `limit` passes first the
/// result is abandoned; the thread still ends on its own socket timeouts.
pub async fn inspect_certificate(domain: &str, limit: Duration) -> Result<SslData, ProbeError> {
    info!(target = domain, "Starting SSL/TLS scan.");
    let target_owned = domain.to_string();
    let io_timeout = limit.max(Duration::from_millis(100));

    let task = spawn_blocking(move || perform_tls_scan(&target_owned, io_timeout));
    match timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ProbeError::Task(e.to_string())),
        Err(_) => Err(ProbeError::Tls("handshake timed out".into())),
    }
}

fn perform_tls_scan(target: &str, io_timeout: Duration) -> Result<SslData, ProbeError> {
    let addr = resolve(target)?;

    // First a verifying handshake; if the chain is rejected, look at it anyway.
    let verifying = TlsConnector::new().map_err(|e| ProbeError::Tls(format!("TlsConnector Error: {e}")))?;
    let (trusted, cert) = match handshake(&verifying, target, addr, io_timeout) {
        Ok(cert) => (true, cert),
        Err(e) => {
            debug!(target, error = %e, "Verified handshake failed, retrying without verification.");
            let inspecting = inspection_connector(None)?;
            (false, handshake(&inspecting, target, addr, io_timeout)?)
        }
    };

    let certificate = parse_certificate(&cert)?;
    info!(subject = %certificate.subject_name, issuer = %certificate.issuer_name, trusted, "Successfully parsed certificate.");

    Ok(SslData {
        trusted,
        certificate,
        tls_version: protocol_support(target, addr, io_timeout),
    })
}

/// Alert texts, across the native-tls backends, for a server that refuses the offered version.
/// Resets, timeouts and non-TLS replies (`wrong version number`) must not match.
const VERSION_REJECTIONS: &[&str] = &[
    "alert protocol version",
    "unsupported protocol",
    "no protocols available",
    "peer protocol version",
    "do not possess a common algorithm",
];

/// native-tls cannot report the negotiated version, so a handshake capped at TLS 1.2 is used
/// instead. Success means the server still speaks 1.2; an explicit version refusal means 1.3
/// only. Any other failure says nothing about versions and yields `None`.
fn protocol_support(target: &str, addr: SocketAddr, io_timeout: Duration) -> Option<&'static str> {
    let connector = inspection_connector(Some(Protocol::Tlsv12)).ok()?;
    let stream = connect(addr, io_timeout).ok()?;
    match connector.connect(target, stream) {
        Ok(_) => Some(TLS_12_SUPPORTED),
        Err(e) => {
            let message = e.to_string();
            if is_version_rejection(&message) {
                debug!(target, error = %message, "TLS 1.2 handshake refused.");
                Some(TLS_13_ONLY)
            } else {
                debug!(target, error = %message, "TLS 1.2 handshake failed; version left unreported.");
                None
            }
        }
    }
}

fn is_version_rejection(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    VERSION_REJECTIONS.iter().any(|marker| message.contains(marker))
}

/// Certificate-inspection connector. Verification is off on purpose: the audit must read
/// expired, self-signed and mismatched certificates. It is used for nothing else.
fn inspection_connector(max_version: Option<Protocol>) -> Result<TlsConnector, ProbeError> {
    TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .max_protocol_version(max_version)
        .build()
        .map_err(|e| ProbeError::Tls(format!("TlsConnector Error: {e}")))
}

fn resolve(target: &str) -> Result<SocketAddr, ProbeError> {
    (target, TLS_PORT)
        .to_socket_addrs()
        .map_err(|e| ProbeError::Tls(format!("address resolution failed: {e}")))?
        .next()
        .ok_or_else(|| ProbeError::Tls(format!("{target} has no address")))
}

fn connect(addr: SocketAddr, io_timeout: Duration) -> std::io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, io_timeout)?;
    stream.set_read_timeout(Some(io_timeout))?;
    stream.set_write_timeout(Some(io_timeout))?;
    Ok(stream)
}

fn handshake(connector: &TlsConnector, target: &str, addr: SocketAddr, io_timeout: Duration) -> Result<Certificate, ProbeError> {
    let stream = connect(addr, io_timeout).map_err(|e| ProbeError::Tls(format!("TCP Connection Error: {e}")))?;
    let stream = connector
        .connect(target, stream)
        .map_err(|e| ProbeError::Tls(format!("TLS Handshake Error: {e}")))?;
    stream
        .peer_certificate()
        .map_err(|e| ProbeError::Tls(format!("Could not get peer certificate: {e}")))?
        .ok_or_else(|| ProbeError::Tls("no peer certificate".into()))
}

fn parse_certificate(cert: &Certificate) -> Result<CertificateInfo, ProbeError> {
    let der = cert
        .to_der()
        .map_err(|e| ProbeError::Tls(format!("Could not convert certificate to DER: {e}")))?;
    let (_, x509) = parse_x509_certificate(&der).map_err(|e| {
        warn!(error = %e, "Failed to parse X.509 certificate");
        ProbeError::Tls(format!("X.509 Parse Error: {e}"))
    })?;

    let validity = x509.validity();
    Ok(CertificateInfo {
        subject_name: x509.subject().to_string(),
        issuer_name: x509.issuer().to_string(),
        not_before: asn1_time_to_chrono_utc(&validity.not_before),
        not_after: asn1_time_to_chrono_utc(&validity.not_after),
    })
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

/// Findings for a TLS scan. A failed scan raises only the handshake finding.
pub fn analyze_ssl_results(scan: &Result<SslData, ProbeError>, now: DateTime<Utc>) -> Vec<AnalysisFinding> {
    let mut analyses = Vec::new();
    let ssl = match scan {
        Ok(ssl) => ssl,
        Err(_) => {
            analyses.push(AnalysisFinding::new(Severity::Critical, "SSL_HANDSHAKE_FAILED"));
            return analyses;
        }
    };

    if !ssl.trusted {
        analyses.push(AnalysisFinding::new(Severity::Critical, "SSL_UNTRUSTED"));
    }
    match ssl.certificate.status(now) {
        CertificateStatus::Expired => {
            debug!(expiry_date = %ssl.certificate.not_after, "Certificate is expired.");
            analyses.push(AnalysisFinding::new(Severity::Critical, "SSL_EXPIRED"));
        }
        CertificateStatus::NotYetValid => {
            analyses.push(AnalysisFinding::new(Severity::Warning, "SSL_NOT_YET_VALID"));
        }
        CertificateStatus::Valid => {
            let days_left = ssl.certificate.days_until_expiry(now);
            if (0..=EXPIRY_WARNING_DAYS).contains(&days_left) {
                debug!(days_left, "Certificate is expiring soon.");
                analyses.push(AnalysisFinding::new(Severity::Warning, "SSL_EXPIRING_SOON"));
            }
        }
    }
    analyses
}
