// src/core/probe.rs

//! The seam every audit probe implements, and the shared environment it runs in.

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use std::time::Duration;

use crate::config::AuditConfig;
use crate::core::domain::AuditTarget;
use crate::core::errors::SetupError;
use crate::core::knowledge_base::SignatureTables;
use crate::core::models::{ProbeContext, ProbeKind, ProbeResult, SectionData};
use crate::core::net::dns::build_resolver;
use crate::core::net::http::HttpFetcher;
use crate::core::net::whois::WhoisClient;

/// One independent, failure-prone fact-gathering operation about a domain.
///
/// Implementations turn every internal error into `Err(ProbeError)`; the orchestrator
/// folds that into a `ProbeOutcome::Failure`. A panic is treated as a defect.
#[async_trait]
pub trait Probe: Send + Sync {
    /// The report section this probe owns.
    fn kind(&self) -> ProbeKind;

    /// The probe's own deadline. The orchestrator caps it at the audit's remaining time.
    fn deadline(&self, config: &AuditConfig) -> Duration;

    /// Context providers run before the concurrent batch.
    fn provides_context(&self) -> bool {
        false
    }

    /// Copies whatever later probes need out of this probe's successful section.
    fn contribute(&self, _data: &SectionData, _ctx: &mut ProbeContext) {}

    /// Runs the probe. `budget` is already `min(deadline, remaining audit time)` and every
    /// inner timeout must fit inside it.
    async fn run(&self, target: &AuditTarget, ctx: &ProbeContext, env: &ProbeEnv, budget: Duration) -> ProbeResult;
}

/// Process-wide, read-only resources shared by every probe through an `Arc`.
pub struct ProbeEnv {
    pub config: AuditConfig,
    pub http: HttpFetcher,
    pub resolver: TokioAsyncResolver,
    pub whois: WhoisClient,
    pub signatures: SignatureTables,
}

impl ProbeEnv {
    pub fn new(config: AuditConfig) -> Result<Self, SetupError> {
        let http = HttpFetcher::new(&config)?;
        let resolver = build_resolver(&config.resolver)?;
        Ok(Self {
            config,
            http,
            resolver,
            whois: WhoisClient::new()?,
            signatures: SignatureTables::default(),
        })
    }
}
