// src/core/audit.rs

use chrono::Utc;
use std::time::Instant;
use tracing::info;

use crate::core::assembler::assemble;
use crate::core::domain::AuditTarget;
use crate::core::errors::AuditError;
use crate::core::models::AuditResponse;
use crate::core::orchestrator::Orchestrator;

/// One end-to-end audit: validate, run the probes, assemble the report.
pub struct Auditor {
    orchestrator: Orchestrator,
}

impl Auditor {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    pub async fn audit(&self, raw: &str) -> Result<AuditResponse, AuditError> {
        let started = Instant::now();
        let target = AuditTarget::parse(raw)?;
        info!(target = %target, "Starting audit.");

        let results = self.orchestrator.run(&target).await?;
        let report = assemble(&results, &self.orchestrator.env().signatures);
        let elapsed = started.elapsed().as_secs_f64();

        let sections: Vec<&str> = report.kinds().map(|kind| kind.slug()).collect();
        info!(target = %target, sections = ?sections, elapsed_secs = elapsed, "Audit finished.");
        Ok(AuditResponse {
            domain: target.as_str().to_string(),
            audit_time: Utc::now().format("%Y-%m-%d %H:%M:%SZ").to_string(),
            processing_time: format!("{elapsed:.2}s"),
            results: report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use crate::core::probe::ProbeEnv;
    use crate::core::registry::ProbeRegistry;
    use std::sync::Arc;

    fn empty_auditor() -> Auditor {
        let env = Arc::new(ProbeEnv::new(AuditConfig::default()).unwrap());
        let registry = ProbeRegistry::new(Vec::new()).unwrap();
        Auditor::new(Orchestrator::new(registry, env))
    }

    #[tokio::test]
    async fn invalid_domains_are_rejected_before_any_probe() {
        let err = empty_auditor().audit("not a domain").await.unwrap_err();
        assert!(matches!(err, AuditError::InvalidDomain(_)));
    }

    #[tokio::test]
    async fn response_carries_normalized_domain_and_timings() {
        let response = empty_auditor().audit("HTTPS://WWW.Example.com/path").await.unwrap();
        assert_eq!(response.domain, "example.com");
        assert!(response.processing_time.ends_with('s'));
        assert!(response.audit_time.ends_with('Z'));
        assert!(response.results.is_empty());
    }
}
