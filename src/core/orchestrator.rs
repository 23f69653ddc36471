// src/core/orchestrator.rs

//! Fan-out/fan-in execution of the registered probes for one audit.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, error, warn};

use crate::core::domain::AuditTarget;
use crate::core::errors::AuditError;
use crate::core::models::{ProbeContext, ProbeKind, ProbeOutcome, ProbeResults};
use crate::core::probe::{Probe, ProbeEnv};
use crate::core::registry::ProbeRegistry;

const TIMEOUT_REASON: &str = "timeout";

pub struct Orchestrator {
    registry: ProbeRegistry,
    env: Arc<ProbeEnv>,
}

impl Orchestrator {
    pub fn new(registry: ProbeRegistry, env: Arc<ProbeEnv>) -> Self {
        Self { registry, env }
    }

    pub fn env(&self) -> &ProbeEnv {
        &self.env
    }

    /// Runs every probe against `target` and collects their outcomes.
    ///
    /// Context providers run first, one at a time; the rest share a worker pool. Whatever
    /// is still running at the overall deadline becomes `Failure("timeout")` and is aborted.
    /// A probe panic is the only error.
    pub async fn run(&self, target: &AuditTarget) -> Result<ProbeResults, AuditError> {
        let config = &self.env.config;
        let overall = Instant::now() + config.overall_deadline();
        let workers = Arc::new(Semaphore::new(config.workers));
        let mut results = ProbeResults::default();
        if self.registry.is_empty() {
            warn!(domain = %target, "No probes registered; the report will be empty.");
            return Ok(results);
        }
        debug!(domain = %target, probes = self.registry.len(), workers = config.workers, "Dispatching probes.");

        // --- Prelude ---
        for probe in self.registry.prelude() {
            let kind = probe.kind();
            let budget = budget_for(probe.as_ref(), &self.env, overall);
            let handle = tokio::spawn(execute(
                Arc::clone(probe),
                target.clone(),
                Arc::new(results.context.clone()),
                Arc::clone(&self.env),
                Arc::clone(&workers),
                budget,
            ));
            let outcome = match handle.await {
                Ok((_, outcome)) => outcome,
                Err(e) if e.is_panic() => return Err(panicked(target, [kind])),
                // Only runtime shutdown cancels a task nobody else holds.
                Err(e) => {
                    error!(domain = %target, probe = kind.slug(), error = %e, "Probe task cancelled.");
                    return Err(AuditError::Internal(e.to_string()));
                }
            };
            if let ProbeOutcome::Success(data) = &outcome {
                probe.contribute(data, &mut results.context);
            }
            record(&mut results, target, kind, outcome);
        }

        // --- Batch ---
        let context = Arc::new(results.context.clone());
        let mut tasks = JoinSet::new();
        let mut pending: BTreeSet<ProbeKind> = BTreeSet::new();
        for probe in self.registry.batch() {
            let budget = budget_for(probe.as_ref(), &self.env, overall);
            pending.insert(probe.kind());
            tasks.spawn(execute(
                Arc::clone(probe),
                target.clone(),
                Arc::clone(&context),
                Arc::clone(&self.env),
                Arc::clone(&workers),
                budget,
            ));
        }

        let collected = timeout_at(overall, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((kind, outcome)) => {
                        pending.remove(&kind);
                        record(&mut results, target, kind, outcome);
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })
        .await;

        match collected {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tasks.abort_all();
                if e.is_panic() {
                    return Err(panicked(target, pending));
                }
                error!(domain = %target, error = %e, "Probe task cancelled.");
                return Err(AuditError::Internal(e.to_string()));
            }
            Err(_) => {
                tasks.abort_all();
                for kind in std::mem::take(&mut pending) {
                    record(&mut results, target, kind, ProbeOutcome::Failure(TIMEOUT_REASON.into()));
                }
            }
        }
        Ok(results)
    }
}

/// `min(probe deadline, time left before the overall deadline)`.
fn budget_for(probe: &dyn Probe, env: &ProbeEnv, overall: Instant) -> Duration {
    probe
        .deadline(&env.config)
        .min(overall.saturating_duration_since(Instant::now()))
}

async fn execute(
    probe: Arc<dyn Probe>,
    target: AuditTarget,
    context: Arc<ProbeContext>,
    env: Arc<ProbeEnv>,
    workers: Arc<Semaphore>,
    budget: Duration,
) -> (ProbeKind, ProbeOutcome) {
    let kind = probe.kind();
    let started = Instant::now();

    // Time spent queued for a worker counts against the probe's budget.
    let _permit = match timeout(budget, workers.acquire_owned()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => return (kind, ProbeOutcome::Failure("worker pool closed".into())),
        Err(_) => return (kind, ProbeOutcome::Failure(TIMEOUT_REASON.into())),
    };

    let remaining = budget.saturating_sub(started.elapsed());
    let outcome = match timeout(remaining, probe.run(&target, &context, &env, remaining)).await {
        Ok(result) => ProbeOutcome::from(result),
        Err(_) => ProbeOutcome::Failure(TIMEOUT_REASON.into()),
    };
    debug!(domain = %target, probe = kind.slug(), elapsed_ms = started.elapsed().as_millis() as u64, ok = outcome.is_success(), "Probe finished.");
    (kind, outcome)
}

fn record(results: &mut ProbeResults, target: &AuditTarget, kind: ProbeKind, outcome: ProbeOutcome) {
    if let ProbeOutcome::Failure(reason) = &outcome {
        debug!(domain = %target, probe = kind.slug(), reason = %reason, "Probe failed; section omitted.");
    }
    results.outcomes.insert(kind, outcome);
}

fn panicked(target: &AuditTarget, pending: impl IntoIterator<Item = ProbeKind>) -> AuditError {
    let pending: Vec<&str> = pending.into_iter().map(|k| k.slug()).collect();
    error!(domain = %target, pending = ?pending, "A probe panicked; aborting audit.");
    AuditError::ProbePanicked { domain: target.to_string() }
}
