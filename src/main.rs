// src/main.rs

use color_eyre::eyre::{Result, WrapErr};
use std::sync::Arc;
use tracing::info;

mod api;
mod config;
mod core;
mod logging;

use crate::api::AppState;
use crate::config::AuditConfig;
use crate::core::audit::Auditor;
use crate::core::orchestrator::Orchestrator;
use crate::core::probe::ProbeEnv;
use crate::core::registry::{ProbeRegistry, all_probes};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    logging::initialize_logging()?;

    let config = AuditConfig::load().wrap_err("invalid configuration")?;
    let address = config.bind_address()?;
    info!(
        workers = config.workers,
        deadline_secs = config.deadline_secs,
        nameservers = ?config.resolver.nameservers,
        "Configuration loaded."
    );

    let env = Arc::new(ProbeEnv::new(config).wrap_err("failed to build probe environment")?);
    let registry = ProbeRegistry::new(all_probes())?;
    info!(probes = ?registry.kinds(), "Probe registry ready.");

    let auditor = Auditor::new(Orchestrator::new(registry, env));
    let state = AppState { auditor: Arc::new(auditor) };

    api::serve(address, state).await.wrap_err("HTTP server failed")?;
    Ok(())
}
