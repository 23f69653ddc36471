// src/api/handlers.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::debug;

use crate::api::AppState;
use crate::core::errors::AuditError;
use crate::core::models::AuditResponse;

const INTERNAL_ERROR: &str = "Internal audit error";

impl IntoResponse for AuditError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuditError::InvalidDomain(raw) => {
                debug!(input = %raw, "Rejected invalid domain.");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            // Already logged at error level where it happened.
            AuditError::ProbePanicked { .. } | AuditError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR.to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// `GET /audit/:domain`. Always 200 for a valid domain, however many sections failed.
pub async fn audit(State(state): State<AppState>, Path(domain): Path<String>) -> Result<Json<AuditResponse>, AuditError> {
    let response = state.auditor.audit(&domain).await?;
    Ok(Json(response))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn banner() -> Json<Value> {
    Json(json!({
        "message": "Domain Audit API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "active",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use crate::core::audit::Auditor;
    use crate::core::orchestrator::Orchestrator;
    use crate::core::probe::ProbeEnv;
    use crate::core::domain::AuditTarget;
    use crate::core::errors::ProbeError;
    use crate::core::models::{ProbeContext, ProbeKind, ProbeResult, SectionBuilder};
    use crate::core::probe::Probe;
    use crate::core::registry::ProbeRegistry;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use strum::IntoEnumIterator;

    /// Answers with a fixed WHOIS section; every other kind fails.
    struct CannedProbe(ProbeKind);

    #[async_trait]
    impl Probe for CannedProbe {
        fn kind(&self) -> ProbeKind {
            self.0
        }

        fn deadline(&self, config: &AuditConfig) -> Duration {
            config.overall_deadline()
        }

        fn provides_context(&self) -> bool {
            self.0 == ProbeKind::Whois
        }

        async fn run(&self, _target: &AuditTarget, _ctx: &ProbeContext, _env: &ProbeEnv, _budget: Duration) -> ProbeResult {
            match self.0 {
                ProbeKind::Whois => Ok(SectionBuilder::new()
                    .text("Registrar", "Example Registrar, Inc.")
                    .text("Updated Date", "")
                    .build()),
                _ => Err(ProbeError::Empty("connection refused".into())),
            }
        }
    }

    fn state_with(probes: Vec<Arc<dyn Probe>>) -> AppState {
        let env = Arc::new(ProbeEnv::new(AuditConfig::default()).unwrap());
        let orchestrator = Orchestrator::new(ProbeRegistry::new(probes).unwrap(), env);
        AppState { auditor: Arc::new(Auditor::new(orchestrator)) }
    }

    fn state() -> AppState {
        state_with(Vec::new())
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn invalid_domain_is_a_bad_request() {
        let response = audit(State(state()), Path("not a domain".to_string())).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Invalid domain format"}));
    }

    #[tokio::test]
    async fn probe_panic_is_an_internal_error() {
        let response = AuditError::ProbePanicked { domain: "example.com".into() }.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({"error": "Internal audit error"}));
    }

    #[tokio::test]
    async fn audit_without_sections_is_still_ok() {
        let response = audit(State(state()), Path("example.com".to_string())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["Domain"], "example.com");
        assert_eq!(body["Results"], json!({}));
        assert!(body["Processing Time"].as_str().unwrap().ends_with('s'));
    }

    #[tokio::test]
    async fn failing_sections_leave_only_domain_info() {
        let probes: Vec<Arc<dyn Probe>> = ProbeKind::iter()
            .map(|kind| Arc::new(CannedProbe(kind)) as Arc<dyn Probe>)
            .collect();
        let response = audit(State(state_with(probes)), Path("www.example.com".to_string()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["Domain"], "example.com");
        assert_eq!(body["Results"], json!({"Domain Info": {"Registrar": "Example Registrar, Inc."}}));
    }

    #[tokio::test]
    async fn health_and_banner_payloads() {
        let health = health().await.0;
        assert_eq!(health["status"], "healthy");
        assert!(health["timestamp"].is_string());

        let banner = banner().await.0;
        assert_eq!(banner["message"], "Domain Audit API");
        assert_eq!(banner["status"], "active");
    }
}
