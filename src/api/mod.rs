// src/api/mod.rs

//! The thin HTTP facade: routing, input hand-off and error translation.

pub mod handlers;

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::audit::Auditor;

#[derive(Clone)]
pub struct AppState {
    pub auditor: Arc<Auditor>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::banner))
        .route("/health", get(handlers::health))
        .route("/audit/:domain", get(handlers::audit))
        .with_state(state)
}

pub async fn serve(address: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(address).await?;
    info!(address = %address, "Domain audit API listening.");
    axum::serve(listener, router(state)).await
}
