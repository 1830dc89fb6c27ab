//!
//! tutoria HTTP server
//! -------------------
//! Axum-based HTTP surface for the identity layer.
//!
//! Responsibilities:
//! - Resolve `Authorization: Bearer` credentials into an `Identity` per request.
//! - Gate routes by role, answering 401 (`not authenticated` / `invalid token: ..`)
//!   or 403 (`forbidden: required [..], actual ..`) before any handler runs.
//! - Expose the resolved identity to callers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use anyhow::Context;
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::identity::{
    require_role, role_gate, HttpAuthProvider, IdentityService, RequestContext, RestProfileStore, Role,
};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityService>,
}

impl AppState {
    /// Wire the HTTP-backed provider and profile store from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = Arc::new(HttpAuthProvider::new(config)?);
        let profiles = Arc::new(RestProfileStore::new(config)?);
        Ok(Self { identity: Arc::new(IdentityService::standard(provider, profiles, config.default_role)) })
    }
}

/// All routes. Each `/api` group carries its own role gate.
pub fn build_router(state: AppState) -> Router {
    let any_role = Router::new()
        .route("/api/me", get(me))
        .route_layer(from_fn_with_state(
            require_role(state.identity.clone(), &[Role::Teacher, Role::Student]),
            role_gate,
        ));
    let teacher = Router::new()
        .route("/api/teacher/whoami", get(whoami))
        .route_layer(from_fn_with_state(require_role(state.identity.clone(), &[Role::Teacher]), role_gate));
    let student = Router::new()
        .route("/api/student/whoami", get(whoami))
        .route_layer(from_fn_with_state(require_role(state.identity.clone(), &[Role::Student]), role_gate));

    Router::new()
        .route("/", get(|| async { "tutoria ok" }))
        .merge(any_role)
        .merge(teacher)
        .merge(student)
}

async fn me(ctx: RequestContext) -> impl IntoResponse {
    Json(json!({ "status": "ok", "request_id": ctx.request_id, "identity": ctx.identity }))
}

async fn whoami(ctx: RequestContext) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "request_id": ctx.request_id,
        "id": ctx.identity.id,
        "role": ctx.identity.role,
        "display_name": ctx.identity.display_name,
    }))
}

/// Start the HTTP server with the given configuration.
pub async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "tutoria starting: http_port={}, auth_url='{}', profiles_table='{}', default_role={}, timeout_secs={}",
        config.http_port, config.auth_url, config.profiles_table, config.default_role, config.request_timeout.as_secs()
    );
    let state = AppState::from_config(&config)?;
    let app = build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
