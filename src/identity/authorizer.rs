use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::info;

use super::{Identity, IdentityService, RequestContext, Role};
use crate::error::{AppError, AppResult};

/// Fails with `Forbidden` when the identity's role is not in `allowed`.
pub fn authorize(identity: &Identity, allowed: &[Role]) -> AppResult<()> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(AppError::forbidden(allowed, identity.role))
    }
}

/// State for the role-gating middleware: who resolves callers and which
/// roles may pass.
#[derive(Clone)]
pub struct RoleGate {
    pub identity: Arc<IdentityService>,
    pub allowed: Arc<[Role]>,
}

/// Build a gate for `roles`. Mount with
/// `axum::middleware::from_fn_with_state(require_role(svc, &[..]), role_gate)`.
pub fn require_role(identity: Arc<IdentityService>, roles: &[Role]) -> RoleGate {
    RoleGate { identity, allowed: Arc::from(roles) }
}

impl RoleGate {
    pub async fn check(&self, headers: &axum::http::HeaderMap) -> AppResult<RequestContext> {
        let identity = self.identity.resolve_headers(headers).await?;
        authorize(&identity, &self.allowed)?;
        Ok(RequestContext::new(identity, headers))
    }
}

/// Resolve and authorize the caller, then hand a `RequestContext` to the
/// handler. Failures end the request with 401/403.
pub async fn role_gate(State(gate): State<RoleGate>, mut req: Request, next: Next) -> Response {
    let checked = gate.check(req.headers()).await;
    match checked {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(e) => {
            info!(target: "auth", path = %req.uri().path(), status = e.http_status(), "request rejected: {}", e.message());
            e.into_response()
        }
    }
}
