use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use super::Identity;
use crate::error::AppError;

/// Per-request view of the authenticated caller, placed in request
/// extensions by the role gate.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub request_id: String,
}

impl RequestContext {
    /// Reuse an inbound `x-request-id` if the caller sent one.
    pub fn new(identity: Identity, headers: &HeaderMap) -> Self {
        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self { identity, request_id }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(AppError::not_authenticated)
    }
}
