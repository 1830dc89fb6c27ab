//! Unified application error model and mapping helpers.
//! `AppError` is what handlers and the role gate surface to HTTP callers;
//! `ResolveError` carries the inner reason a credential could not be resolved.

use std::fmt::{Display, Formatter};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::identity::{format_roles, Role};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Unauthorized { code: String, message: String },
    Forbidden { required: Vec<Role>, actual: Role },
    UserInput { code: String, message: String },
    Upstream { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Forbidden { .. } => "forbidden",
            AppError::Unauthorized { code, .. }
            | AppError::UserInput { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::Forbidden { required, actual } => {
                format!("forbidden: required {}, actual {}", format_roles(required), actual)
            }
            AppError::Unauthorized { message, .. }
            | AppError::UserInput { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Internal { message, .. } => message.clone(),
        }
    }

    pub fn unauthorized<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn forbidden(required: &[Role], actual: Role) -> Self { AppError::Forbidden { required: required.to_vec(), actual } }
    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn upstream<S: Into<String>>(code: S, msg: S) -> Self { AppError::Upstream { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// The caller presented no credential at all.
    pub fn not_authenticated() -> Self {
        AppError::unauthorized("not_authenticated", "not authenticated")
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Unauthorized { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::UserInput { .. } => 400,
            AppError::Upstream { .. } => 502,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut body = serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.message(),
        });
        if let AppError::Forbidden { required, actual } = &self {
            body["required"] = serde_json::json!(required);
            body["actual"] = serde_json::json!(actual);
        }
        (status, Json(body)).into_response()
    }
}

/// Why a single resolver step could not produce an identity.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("auth provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("auth provider returned status {0}")]
    ProviderStatus(u16),
    #[error("malformed token: expected 3 segments, found {0}")]
    Segments(usize),
    #[error("token payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("token payload is not valid JSON: {0}")]
    Claims(#[from] serde_json::Error),
    #[error("token has no subject claim")]
    MissingSubject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::not_authenticated().http_status(), 401);
        assert_eq!(AppError::forbidden(&[Role::Teacher], Role::Student).http_status(), 403);
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::upstream("provider", "down").http_status(), 502);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn forbidden_names_required_and_actual() {
        let e = AppError::forbidden(&[Role::Teacher], Role::Student);
        assert_eq!(e.code_str(), "forbidden");
        assert_eq!(e.message(), "forbidden: required [teacher], actual student");
        assert_eq!(e.to_string(), "forbidden: forbidden: required [teacher], actual student");
    }

    #[test]
    fn anyhow_maps_to_internal() {
        let e: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(e.http_status(), 500);
        assert_eq!(e.message(), "boom");
    }

    #[test]
    fn resolve_error_messages_carry_inner_reason() {
        assert_eq!(ResolveError::Segments(1).to_string(), "malformed token: expected 3 segments, found 1");
        assert_eq!(ResolveError::MissingSubject.to_string(), "token has no subject claim");
    }
}
