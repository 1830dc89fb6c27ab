//! Bearer extraction and the unverified JWT payload decoder used as the
//! last-resort resolver. Nothing here checks signatures or expiry.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

use super::principal::{lenient_metadata, meta_str, Metadata};
use crate::error::ResolveError;

/// Token from an `Authorization: Bearer <token>` header, if any.
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, rest) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() { None } else { Some(token.to_string()) }
}

/// Claims read straight out of a token payload. Only the claims used for
/// identity are read; anything else, including `exp`, is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClaims {
    #[serde(default)]
    pub sub: Option<Value>,
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub user_metadata: Metadata,
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub app_metadata: Metadata,
}

fn claim_str(v: Option<&Value>) -> Option<&str> {
    v.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

impl RawClaims {
    /// Non-empty string subject claim.
    pub fn subject(&self) -> Option<&str> {
        claim_str(self.sub.as_ref())
    }

    /// Direct `email` claim, falling back to `user_metadata.email`.
    pub fn email(&self) -> Option<String> {
        claim_str(self.email.as_ref())
            .or_else(|| meta_str(&self.user_metadata, "email"))
            .map(str::to_string)
    }
}

/// Decode the payload segment of a JWT without verifying it.
pub fn decode_unverified(token: &str) -> Result<RawClaims, ResolveError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(ResolveError::Segments(parts.len()));
    }
    // Accept padded and standard-alphabet encodings as well as strict base64url.
    let normalized: String = parts[1]
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(normalized.as_bytes())?;
    let claims: RawClaims = serde_json::from_slice(&bytes)?;
    Ok(claims)
}
