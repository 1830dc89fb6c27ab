//! Bearer credential -> `Identity`.
//!
//! Resolution runs an ordered list of `Resolver` strategies, first match wins:
//! provider verification, then an unverified payload decode. The winning
//! partial identity gets a role from its metadata/email, is enriched from the
//! profile store on a best-effort basis, and is returned. Nothing is written.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use tracing::{debug, warn};

use super::principal::{email_local_part, meta_str, Identity, Metadata, PartialIdentity};
use super::profile::{ProfileRecord, ProfileStore};
use super::provider::AuthProvider;
use super::role::Role;
use super::token::{bearer_from_headers, decode_unverified};
use crate::error::{AppError, AppResult, ResolveError};
use crate::tprintln;

/// One way of turning a token into a partial identity.
#[async_trait]
pub trait Resolver: Send + Sync {
    fn name(&self) -> &'static str;
    /// `Ok(None)` when the strategy cleanly does not apply; `Err` carries the reason it failed.
    async fn resolve(&self, token: &str) -> Result<Option<PartialIdentity>, ResolveError>;
}

/// Asks the managed auth provider to verify the token.
pub struct ProviderResolver {
    provider: Arc<dyn AuthProvider>,
}

impl ProviderResolver {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self { Self { provider } }
}

#[async_trait]
impl Resolver for ProviderResolver {
    fn name(&self) -> &'static str { "provider" }

    async fn resolve(&self, token: &str) -> Result<Option<PartialIdentity>, ResolveError> {
        let Some(user) = self.provider.verify(token).await? else { return Ok(None); };
        let mut metadata = user.user_metadata;
        if let Some(phone) = user.phone.filter(|p| !p.trim().is_empty()) {
            metadata.entry("phone").or_insert_with(|| serde_json::Value::String(phone));
        }
        let email = user.email.filter(|e| !e.trim().is_empty());
        Ok(Some(PartialIdentity { id: user.id, email, metadata }))
    }
}

/// Reads claims straight out of the token payload. Not a security check.
#[derive(Default)]
pub struct RawDecodeResolver;

#[async_trait]
impl Resolver for RawDecodeResolver {
    fn name(&self) -> &'static str { "raw_decode" }

    async fn resolve(&self, token: &str) -> Result<Option<PartialIdentity>, ResolveError> {
        let claims = decode_unverified(token)?;
        let id = claims.subject().ok_or(ResolveError::MissingSubject)?.to_string();
        let email = claims.email();
        let mut metadata: Metadata = claims.user_metadata;
        for (k, v) in claims.app_metadata {
            metadata.entry(k).or_insert(v);
        }
        Ok(Some(PartialIdentity { id, email, metadata }))
    }
}

/// Where the credential-derived role came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    MetadataRole,
    MetadataType,
    EmailHint,
    Default,
}

/// Role from already-extracted metadata and email, in precedence order:
/// metadata `role`, metadata `user_type`/`type`, email substrings, then `default`.
pub fn determine_role(metadata: &Metadata, email: Option<&str>, default: Role) -> (Role, RoleSource) {
    if let Some(r) = meta_str(metadata, "role").and_then(Role::parse) {
        return (r, RoleSource::MetadataRole);
    }
    if let Some(r) = ["user_type", "type"]
        .iter()
        .find_map(|k| meta_str(metadata, k).and_then(Role::parse))
    {
        return (r, RoleSource::MetadataType);
    }
    if let Some(r) = email.and_then(Role::from_email_hint) {
        return (r, RoleSource::EmailHint);
    }
    (default, RoleSource::Default)
}

pub struct IdentityService {
    resolvers: Vec<Arc<dyn Resolver>>,
    profiles: Arc<dyn ProfileStore>,
    default_role: Role,
}

impl IdentityService {
    pub fn new(resolvers: Vec<Arc<dyn Resolver>>, profiles: Arc<dyn ProfileStore>, default_role: Role) -> Self {
        Self { resolvers, profiles, default_role }
    }

    /// Provider verification followed by the raw-decode fallback.
    pub fn standard(provider: Arc<dyn AuthProvider>, profiles: Arc<dyn ProfileStore>, default_role: Role) -> Self {
        Self::new(
            vec![Arc::new(ProviderResolver::new(provider)), Arc::new(RawDecodeResolver)],
            profiles,
            default_role,
        )
    }

    pub async fn resolve_headers(&self, headers: &HeaderMap) -> AppResult<Identity> {
        let Some(token) = bearer_from_headers(headers) else {
            return Err(AppError::not_authenticated());
        };
        self.resolve(&token).await
    }

    pub async fn resolve(&self, token: &str) -> AppResult<Identity> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::not_authenticated());
        }
        let partial = self.run_chain(token).await?;
        let (credential_role, source) = determine_role(&partial.metadata, partial.email.as_deref(), self.default_role);
        let profile = self.lookup_profile(&partial.id).await;
        let profile_role = profile.as_ref().and_then(|p| p.role.as_deref()).and_then(Role::parse);
        let identity = build_identity(partial, credential_role, profile.as_ref());

        if source == RoleSource::Default && profile_role.is_none() {
            warn!(target: "auth", user = %identity.id, role = %identity.role, "no role information for user; applied default role");
        }
        debug!(target: "auth", user = %identity.id, role = %identity.role, "identity resolved");
        Ok(identity)
    }

    async fn run_chain(&self, token: &str) -> AppResult<PartialIdentity> {
        let mut last_err: Option<String> = None;
        for r in &self.resolvers {
            match r.resolve(token).await {
                Ok(Some(p)) => {
                    tprintln!("auth.resolve strategy={} user={}", r.name(), p.id);
                    return Ok(p);
                }
                Ok(None) => {
                    debug!(target: "auth", strategy = r.name(), "token rejected");
                    last_err = Some(format!("{} rejected token", r.name()));
                }
                Err(e) => {
                    debug!(target: "auth", strategy = r.name(), error = %e, "strategy failed");
                    last_err = Some(e.to_string());
                }
            }
        }
        let reason = last_err.unwrap_or_else(|| "no resolver configured".to_string());
        Err(AppError::unauthorized("invalid_token".to_string(), format!("invalid token: {}", reason)))
    }

    async fn lookup_profile(&self, id: &str) -> Option<ProfileRecord> {
        match self.profiles.fetch(id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "auth", user = %id, error = %e, "profile lookup failed; using credential-derived identity");
                None
            }
        }
    }
}

/// Merge a partial identity, its credential-derived role and an optional
/// profile into the final identity. Profile fields win when set.
pub fn build_identity(partial: PartialIdentity, credential_role: Role, profile: Option<&ProfileRecord>) -> Identity {
    let role = profile
        .and_then(|p| p.role.as_deref())
        .and_then(Role::parse)
        .unwrap_or(credential_role);

    let display_name = profile
        .and_then(|p| p.name())
        .or_else(|| partial.meta_str("name"))
        .or_else(|| partial.meta_str("full_name"))
        .map(str::to_string)
        .or_else(|| partial.email.as_deref().map(|e| email_local_part(e).to_string()))
        .unwrap_or_else(|| partial.id.clone());

    let phone = profile
        .and_then(|p| p.phone())
        .or_else(|| partial.meta_str("phone"))
        .map(str::to_string);

    Identity { id: partial.id, email: partial.email, role, display_name, phone }
}
