//! Service configuration read from the environment.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::warn;

use crate::identity::Role;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    /// Base URL of the hosted auth/database service, e.g. `https://project.example.co`.
    pub auth_url: String,
    /// Public API key sent as the `apikey` header on every outbound call.
    pub anon_key: String,
    pub profiles_table: String,
    /// Role assigned when neither credential nor profile says anything.
    pub default_role: Role,
    pub request_timeout: Duration,
}

impl Config {
    pub fn new(auth_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http_port: 7878,
            auth_url: auth_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            profiles_table: "profiles".to_string(),
            default_role: Role::Teacher,
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Build from an arbitrary key lookup so tests need not touch the process env.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth_url = get("TUTORIA_AUTH_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("TUTORIA_AUTH_URL must be set to the auth provider base URL"))?;
        let anon_key = get("TUTORIA_ANON_KEY")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("TUTORIA_ANON_KEY must be set"))?;
        let mut cfg = Config::new(auth_url, anon_key);

        if let Some(v) = get("TUTORIA_HTTP_PORT") {
            match v.parse::<u16>() {
                Ok(p) => cfg.http_port = p,
                Err(_) => warn!(target: "startup", "ignoring invalid TUTORIA_HTTP_PORT='{}'", v),
            }
        }
        if let Some(v) = get("TUTORIA_PROFILES_TABLE").filter(|s| !s.trim().is_empty()) {
            cfg.profiles_table = v;
        }
        if let Some(v) = get("TUTORIA_DEFAULT_ROLE") {
            match Role::parse(&v) {
                Some(r) => cfg.default_role = r,
                None => warn!(target: "startup", "ignoring invalid TUTORIA_DEFAULT_ROLE='{}'", v),
            }
        }
        if let Some(v) = get("TUTORIA_TIMEOUT_SECS") {
            match v.parse::<u64>() {
                Ok(s) if s > 0 => cfg.request_timeout = Duration::from_secs(s),
                _ => warn!(target: "startup", "ignoring invalid TUTORIA_TIMEOUT_SECS='{}'", v),
            }
        }
        Ok(cfg)
    }
}
