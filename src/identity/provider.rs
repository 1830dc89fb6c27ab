use async_trait::async_trait;
use anyhow::{anyhow, Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::broadcast;

use super::principal::{lenient_metadata, Metadata};
use crate::config::Config;
use crate::error::ResolveError;
use crate::tprintln;

/// User record as reported by the auth provider after verifying a token.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub user_metadata: Metadata,
}

/// A signed-in session handed out by the provider.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProviderSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: ProviderUser,
}

/// Auth state transitions published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(ProviderSession),
    SignedOut,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Verify a token. `Ok(None)` means the provider rejected it.
    async fn verify(&self, token: &str) -> Result<Option<ProviderUser>, ResolveError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSession>;
    async fn sign_up(&self, email: &str, password: &str, metadata: Metadata) -> Result<ProviderSession>;
    async fn sign_out(&self, access_token: &str) -> Result<()>;
    /// Stream of auth state changes. Events are delivered in publish order.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Client for a GoTrue-style auth service under `{base}/auth/v1`.
pub struct HttpAuthProvider {
    base: String,
    anon_key: String,
    client: reqwest::Client,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default, alias = "error_description", alias = "msg")]
    message: Option<String>,
}

impl HttpAuthProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("building auth provider HTTP client")?;
        let (events, _) = broadcast::channel(16);
        Ok(Self {
            base: format!("{}/auth/v1", config.auth_url),
            anon_key: config.anon_key.clone(),
            client,
            events,
        })
    }

    fn publish(&self, ev: AuthEvent) {
        // No subscribers is fine; the event is simply dropped.
        let _ = self.events.send(ev);
    }

    async fn session_from(&self, resp: reqwest::Response, op: &str) -> Result<ProviderSession> {
        let status = resp.status();
        if !status.is_success() {
            let detail = resp
                .json::<ProviderErrorBody>()
                .await
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| status.to_string());
            return Err(anyhow!("{} rejected ({}): {}", op, status.as_u16(), detail));
        }
        resp.json::<ProviderSession>()
            .await
            .with_context(|| format!("decoding {} response", op))
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn verify(&self, token: &str) -> Result<Option<ProviderUser>, ResolveError> {
        let resp = self
            .client
            .get(format!("{}/user", self.base))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => {
                let user = resp.json::<ProviderUser>().await?;
                tprintln!("auth.verify ok user={}", user.id);
                Ok(Some(user))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            s => Err(ResolveError::ProviderStatus(s.as_u16())),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSession> {
        let resp = self
            .client
            .post(format!("{}/token?grant_type=password", self.base))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .context("sign-in request")?;
        let session = self.session_from(resp, "sign-in").await?;
        self.publish(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Metadata) -> Result<ProviderSession> {
        let resp = self
            .client
            .post(format!("{}/signup", self.base))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await
            .context("sign-up request")?;
        let session = self.session_from(resp, "sign-up").await?;
        self.publish(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let sent = self
            .client
            .post(format!("{}/logout", self.base))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await;
        // The local session ends whether or not the provider was reached.
        self.publish(AuthEvent::SignedOut);
        let resp = sent.context("sign-out request")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("sign-out rejected ({})", status.as_u16()));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
