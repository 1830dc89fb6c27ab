//! In-memory stand-ins for the auth provider and profile store.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use tutoria::error::ResolveError;
use tutoria::identity::{AuthEvent, AuthProvider, Metadata, ProfileRecord, ProfileStore, ProviderSession, ProviderUser};

/// Unsigned JWT with the given payload.
pub fn jwt(payload: serde_json::Value) -> String {
    let enc = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    format!(
        "{}.{}.{}",
        enc.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        enc.encode(payload.to_string().as_bytes()),
        enc.encode(b"not-a-real-signature")
    )
}

pub fn meta(v: serde_json::Value) -> Metadata {
    v.as_object().cloned().unwrap_or_default()
}

pub fn user(id: &str, email: &str, metadata: serde_json::Value) -> ProviderUser {
    ProviderUser { id: id.into(), email: Some(email.into()), phone: None, user_metadata: meta(metadata) }
}

#[derive(Default)]
struct Accounts {
    by_token: HashMap<String, ProviderUser>,
    by_email: HashMap<String, (String, ProviderUser)>,
}

pub struct FakeProvider {
    accounts: Mutex<Accounts>,
    events: broadcast::Sender<AuthEvent>,
    pub unreachable: bool,
    pub verify_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self { accounts: Mutex::new(Accounts::default()), events, unreachable: false, verify_calls: AtomicUsize::new(0) }
    }

    pub fn unreachable() -> Self {
        Self { unreachable: true, ..Self::new() }
    }

    pub fn with_token(self, token: &str, user: ProviderUser) -> Self {
        self.accounts.lock().by_token.insert(token.into(), user);
        self
    }

    pub fn with_account(self, email: &str, password: &str, user: ProviderUser) -> Self {
        self.accounts.lock().by_email.insert(email.into(), (password.into(), user));
        self
    }

    fn session_for(&self, user: ProviderUser) -> ProviderSession {
        let token = format!("tok-{}", user.id);
        self.accounts.lock().by_token.insert(token.clone(), user.clone());
        ProviderSession { access_token: token, refresh_token: None, expires_in: Some(3600), user }
    }
}

#[async_trait]
impl AuthProvider for FakeProvider {
    async fn verify(&self, token: &str) -> Result<Option<ProviderUser>, ResolveError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(ResolveError::ProviderStatus(503));
        }
        Ok(self.accounts.lock().by_token.get(token).cloned())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSession> {
        let found = self.accounts.lock().by_email.get(email).cloned();
        match found {
            Some((pw, user)) if pw == password => {
                let s = self.session_for(user);
                let _ = self.events.send(AuthEvent::SignedIn(s.clone()));
                Ok(s)
            }
            _ => Err(anyhow!("invalid login credentials")),
        }
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Metadata) -> Result<ProviderSession> {
        if self.accounts.lock().by_email.contains_key(email) {
            return Err(anyhow!("user already registered"));
        }
        let user = ProviderUser {
            id: format!("new-{}", email),
            email: Some(email.into()),
            phone: None,
            user_metadata: metadata,
        };
        self.accounts.lock().by_email.insert(email.into(), (password.into(), user.clone()));
        let s = self.session_for(user);
        let _ = self.events.send(AuthEvent::SignedIn(s.clone()));
        Ok(s)
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.accounts.lock().by_token.remove(access_token);
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub struct FakeProfiles {
    rows: Mutex<HashMap<String, ProfileRecord>>,
    pub failing: bool,
    pub fetch_calls: AtomicUsize,
}

impl FakeProfiles {
    pub fn empty() -> Self { Self::default() }

    pub fn failing() -> Self { Self { failing: true, ..Self::default() } }

    pub fn with(self, rec: ProfileRecord) -> Self {
        self.rows.lock().insert(rec.id.clone(), rec);
        self
    }
}

#[async_trait]
impl ProfileStore for FakeProfiles {
    async fn fetch(&self, id: &str) -> Result<Option<ProfileRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(anyhow!("connection reset by peer"));
        }
        Ok(self.rows.lock().get(id).cloned())
    }
}

pub fn profile(id: &str, role: Option<&str>, name: Option<&str>, phone: Option<&str>) -> ProfileRecord {
    ProfileRecord {
        id: id.into(),
        role: role.map(Into::into),
        name: name.map(Into::into),
        phone: phone.map(Into::into),
    }
}
