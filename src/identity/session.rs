//! Client-side session store: the single source of truth for who is signed in.
//!
//! State moves `Loading -> Authenticated | Anonymous` on the first auth event
//! and never returns to `Loading`. Identity here comes from the profile store
//! alone; a missing or failing lookup means no identity.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::principal::{email_local_part, Identity, Metadata};
use super::profile::{ProfileRecord, ProfileStore};
use super::provider::{AuthEvent, AuthProvider, ProviderSession};
use super::role::Role;
use crate::tprintln;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    Authenticated { identity: Identity, credential: String },
    Anonymous,
}

pub struct SessionStore {
    provider: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileStore>,
    default_role: Role,
    /// Single copy of the state; receivers are notified on every change.
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn AuthProvider>, profiles: Arc<dyn ProfileStore>, default_role: Role) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self { provider, profiles, default_role, state }
    }

    pub fn state(&self) -> SessionState { self.state.borrow().clone() }

    pub fn is_loading(&self) -> bool { matches!(*self.state.borrow(), SessionState::Loading) }

    pub fn is_authenticated(&self) -> bool { matches!(*self.state.borrow(), SessionState::Authenticated { .. }) }

    pub fn identity(&self) -> Option<Identity> {
        match &*self.state.borrow() {
            SessionState::Authenticated { identity, .. } => Some(identity.clone()),
            _ => None,
        }
    }

    pub fn credential(&self) -> Option<String> {
        match &*self.state.borrow() {
            SessionState::Authenticated { credential, .. } => Some(credential.clone()),
            _ => None,
        }
    }

    /// Watch state transitions (sign-in/sign-out notifications for the UI).
    pub fn watch(&self) -> watch::Receiver<SessionState> { self.state.subscribe() }

    /// First resolution from whatever session the provider already holds.
    pub async fn initialize(&self, existing: Option<ProviderSession>) {
        match existing {
            Some(s) => self.apply(AuthEvent::SignedIn(s)).await,
            None => self.apply(AuthEvent::SignedOut).await,
        }
    }

    /// Re-derive the identity for one auth state change.
    pub async fn apply(&self, event: AuthEvent) {
        let next = match event {
            AuthEvent::SignedIn(session) => match self.profile_identity(&session).await {
                Some(identity) => SessionState::Authenticated { identity, credential: session.access_token },
                None => SessionState::Anonymous,
            },
            AuthEvent::SignedOut => SessionState::Anonymous,
        };
        tprintln!("session.apply authenticated={}", matches!(next, SessionState::Authenticated { .. }));
        self.state.send_replace(next);
    }

    /// Consume the provider's event stream one event at a time until it closes.
    pub async fn run(&self, mut events: broadcast::Receiver<AuthEvent>) {
        loop {
            match events.recv().await {
                Ok(ev) => self.apply(ev).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(target: "session", skipped = n, "auth event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Subscribe to the provider and process its events in the background.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let events = self.provider.subscribe();
        let store = Arc::clone(self);
        tokio::spawn(async move { store.run(events).await })
    }

    pub async fn login(&self, email: &str, password: &str) -> bool {
        match self.provider.sign_in(email, password).await {
            Ok(_) => {
                info!(target: "session", "login succeeded for {}", email);
                true
            }
            Err(e) => {
                error!(target: "session", "login failed for {}: {:#}", email, e);
                false
            }
        }
    }

    pub async fn register(&self, email: &str, password: &str, name: &str, role: Role) -> bool {
        let mut metadata = Metadata::new();
        metadata.insert("name".into(), json!(name));
        metadata.insert("role".into(), json!(role.as_str()));
        match self.provider.sign_up(email, password, metadata).await {
            Ok(_) => true,
            Err(e) => {
                error!(target: "session", "registration failed for {}: {:#}", email, e);
                false
            }
        }
    }

    /// Sign out of the provider. Already-anonymous sessions succeed trivially.
    pub async fn logout(&self) -> bool {
        let Some(token) = self.credential() else { return true; };
        match self.provider.sign_out(&token).await {
            Ok(()) => true,
            Err(e) => {
                error!(target: "session", "logout failed: {:#}", e);
                false
            }
        }
    }

    async fn profile_identity(&self, session: &ProviderSession) -> Option<Identity> {
        let user = &session.user;
        match self.profiles.fetch(&user.id).await {
            Ok(Some(rec)) => Some(self.identity_from_profile(&rec, user.email.clone())),
            Ok(None) => {
                warn!(target: "session", user = %user.id, "no profile for signed-in user");
                None
            }
            Err(e) => {
                error!(target: "session", user = %user.id, "profile lookup failed: {:#}", e);
                None
            }
        }
    }

    fn identity_from_profile(&self, rec: &ProfileRecord, email: Option<String>) -> Identity {
        let role = rec.role.as_deref().and_then(Role::parse).unwrap_or(self.default_role);
        let display_name = rec
            .name()
            .map(str::to_string)
            .or_else(|| email.as_deref().map(|e| email_local_part(e).to_string()))
            .unwrap_or_else(|| rec.id.clone());
        Identity { id: rec.id.clone(), email, role, display_name, phone: rec.phone().map(str::to_string) }
    }
}
