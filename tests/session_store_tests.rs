//! Client session store: state machine driven by provider auth events.

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tokio::sync::watch;

use common::{profile, user, FakeProfiles, FakeProvider};
use tutoria::identity::{AuthEvent, ProviderSession, Role, SessionState, SessionStore};

fn session(id: &str, email: &str) -> ProviderSession {
    ProviderSession {
        access_token: format!("tok-{}", id),
        refresh_token: None,
        expires_in: Some(3600),
        user: user(id, email, json!({})),
    }
}

async fn next_state(rx: &mut watch::Receiver<SessionState>) -> Result<SessionState> {
    tokio::time::timeout(Duration::from_secs(5), rx.changed()).await??;
    Ok(rx.borrow_and_update().clone())
}

#[tokio::test]
async fn starts_loading_and_resolves_to_anonymous() {
    let store = SessionStore::new(Arc::new(FakeProvider::new()), Arc::new(FakeProfiles::empty()), Role::Teacher);
    assert!(store.is_loading());
    assert!(!store.is_authenticated());
    store.initialize(None).await;
    assert_eq!(store.state(), SessionState::Anonymous);
    assert!(!store.is_loading());
}

#[tokio::test]
async fn signed_in_with_profile_is_authenticated() {
    let profiles = FakeProfiles::empty().with(profile("u1", Some("aluno"), Some("Bruno"), Some("555")));
    let store = SessionStore::new(Arc::new(FakeProvider::new()), Arc::new(profiles), Role::Teacher);
    store.initialize(Some(session("u1", "bruno@x.com"))).await;

    let identity = store.identity().expect("identity");
    assert_eq!(identity.role, Role::Student);
    assert_eq!(identity.display_name, "Bruno");
    assert_eq!(identity.phone.as_deref(), Some("555"));
    assert_eq!(store.credential().as_deref(), Some("tok-u1"));
}

#[tokio::test]
async fn missing_or_failing_profile_means_no_identity() {
    let store = SessionStore::new(Arc::new(FakeProvider::new()), Arc::new(FakeProfiles::empty()), Role::Teacher);
    store.apply(AuthEvent::SignedIn(session("u1", "a@x.com"))).await;
    assert_eq!(store.state(), SessionState::Anonymous);

    let store = SessionStore::new(Arc::new(FakeProvider::new()), Arc::new(FakeProfiles::failing()), Role::Teacher);
    store.apply(AuthEvent::SignedIn(session("u1", "a@x.com"))).await;
    assert_eq!(store.state(), SessionState::Anonymous);
    assert!(store.identity().is_none());
}

#[tokio::test]
async fn profile_without_role_uses_default_and_email_name() {
    let profiles = FakeProfiles::empty().with(profile("u1", None, None, None));
    let store = SessionStore::new(Arc::new(FakeProvider::new()), Arc::new(profiles), Role::Student);
    store.apply(AuthEvent::SignedIn(session("u1", "dani@x.com"))).await;
    let identity = store.identity().expect("identity");
    assert_eq!(identity.role, Role::Student);
    assert_eq!(identity.display_name, "dani");
}

#[tokio::test]
async fn never_returns_to_loading() {
    let profiles = FakeProfiles::empty().with(profile("u1", Some("teacher"), None, None));
    let store = SessionStore::new(Arc::new(FakeProvider::new()), Arc::new(profiles), Role::Teacher);
    store.apply(AuthEvent::SignedIn(session("u1", "a@x.com"))).await;
    store.apply(AuthEvent::SignedOut).await;
    store.apply(AuthEvent::SignedIn(session("u1", "a@x.com"))).await;
    assert!(!store.is_loading());
    assert!(store.is_authenticated());
}

#[tokio::test]
async fn login_and_logout_flow_through_event_stream() -> Result<()> {
    let provider = Arc::new(
        FakeProvider::new().with_account("ana@x.com", "pw", user("u1", "ana@x.com", json!({}))),
    );
    let profiles = FakeProfiles::empty().with(profile("u1", Some("teacher"), Some("Ana"), None));
    let store = Arc::new(SessionStore::new(provider.clone(), Arc::new(profiles), Role::Teacher));
    let mut rx = store.watch();
    let worker = store.spawn();

    assert!(!store.login("ana@x.com", "wrong").await);
    assert!(store.login("ana@x.com", "pw").await);
    match next_state(&mut rx).await? {
        SessionState::Authenticated { identity, credential } => {
            assert_eq!(identity.display_name, "Ana");
            assert_eq!(credential, "tok-u1");
        }
        other => panic!("expected authenticated, got {:?}", other),
    }

    assert!(store.logout().await);
    assert_eq!(next_state(&mut rx).await?, SessionState::Anonymous);
    assert!(store.logout().await, "logout while anonymous is a no-op");

    worker.abort();
    Ok(())
}

#[tokio::test]
async fn register_reports_boolean_outcome() -> Result<()> {
    let provider = Arc::new(FakeProvider::new().with_account("taken@x.com", "pw", user("u0", "taken@x.com", json!({}))));
    let store = SessionStore::new(provider, Arc::new(FakeProfiles::empty()), Role::Teacher);
    assert!(!store.register("taken@x.com", "pw", "Someone", Role::Student).await);
    assert!(store.register("new@x.com", "pw", "Novo", Role::Student).await);
    Ok(())
}

#[tokio::test]
async fn accessors_and_watchers_see_the_same_state() {
    let profiles = FakeProfiles::empty().with(profile("u1", Some("teacher"), Some("Ana"), None));
    let store = SessionStore::new(Arc::new(FakeProvider::new()), Arc::new(profiles), Role::Teacher);
    let rx = store.watch();
    assert_eq!(*rx.borrow(), SessionState::Loading);

    store.apply(AuthEvent::SignedIn(session("u1", "ana@x.com"))).await;
    assert!(rx.has_changed().unwrap_or(false));
    let seen = rx.borrow().clone();
    assert_eq!(seen, store.state());
    assert_eq!(store.identity().map(|i| i.display_name).as_deref(), Some("Ana"));

    store.apply(AuthEvent::SignedOut).await;
    assert_eq!(*rx.borrow(), SessionState::Anonymous);
    assert_eq!(store.state(), SessionState::Anonymous);
}
