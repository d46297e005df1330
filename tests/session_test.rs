mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{admin, parent, settle, store_with, wait_for, ScriptedBackend, ADMIN_EMAIL, SITE_URL};
use village_gate::auth::{Principal, Provider, Role};
use village_gate::error::GateError;
use village_gate::session::store::SignOutOutcome;
use village_gate::session::SessionStatus;

#[tokio::test]
async fn test_session_starts_initializing() {
    let backend = ScriptedBackend::new(Some(parent()));
    let store = store_with(&backend, Some(ADMIN_EMAIL));

    let session = store.current_session();
    assert_eq!(session.status, SessionStatus::Initializing);
    assert!(session.principal.is_none());
    assert!(!store.is_initialized());
}

#[tokio::test]
async fn test_initialize_resolves_with_backend_session() {
    let backend = ScriptedBackend::new(Some(parent()));
    let store = store_with(&backend, Some(ADMIN_EMAIL));

    store.initialize().await.unwrap();

    let session = store.current_session();
    assert_eq!(session.status, SessionStatus::Resolved);
    assert_eq!(session.principal, Some(parent()));
    assert_eq!(session.role, Some(Role::Parent));
    assert_eq!(session.user_id(), Some("parent-1"));
    assert!(session.resolved_at.is_some());
}

#[tokio::test]
async fn test_initialize_without_session_resolves_signed_out() {
    let backend = ScriptedBackend::new(None);
    let store = store_with(&backend, Some(ADMIN_EMAIL));

    store.initialize().await.unwrap();

    let session = store.current_session();
    assert_eq!(session.status, SessionStatus::Resolved);
    assert!(session.principal.is_none());
    assert_eq!(session.role, None);
}

#[tokio::test]
async fn test_initialize_twice_is_rejected() {
    let backend = ScriptedBackend::new(None);
    let store = store_with(&backend, None);

    store.initialize().await.unwrap();
    let second = store.initialize().await;

    assert!(matches!(second, Err(GateError::AlreadyInitialized)));
    assert_eq!(store.current_session().status, SessionStatus::Resolved);
}

#[tokio::test]
async fn test_failing_backend_still_resolves_signed_out() {
    let backend = ScriptedBackend::new(Some(parent()));
    backend.fail_current.store(true, Ordering::SeqCst);
    let store = store_with(&backend, None);

    store.initialize().await.unwrap();

    let session = store.current_session();
    assert_eq!(session.status, SessionStatus::Resolved);
    assert!(session.principal.is_none());
}

#[tokio::test]
async fn test_admin_role_is_case_insensitive() {
    let backend = ScriptedBackend::new(Some(admin()));
    let store = store_with(&backend, Some("admin@example.com"));

    store.initialize().await.unwrap();

    assert_eq!(store.current_session().role, Some(Role::Admin));
}

#[tokio::test]
async fn test_no_admin_email_makes_everyone_parent() {
    let backend = ScriptedBackend::new(Some(admin()));
    let store = store_with(&backend, None);

    store.initialize().await.unwrap();

    assert_eq!(store.current_session().role, Some(Role::Parent));
}

#[tokio::test]
async fn test_sign_out_survives_backend_failure() {
    let backend = ScriptedBackend::new(Some(parent()));
    backend.fail_invalidate.store(true, Ordering::SeqCst);
    let store = store_with(&backend, None);
    store.initialize().await.unwrap();

    let outcome = store.sign_out().await;

    assert!(matches!(outcome, SignOutOutcome::LocalOnly(GateError::AuthBackend(_))));
    assert!(outcome.warning().is_some());
    let session = store.current_session();
    assert_eq!(session.status, SessionStatus::Resolved);
    assert!(session.principal.is_none());
    assert_eq!(session.role, None);
    assert_eq!(backend.invalidations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sign_out_complete() {
    let backend = ScriptedBackend::new(Some(parent()));
    let store = store_with(&backend, None);
    store.initialize().await.unwrap();

    let outcome = store.sign_out().await;

    assert!(matches!(outcome, SignOutOutcome::Complete));
    assert!(outcome.warning().is_none());
    assert!(store.current_session().principal.is_none());
}

#[tokio::test]
async fn test_notifications_are_applied() {
    let backend = ScriptedBackend::new(None);
    let store = store_with(&backend, Some(ADMIN_EMAIL));
    store.initialize().await.unwrap();

    backend.push(Some(admin()));

    let session = wait_for(&store, |s| s.principal.is_some()).await;
    assert_eq!(session.principal, Some(admin()));
    assert_eq!(session.role, Some(Role::Admin));
}

#[tokio::test]
async fn test_last_notification_wins() {
    let backend = ScriptedBackend::new(None);
    let store = store_with(&backend, None);
    store.initialize().await.unwrap();

    backend.push(Some(parent()));
    backend.push(None);
    settle().await;

    assert!(store.current_session().principal.is_none());

    backend.push(None);
    backend.push(Some(parent()));
    settle().await;

    assert_eq!(store.current_session().principal, Some(parent()));
}

#[tokio::test]
async fn test_last_notification_wins_during_sign_in() {
    let backend = ScriptedBackend::new(None);
    backend.hold_ceremony.store(true, Ordering::SeqCst);
    let store = store_with(&backend, None);
    store.initialize().await.unwrap();

    let signing_in = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.sign_in_with_provider(Provider::Google).await })
    };
    tokio::task::yield_now().await;

    backend.push(Some(parent()));
    backend.push(None);
    settle().await;
    backend.ceremony_gate.notify_one();

    let ticket = signing_in.await.unwrap().unwrap();
    assert_eq!(ticket.provider, Provider::Google);
    assert!(ticket.redirect_url.is_some());
    assert!(store.current_session().principal.is_none());
}

#[tokio::test]
async fn test_failed_sign_in_leaves_session_untouched() {
    let backend = ScriptedBackend::new(Some(parent()));
    backend.fail_ceremony.store(true, Ordering::SeqCst);
    let store = store_with(&backend, None);
    store.initialize().await.unwrap();
    let before = store.current_session();

    let result = store.sign_in_with_provider(Provider::Google).await;

    assert!(matches!(result, Err(GateError::AuthBackend(_))));
    assert_eq!(store.current_session(), before);
}

#[tokio::test]
async fn test_late_notification_after_abandoned_sign_in() {
    let backend = ScriptedBackend::new(None);
    let store = store_with(&backend, None);
    store.initialize().await.unwrap();

    // Start a ceremony and walk away from it
    let ticket = store.sign_in_with_provider(Provider::Github).await.unwrap();
    drop(ticket);

    backend.push(Some(parent()));

    let session = wait_for(&store, |s| s.principal.is_some()).await;
    assert_eq!(session.user_id(), Some("parent-1"));
}

#[tokio::test]
async fn test_notification_during_initialize_beats_stale_answer() {
    let backend = ScriptedBackend::new(Some(parent()));
    backend.hold_current.store(true, Ordering::SeqCst);
    let store = store_with(&backend, None);

    let initializing = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.initialize().await })
    };
    while !backend.current_requested.load(Ordering::SeqCst) {
        tokio::task::yield_now().await;
    }

    let newer = Principal::new("someone-else").with_email("other@example.com");
    backend.push(Some(newer.clone()));
    let session = wait_for(&store, |s| s.principal.is_some()).await;
    assert_eq!(session.status, SessionStatus::Resolved);

    // The one-shot answer arrives afterwards and is older
    backend.current_gate.notify_one();
    initializing.await.unwrap().unwrap();

    assert_eq!(store.current_session().principal, Some(newer));
}

#[tokio::test]
async fn test_magic_link_requires_an_email() {
    let backend = ScriptedBackend::new(None);
    let store = store_with(&backend, None);
    store.initialize().await.unwrap();

    assert!(store.sign_in_with_magic_link("not an email", None).await.is_err());
    assert!(store
        .sign_in_with_magic_link("parent@example.com", Some(serde_json::json!({ "first_name": "Ada" })))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_resolved_waits_for_initialize() {
    let backend = ScriptedBackend::new(Some(parent()));
    let store = store_with(&backend, None);

    let waiter = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.resolved().await })
    };
    store.initialize().await.unwrap();

    let session = waiter.await.unwrap();
    assert_eq!(session.status, SessionStatus::Resolved);
    assert_eq!(session.principal, Some(parent()));
}

#[tokio::test]
async fn test_ceremonies_return_to_the_callback() {
    let backend = ScriptedBackend::new(None);
    let store = store_with(&backend, None);
    store.initialize().await.unwrap();

    store.sign_in_with_provider(Provider::Google).await.unwrap();
    store
        .sign_in_with_magic_link("parent@example.com", None)
        .await
        .unwrap();

    let expected = format!("{}/auth/callback", SITE_URL);
    assert_eq!(store.return_target(), expected);
    assert_eq!(
        *backend.return_targets.lock().unwrap(),
        vec![expected.clone(), expected]
    );
}

#[tokio::test]
async fn test_code_exchange_unsupported_by_backend() {
    let backend = ScriptedBackend::new(None);
    let store = store_with(&backend, None);
    store.initialize().await.unwrap();

    let result = store.complete_code_exchange("some-code").await;
    assert!(matches!(result, Err(GateError::NotSupported(_))));
    assert!(store.current_session().principal.is_none());
}
