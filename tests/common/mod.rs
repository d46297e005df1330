// Shared test doubles for the identity backend
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

use village_gate::auth::{CeremonyTicket, IdentityBackend, Principal, Provider, SessionChange};
use village_gate::error::{GateError, Result};
use village_gate::session::{Session, SessionStore};

/// Backend whose answers and failures are scripted by the test
pub struct ScriptedBackend {
    changes: broadcast::Sender<SessionChange>,
    current: Mutex<Option<Principal>>,
    pub fail_current: AtomicBool,
    pub fail_ceremony: AtomicBool,
    pub fail_invalidate: AtomicBool,
    /// When set, the one-shot lookup waits for a permit
    pub hold_current: AtomicBool,
    pub current_gate: Notify,
    pub current_requested: AtomicBool,
    /// When set, ceremonies wait for a permit
    pub hold_ceremony: AtomicBool,
    pub ceremony_gate: Notify,
    pub invalidations: AtomicUsize,
    /// Return targets handed to every ceremony, in order
    pub return_targets: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(current: Option<Principal>) -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            changes,
            current: Mutex::new(current),
            fail_current: AtomicBool::new(false),
            fail_ceremony: AtomicBool::new(false),
            fail_invalidate: AtomicBool::new(false),
            hold_current: AtomicBool::new(false),
            current_gate: Notify::new(),
            current_requested: AtomicBool::new(false),
            hold_ceremony: AtomicBool::new(false),
            ceremony_gate: Notify::new(),
            invalidations: AtomicUsize::new(0),
            return_targets: Mutex::new(Vec::new()),
        })
    }

    /// Deliver a change notification as the identity backend would
    pub fn push(&self, principal: Option<Principal>) {
        let change = match principal {
            Some(p) => SessionChange::signed_in(p),
            None => SessionChange::signed_out(),
        };
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl IdentityBackend for ScriptedBackend {
    fn backend_name(&self) -> &'static str {
        "SCRIPTED"
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn get_current_session(&self) -> Result<Option<Principal>> {
        self.current_requested.store(true, Ordering::SeqCst);
        if self.hold_current.load(Ordering::SeqCst) {
            self.current_gate.notified().await;
        }
        if self.fail_current.load(Ordering::SeqCst) {
            return Err(GateError::AuthBackend("backend unreachable".to_string()));
        }
        Ok(self.current.lock().unwrap().clone())
    }

    async fn begin_oauth_ceremony(
        &self,
        provider: Provider,
        return_target: &str,
    ) -> Result<CeremonyTicket> {
        self.return_targets.lock().unwrap().push(return_target.to_string());
        if self.hold_ceremony.load(Ordering::SeqCst) {
            self.ceremony_gate.notified().await;
        }
        if self.fail_ceremony.load(Ordering::SeqCst) {
            return Err(GateError::AuthBackend("network unreachable".to_string()));
        }
        Ok(CeremonyTicket::new(
            provider,
            Some(format!("https://idp.example/authorize?return={}", return_target)),
        ))
    }

    async fn invalidate_session(&self) -> Result<()> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        if self.fail_invalidate.load(Ordering::SeqCst) {
            return Err(GateError::AuthBackend("logout endpoint unreachable".to_string()));
        }
        Ok(())
    }

    async fn send_magic_link(
        &self,
        _email: &str,
        _metadata: Option<serde_json::Value>,
        return_target: &str,
    ) -> Result<()> {
        self.return_targets.lock().unwrap().push(return_target.to_string());
        Ok(())
    }
}

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const SITE_URL: &str = "http://127.0.0.1:3030";

pub fn parent() -> Principal {
    Principal::new("parent-1")
        .with_email("parent@example.com")
        .with_display_name("Thompson Family")
}

pub fn admin() -> Principal {
    Principal::new("admin-1")
        .with_email("Admin@Example.com")
        .with_display_name("Dana Director")
}

pub fn store_with(backend: &Arc<ScriptedBackend>, admin_email: Option<&str>) -> Arc<SessionStore> {
    SessionStore::new(backend.clone(), admin_email.map(str::to_string), SITE_URL)
}

/// Wait until the store's session satisfies `pred`
pub async fn wait_for<F>(store: &SessionStore, pred: F) -> Session
where
    F: Fn(&Session) -> bool,
{
    let mut rx = store.subscribe();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            {
                let session = rx.borrow_and_update();
                if pred(&session) {
                    return session.clone();
                }
            }
            rx.changed().await.expect("session store dropped");
        }
    })
    .await
    .expect("timed out waiting for session state")
}

/// Give spawned notification tasks time to drain
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
