use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::backend::{CeremonyTicket, IdentityBackend, Provider, SessionChange};
use crate::constants::CALLBACK_PATH;
use crate::error::{GateError, Result};
use crate::security_logger::SecurityEvent;
use crate::session::{Session, SessionStatus};

/// Result of a sign-out; the local session is cleared in both cases
#[derive(Debug)]
pub enum SignOutOutcome {
    Complete,
    /// The backend could not be told; only the local session was cleared
    LocalOnly(GateError),
}

impl SignOutOutcome {
    pub fn warning(&self) -> Option<String> {
        match self {
            SignOutOutcome::Complete => None,
            SignOutOutcome::LocalOnly(e) => Some(e.to_string()),
        }
    }
}

/// Single authoritative source of who is currently signed in.
///
/// The store is the only writer of the session: its own methods and the
/// task applying backend notifications. Everyone else reads snapshots or
/// subscribes to changes.
pub struct SessionStore {
    backend: Arc<dyn IdentityBackend>,
    admin_email: Option<String>,
    /// Absolute URL the identity ceremonies send the user agent back to
    return_target: String,
    state: watch::Sender<Session>,
    initialized: AtomicBool,
    /// Bumped on every mutation after the initial resolution
    generation: AtomicU64,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        admin_email: Option<String>,
        site_url: &str,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(Session::initializing());
        Arc::new(Self {
            backend,
            admin_email,
            return_target: format!("{}{}", site_url.trim_end_matches('/'), CALLBACK_PATH),
            state,
            initialized: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            listener: Mutex::new(None),
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Begin resolution: subscribe to backend changes, then ask for the current session.
    ///
    /// Moves the session to `Resolved` exactly once. Calling it twice is an error.
    /// A failing backend still resolves the session, as signed out.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(GateError::AlreadyInitialized);
        }

        // Subscribe before the one-shot lookup so nothing in between is missed
        let changes = self.backend.subscribe();
        let handle = tokio::spawn(listen(Arc::downgrade(self), changes));
        *self.listener.lock()? = Some(handle);

        let seen = self.generation.load(Ordering::SeqCst);
        let principal = match self.backend.get_current_session().await {
            Ok(principal) => principal,
            Err(e) => {
                log::warn!(
                    "{} backend could not report the current session, starting signed out: {}",
                    self.backend_name(),
                    e
                );
                None
            }
        };

        let admin_email = self.admin_email.as_deref();
        self.state.send_if_modified(|session| {
            // A notification applied meanwhile is newer than this answer
            if self.generation.load(Ordering::SeqCst) != seen {
                return false;
            }
            *session = Session::resolved(principal, admin_email);
            true
        });

        let session = self.current_session();
        log::info!(
            "Session resolved via {} backend: {}",
            self.backend_name(),
            session.user_id().unwrap_or("signed out")
        );
        Ok(())
    }

    /// Synchronous snapshot of the session
    pub fn current_session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receive every session mutation
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn return_target(&self) -> &str {
        &self.return_target
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Apply a backend notification. The latest one always wins.
    fn apply_change(&self, change: SessionChange) {
        let previous = self.current_session();
        let admin_email = self.admin_email.as_deref();

        self.state.send_modify(|session| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *session = Session::resolved(change.principal.clone(), admin_email);
        });

        match (&previous.principal, &change.principal) {
            (_, Some(principal)) if previous.principal.as_ref() != Some(principal) => {
                SecurityEvent::SignedIn {
                    user_id: principal.id.clone(),
                }
                .log();
            }
            (Some(old), None) => {
                SecurityEvent::SignedOut {
                    user_id: Some(old.id.clone()),
                }
                .log();
            }
            _ => log::debug!("Session change {:?} applied", change.event),
        }
    }

    /// Start an external sign-in ceremony.
    ///
    /// The returned ticket is only the pending outcome: success shows up
    /// later as a backend notification. Failure leaves the session untouched.
    pub async fn sign_in_with_provider(&self, provider: Provider) -> Result<CeremonyTicket> {
        SecurityEvent::SignInStarted {
            provider: provider.to_string(),
        }
        .log();

        self.backend
            .begin_oauth_ceremony(provider, &self.return_target)
            .await
            .map_err(|e| self.sign_in_failed(provider.as_str(), e))
    }

    /// Request a passwordless sign-in link for `email`
    pub async fn sign_in_with_magic_link(
        &self,
        email: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(GateError::AuthBackend(format!(
                "'{}' is not a valid email address",
                email
            )));
        }

        SecurityEvent::SignInStarted {
            provider: "magic_link".to_string(),
        }
        .log();

        self.backend
            .send_magic_link(email, metadata, &self.return_target)
            .await
            .map_err(|e| self.sign_in_failed("magic_link", e))
    }

    /// Hand an access token from a ceremony callback to the backend
    pub async fn complete_ceremony(&self, access_token: &str) -> Result<()> {
        self.backend
            .complete_ceremony(access_token)
            .await
            .map_err(|e| self.sign_in_failed("callback", e))
    }

    /// Exchange an authorization code from a ceremony callback
    pub async fn complete_code_exchange(&self, auth_code: &str) -> Result<()> {
        self.backend
            .exchange_code(auth_code)
            .await
            .map_err(|e| self.sign_in_failed("callback", e))
    }

    fn sign_in_failed(&self, provider: &str, error: GateError) -> GateError {
        SecurityEvent::SignInFailed {
            provider: provider.to_string(),
            reason: error.to_string(),
        }
        .log();

        match error {
            GateError::AuthBackend(_) | GateError::NotSupported(_) => error,
            other => GateError::AuthBackend(other.to_string()),
        }
    }

    /// Clear the local session, then ask the backend to invalidate it.
    ///
    /// Local state is always cleared first; a backend failure only degrades
    /// the outcome and is never returned as an error.
    pub async fn sign_out(&self) -> SignOutOutcome {
        let previous = self.current_session();
        let admin_email = self.admin_email.as_deref();

        self.state.send_modify(|session| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *session = Session::resolved(None, admin_email);
        });

        let user_id = previous.user_id().map(str::to_string);
        match self.backend.invalidate_session().await {
            Ok(()) => {
                SecurityEvent::SignedOut { user_id }.log();
                SignOutOutcome::Complete
            }
            Err(e) => {
                SecurityEvent::SignOutDegraded {
                    user_id,
                    reason: e.to_string(),
                }
                .log();
                SignOutOutcome::LocalOnly(e)
            }
        }
    }

    /// Wait until the session has been resolved
    pub async fn resolved(&self) -> Session {
        let mut rx = self.subscribe();
        loop {
            {
                let session = rx.borrow_and_update();
                if session.status == SessionStatus::Resolved {
                    return session.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.current_session();
            }
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}

/// Apply backend notifications in arrival order until the store goes away
async fn listen(
    store: Weak<SessionStore>,
    mut changes: tokio::sync::broadcast::Receiver<SessionChange>,
) {
    loop {
        match changes.recv().await {
            Ok(change) => {
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.apply_change(change);
            }
            // Skipped changes are older than what is still queued
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Skipped {} stale session notifications", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
