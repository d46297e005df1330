//! Local fallback backend used when no hosted identity backend is configured
//!
//! A mock principal is persisted as JSON so a signed-in state survives
//! restarts, much like a browser keeps it in local storage.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::auth::backend::{CeremonyTicket, IdentityBackend, Provider, SessionChange};
use crate::auth::principal::Principal;
use crate::constants::{
    MOCK_USER_AVATAR, MOCK_USER_EMAIL, MOCK_USER_ID, MOCK_USER_NAME, SESSION_CHANGE_CAPACITY,
};
use crate::error::Result;

pub struct LocalBackend {
    /// `None` keeps the principal in memory only
    store_path: Option<PathBuf>,
    sign_in_delay: Duration,
    mock_principal: Principal,
    memory: RwLock<Option<Principal>>,
    changes: broadcast::Sender<SessionChange>,
}

impl LocalBackend {
    pub fn new(store_path: Option<PathBuf>, sign_in_delay: Duration) -> Self {
        let (changes, _) = broadcast::channel(SESSION_CHANGE_CAPACITY);
        Self {
            store_path,
            sign_in_delay,
            mock_principal: Self::default_principal(),
            memory: RwLock::new(None),
            changes,
        }
    }

    /// In-memory backend that completes ceremonies immediately
    pub fn in_memory() -> Self {
        Self::new(None, Duration::ZERO)
    }

    /// Principal handed out by every local sign-in
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.mock_principal = principal;
        self
    }

    pub fn default_principal() -> Principal {
        Principal::new(MOCK_USER_ID)
            .with_email(MOCK_USER_EMAIL)
            .with_display_name(MOCK_USER_NAME)
            .with_avatar_url(MOCK_USER_AVATAR)
    }

    async fn load(&self) -> Result<Option<Principal>> {
        let Some(path) = &self.store_path else {
            return Ok(self.memory.read()?.clone());
        };

        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, principal: &Principal) -> Result<()> {
        let Some(path) = &self.store_path else {
            *self.memory.write()? = Some(principal.clone());
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(principal)?).await?;
        Ok(())
    }

    async fn forget(&self) -> Result<()> {
        let Some(path) = &self.store_path else {
            *self.memory.write()? = None;
            return Ok(());
        };

        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl IdentityBackend for LocalBackend {
    fn backend_name(&self) -> &'static str {
        "LOCAL"
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn get_current_session(&self) -> Result<Option<Principal>> {
        self.load().await
    }

    async fn begin_oauth_ceremony(
        &self,
        provider: Provider,
        _return_target: &str,
    ) -> Result<CeremonyTicket> {
        let principal = self.mock_principal.clone();
        self.persist(&principal).await?;
        log::info!(
            "Local {} sign-in for {}, completing in {:?}",
            provider,
            principal.id,
            self.sign_in_delay
        );

        let changes = self.changes.clone();
        let delay = self.sign_in_delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = changes.send(SessionChange::signed_in(principal));
        });

        Ok(CeremonyTicket::new(provider, None))
    }

    async fn invalidate_session(&self) -> Result<()> {
        self.forget().await?;
        let _ = self.changes.send(SessionChange::signed_out());
        Ok(())
    }

    async fn send_magic_link(
        &self,
        email: &str,
        metadata: Option<serde_json::Value>,
        _return_target: &str,
    ) -> Result<()> {
        log::info!(
            "Local backend: magic link for {} not sent (metadata: {})",
            email,
            metadata.unwrap_or_default()
        );
        Ok(())
    }
}
