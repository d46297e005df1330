//! Pluggable identity backend
//!
//! The session store talks to exactly one backend, selected at startup:
//! the hosted backend when credentials are configured, otherwise the local
//! fallback that persists a mock principal on disk.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::principal::Principal;
use crate::error::{GateError, Result};

/// Kind of change reported by the identity backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A change notification; `principal` is the complete new state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    pub event: AuthEvent,
    pub principal: Option<Principal>,
}

impl SessionChange {
    pub fn signed_in(principal: Principal) -> Self {
        Self {
            event: AuthEvent::SignedIn,
            principal: Some(principal),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            event: AuthEvent::SignedOut,
            principal: None,
        }
    }
}

/// External identity providers offered on the login surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Github,
    Apple,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Github => "github",
            Provider::Apple => "apple",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "github" => Ok(Provider::Github),
            "apple" => Ok(Provider::Apple),
            other => Err(GateError::NotSupported(format!(
                "unknown identity provider '{}'",
                other
            ))),
        }
    }
}

/// Pending outcome of a sign-in ceremony
///
/// Success is never reported here: it arrives later as a `SessionChange`.
#[derive(Debug, Clone, Serialize)]
pub struct CeremonyTicket {
    pub attempt_id: Uuid,
    pub provider: Provider,
    /// Where the user agent must go to continue the ceremony, if anywhere
    pub redirect_url: Option<String>,
}

impl CeremonyTicket {
    pub fn new(provider: Provider, redirect_url: Option<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            provider,
            redirect_url,
        }
    }
}

/// Trait for identity backends
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Get the backend name for logging/debugging
    fn backend_name(&self) -> &'static str;

    /// Ongoing subscription to session changes from any origin
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;

    /// One-shot lookup of the session the backend currently holds
    async fn get_current_session(&self) -> Result<Option<Principal>>;

    /// Start an out-of-band sign-in ceremony
    async fn begin_oauth_ceremony(
        &self,
        provider: Provider,
        return_target: &str,
    ) -> Result<CeremonyTicket>;

    /// Ask the backend to forget the current session
    async fn invalidate_session(&self) -> Result<()>;

    /// Send a passwordless sign-in link
    async fn send_magic_link(
        &self,
        email: &str,
        metadata: Option<serde_json::Value>,
        return_target: &str,
    ) -> Result<()>;

    /// Optional: finish a ceremony with the access token handed back by the provider
    async fn complete_ceremony(&self, _access_token: &str) -> Result<()> {
        Err(GateError::NotSupported(format!(
            "{} backend does not accept ceremony callbacks",
            self.backend_name()
        )))
    }

    /// Optional: finish a ceremony by exchanging the authorization code handed back
    async fn exchange_code(&self, _auth_code: &str) -> Result<()> {
        Err(GateError::NotSupported(format!(
            "{} backend does not accept authorization codes",
            self.backend_name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!("Google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!(" github ".parse::<Provider>().unwrap(), Provider::Github);
        assert!(matches!(
            "myspace".parse::<Provider>(),
            Err(GateError::NotSupported(_))
        ));
    }
}
