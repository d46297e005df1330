//! Hosted identity backend speaking the GoTrue REST API

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::Url;

use crate::auth::backend::{
    AuthEvent, CeremonyTicket, IdentityBackend, Provider, SessionChange,
};
use crate::auth::pkce::{PkcePair, CHALLENGE_METHOD};
use crate::auth::principal::Principal;
use crate::auth::token::{TokenVerifier, UserMetadata};
use crate::constants::SESSION_CHANGE_CAPACITY;
use crate::error::{GateError, Result};

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

impl From<RemoteUser> for Principal {
    fn from(user: RemoteUser) -> Self {
        let display_name = user
            .user_metadata
            .full_name
            .or(user.user_metadata.name)
            .filter(|n| !n.trim().is_empty());

        Principal {
            id: user.id,
            email: user.email.filter(|e| !e.is_empty()),
            display_name,
            avatar_url: user.user_metadata.avatar_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteSettings {
    #[serde(default)]
    external: HashMap<String, bool>,
}

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    user: RemoteUser,
}

/// Token held for the active session together with the principal it resolved to
#[derive(Debug, Clone)]
struct HeldSession {
    access_token: String,
    principal: Principal,
}

pub struct HostedBackend {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    verifier: Option<TokenVerifier>,
    held: RwLock<Option<HeldSession>>,
    /// PKCE verifier of the ceremony the user agent is currently away for
    pending_verifier: Mutex<Option<String>>,
    changes: broadcast::Sender<SessionChange>,
}

impl HostedBackend {
    pub fn new(base_url: &str, api_key: String, jwt_secret: Option<&str>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| GateError::Config(format!("Invalid backend URL {}: {}", base_url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let (changes, _) = broadcast::channel(SESSION_CHANGE_CAPACITY);

        Ok(Self {
            client,
            base_url,
            api_key,
            verifier: jwt_secret.map(TokenVerifier::new),
            held: RwLock::new(None),
            pending_verifier: Mutex::new(None),
            changes,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| GateError::Config(format!("Invalid backend endpoint {}: {}", path, e)))
    }

    fn held_token(&self) -> Result<Option<String>> {
        Ok(self.held.read()?.as_ref().map(|h| h.access_token.clone()))
    }

    fn take_held(&self) -> Result<Option<HeldSession>> {
        Ok(self.held.write()?.take())
    }

    /// Start a PKCE exchange; a newer ceremony replaces an abandoned one
    fn begin_exchange(&self) -> Result<PkcePair> {
        let pair = PkcePair::generate();
        *self.pending_verifier.lock()? = Some(pair.verifier.clone());
        Ok(pair)
    }

    fn hold(&self, access_token: &str, principal: Principal) -> Result<()> {
        *self.held.write()? = Some(HeldSession {
            access_token: access_token.to_string(),
            principal: principal.clone(),
        });
        self.notify(SessionChange::signed_in(principal));
        Ok(())
    }

    fn notify(&self, change: SessionChange) {
        // No receiver just means nobody is listening yet
        let _ = self.changes.send(change);
    }

    /// Resolve an access token to its principal with the backend.
    ///
    /// `Ok(None)` means the backend rejected the token.
    async fn fetch_user(&self, access_token: &str) -> Result<Option<Principal>> {
        let response = self
            .client
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => {
                let user: RemoteUser = response.json().await?;
                Ok(Some(user.into()))
            }
            status => Err(GateError::AuthBackend(format!(
                "user lookup failed with status {}",
                status
            ))),
        }
    }

    /// Local verification when a JWT secret is configured, remote otherwise
    async fn resolve_token(&self, access_token: &str) -> Result<Principal> {
        match &self.verifier {
            Some(verifier) => verifier.verify(access_token),
            None => self.fetch_user(access_token).await?.ok_or_else(|| {
                GateError::InvalidToken("backend rejected the access token".to_string())
            }),
        }
    }

    async fn provider_enabled(&self, provider: Provider) -> Result<bool> {
        let response = self
            .client
            .get(self.endpoint("auth/v1/settings")?)
            .header("apikey", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GateError::AuthBackend(format!(
                "settings lookup failed with status {}",
                response.status()
            )));
        }

        let settings: RemoteSettings = response.json().await?;
        Ok(settings
            .external
            .get(provider.as_str())
            .copied()
            .unwrap_or(false))
    }

    /// Re-check the held token on a fixed interval and report external sign-outs
    pub fn spawn_watcher(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.revalidate().await {
                    log::warn!("Session revalidation skipped: {}", e);
                }
            }
        })
    }

    async fn revalidate(&self) -> Result<()> {
        let Some(token) = self.held_token()? else {
            return Ok(());
        };

        match self.fetch_user(&token).await? {
            None => {
                log::info!("Backend no longer accepts the held session, signing out locally");
                let mut held = self.held.write()?;
                // Only drop the token we checked; a newer sign-in may have replaced it
                if held.as_ref().map(|h| h.access_token.as_str()) == Some(token.as_str()) {
                    *held = None;
                    drop(held);
                    self.notify(SessionChange::signed_out());
                }
            }
            Some(principal) => {
                let mut held = self.held.write()?;
                if let Some(current) = held.as_mut() {
                    if current.access_token == token && current.principal != principal {
                        current.principal = principal.clone();
                        drop(held);
                        self.notify(SessionChange {
                            event: AuthEvent::UserUpdated,
                            principal: Some(principal),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityBackend for HostedBackend {
    fn backend_name(&self) -> &'static str {
        "HOSTED"
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn get_current_session(&self) -> Result<Option<Principal>> {
        let Some(token) = self.held_token()? else {
            return Ok(None);
        };

        match self.resolve_token(&token).await {
            Ok(principal) => {
                if let Some(held) = self.held.write()?.as_mut() {
                    held.principal = principal.clone();
                }
                Ok(Some(principal))
            }
            Err(GateError::InvalidToken(reason)) => {
                log::debug!("Held access token rejected: {}", reason);
                self.take_held()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn begin_oauth_ceremony(
        &self,
        provider: Provider,
        return_target: &str,
    ) -> Result<CeremonyTicket> {
        if !self.provider_enabled(provider).await? {
            return Err(GateError::AuthBackend(format!(
                "provider {} is not enabled on the identity backend",
                provider
            )));
        }

        let pkce = self.begin_exchange()?;
        let mut authorize = self.endpoint("auth/v1/authorize")?;
        authorize
            .query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", return_target)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", CHALLENGE_METHOD);

        Ok(CeremonyTicket::new(provider, Some(authorize.to_string())))
    }

    async fn invalidate_session(&self) -> Result<()> {
        let Some(held) = self.take_held()? else {
            return Ok(());
        };
        self.notify(SessionChange::signed_out());

        let response = self
            .client
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", &self.api_key)
            .bearer_auth(&held.access_token)
            .send()
            .await?;

        match response.status() {
            // Already gone on the backend side
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(GateError::AuthBackend(format!(
                "logout failed with status {}",
                status
            ))),
        }
    }

    async fn send_magic_link(
        &self,
        email: &str,
        metadata: Option<serde_json::Value>,
        return_target: &str,
    ) -> Result<()> {
        let mut otp = self.endpoint("auth/v1/otp")?;
        otp.query_pairs_mut().append_pair("redirect_to", return_target);

        let pkce = self.begin_exchange()?;
        let body = serde_json::json!({
            "email": email,
            "create_user": true,
            "data": metadata.unwrap_or_else(|| serde_json::json!({})),
            "code_challenge": pkce.challenge,
            "code_challenge_method": CHALLENGE_METHOD,
        });

        let response = self
            .client
            .post(otp)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GateError::AuthBackend(format!(
                "magic link request failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn complete_ceremony(&self, access_token: &str) -> Result<()> {
        let principal = self.resolve_token(access_token).await?;
        self.hold(access_token, principal)
    }

    async fn exchange_code(&self, auth_code: &str) -> Result<()> {
        let pending = self.pending_verifier.lock()?.take();
        let Some(verifier) = pending else {
            return Err(GateError::AuthBackend(
                "no sign-in ceremony is waiting for an authorization code".to_string(),
            ));
        };

        let mut token = self.endpoint("auth/v1/token")?;
        token.query_pairs_mut().append_pair("grant_type", "pkce");

        let response = self
            .client
            .post(token)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({
                "auth_code": auth_code,
                "code_verifier": verifier,
            }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let grant: TokenGrant = response.json().await?;
                self.hold(&grant.access_token, grant.user.into())
            }
            status if status.is_client_error() => Err(GateError::InvalidToken(format!(
                "authorization code rejected with status {}",
                status
            ))),
            status => Err(GateError::AuthBackend(format!(
                "code exchange failed with status {}",
                status
            ))),
        }
    }
}
