//! Gate configuration module
//! Reads the environment once at startup; nothing here changes afterwards

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::backend::IdentityBackend;
use crate::auth::hosted::HostedBackend;
use crate::auth::local::LocalBackend;
use crate::constants::{
    DEFAULT_HOST, DEFAULT_MOCK_SIGN_IN_DELAY_MS, DEFAULT_MOCK_STORE_PATH, DEFAULT_PORT,
    DEFAULT_SESSION_POLL_SECS,
};
use crate::error::{GateError, Result};
use crate::guard::RouteTable;
use crate::security_logger::SecurityEvent;

/// Which identity backend the session store talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Hosted {
        url: String,
        api_key: String,
        jwt_secret: Option<String>,
        session_poll: Option<Duration>,
    },
    LocalFallback {
        store_path: PathBuf,
        sign_in_delay: Duration,
    },
}

/// Gate configuration parameters
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub host: String,
    pub port: u16,
    /// Administrator email; `None` makes every principal a parent
    pub admin_email: Option<String>,
    /// Where ceremonies return the user agent to
    pub site_url: String,
    pub backend: BackendKind,
    pub routes: RouteTable,
}

impl GateConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("VILLAGE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get("VILLAGE_PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| GateError::Config(format!("VILLAGE_PORT '{}' is not a valid port", p)))?,
            None => DEFAULT_PORT,
        };

        let admin_email = Self::validate_admin_email(
            lookup("VILLAGE_ADMIN_EMAIL").or_else(|| lookup("NEXT_PUBLIC_ADMIN_EMAIL")),
        );

        let site_url = get("VILLAGE_SITE_URL").unwrap_or_else(|| format!("http://{}:{}", host, port));

        let backend = match (get("SUPABASE_URL"), get("SUPABASE_KEY")) {
            (Some(url), Some(api_key)) => {
                Self::validate_backend_url(&url)?;
                let jwt_secret = get("SUPABASE_JWT_SECRET");
                if let Some(secret) = &jwt_secret {
                    Self::validate_jwt_secret(secret)?;
                }
                let poll_secs = Self::parse_number(&get, "VILLAGE_SESSION_POLL_SECS", DEFAULT_SESSION_POLL_SECS)?;

                BackendKind::Hosted {
                    url,
                    api_key,
                    jwt_secret,
                    session_poll: (poll_secs > 0).then(|| Duration::from_secs(poll_secs)),
                }
            }
            (url, key) => {
                if url.is_some() != key.is_some() {
                    SecurityEvent::ConfigurationWarning {
                        component: "config".to_string(),
                        warning: "only one of SUPABASE_URL and SUPABASE_KEY is set, using the local fallback backend".to_string(),
                    }
                    .log();
                }
                let delay_ms = Self::parse_number(&get, "VILLAGE_MOCK_SIGN_IN_DELAY_MS", DEFAULT_MOCK_SIGN_IN_DELAY_MS)?;

                BackendKind::LocalFallback {
                    store_path: get("VILLAGE_MOCK_STORE")
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_MOCK_STORE_PATH)),
                    sign_in_delay: Duration::from_millis(delay_ms),
                }
            }
        };

        let routes = match get("VILLAGE_ROUTES") {
            Some(spec) => RouteTable::parse(&spec)?,
            None => RouteTable::default(),
        };

        Ok(Self {
            host,
            port,
            admin_email,
            site_url,
            backend,
            routes,
        })
    }

    fn parse_number<G>(get: &G, key: &str, default: u64) -> Result<u64>
    where
        G: Fn(&str) -> Option<String>,
    {
        match get(key) {
            Some(v) => v
                .parse()
                .map_err(|_| GateError::Config(format!("{} '{}' is not a number", key, v))),
            None => Ok(default),
        }
    }

    /// Missing is fine; blank or malformed falls back to no administrator
    fn validate_admin_email(raw: Option<String>) -> Option<String> {
        let raw = raw?;
        let email = raw.trim();

        let well_formed = match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace),
            None => false,
        };

        if well_formed {
            Some(email.to_string())
        } else {
            SecurityEvent::ConfigurationWarning {
                component: "config".to_string(),
                warning: format!("administrator email '{}' is malformed, no principal will be admin", email),
            }
            .log();
            None
        }
    }

    fn validate_backend_url(url: &str) -> Result<()> {
        let parsed = url::Url::parse(url)
            .map_err(|e| GateError::Config(format!("SUPABASE_URL '{}' is not a valid URL: {}", url, e)))?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(GateError::Config(format!(
                "SUPABASE_URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        Ok(())
    }

    /// Validate that the JWT secret meets minimum requirements
    fn validate_jwt_secret(secret: &str) -> Result<()> {
        if secret.len() < 32 {
            return Err(GateError::Config(
                "SUPABASE_JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the configured identity backend, starting the hosted watcher if enabled
    pub fn build_backend(&self) -> Result<Arc<dyn IdentityBackend>> {
        match &self.backend {
            BackendKind::Hosted {
                url,
                api_key,
                jwt_secret,
                session_poll,
            } => {
                let backend = Arc::new(HostedBackend::new(url, api_key.clone(), jwt_secret.as_deref())?);
                if let Some(interval) = session_poll {
                    backend.clone().spawn_watcher(*interval);
                }
                Ok(backend)
            }
            BackendKind::LocalFallback {
                store_path,
                sign_in_delay,
            } => Ok(Arc::new(LocalBackend::new(Some(store_path.clone()), *sign_in_delay))),
        }
    }
}
