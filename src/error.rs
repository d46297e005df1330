use std::error::Error;
use std::fmt;
use std::sync::PoisonError;

#[derive(Debug)]
pub enum GateError {
    // Identity backend errors
    AuthBackend(String),
    InvalidToken(String),
    NotSupported(String),

    // Session lifecycle errors
    AlreadyInitialized,
    SessionLock(String),

    // Local fallback storage errors
    Storage(String),

    // Configuration errors
    Config(String),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthBackend(msg) => write!(f, "Identity backend error: {}", msg),
            Self::InvalidToken(msg) => write!(f, "Invalid access token: {}", msg),
            Self::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            Self::AlreadyInitialized => write!(f, "Session store is already initialized"),
            Self::SessionLock(msg) => write!(f, "Session lock error: {}", msg),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for GateError {}

// Converting from PoisonError to facilitate poisoned mutex handling
impl<T> From<PoisonError<T>> for GateError {
    fn from(err: PoisonError<T>) -> Self {
        GateError::SessionLock(format!("Mutex poisoned: {}", err))
    }
}

impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self {
        GateError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError::Storage(format!("Malformed stored session: {}", err))
    }
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        GateError::AuthBackend(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for GateError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        GateError::InvalidToken(err.to_string())
    }
}

// Generic result type for the gate
pub type Result<T> = std::result::Result<T, GateError>;
