//! Village Gate - session store and role-based route guard for the Village daycare portal
//!
//! This library keeps track of who is signed in, backed by a hosted identity
//! service or a local fallback, and decides for every navigation whether the
//! requested page may be shown or where the user must be sent instead.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod navigation;
pub mod security_logger;
pub mod session;

// Re-export main components
pub use config::{BackendKind, GateConfig};
pub use error::{GateError, Result};
pub use guard::{Destination, GuardDecision, RouteGuard, RouteRequirement, RouteTable};
pub use navigation::{NavigationOutcome, Navigator};
pub use session::{Session, SessionStatus, SessionStore};
