//! Route guard: decides, per navigation, whether a destination may be served

pub mod routes;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::principal::Role;
use crate::constants::{ADMIN_HOME_PATH, LOGIN_PATH, PARENT_HOME_PATH};
use crate::security_logger::SecurityEvent;
use crate::session::{Session, SessionStatus};

pub use routes::RouteTable;

/// Access requirement declared by a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteRequirement {
    Public,
    AnyAuthenticated,
    Admin,
}

impl RouteRequirement {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "public" | "none" => Some(RouteRequirement::Public),
            "anyauthenticated" | "authenticated" => Some(RouteRequirement::AnyAuthenticated),
            "admin" => Some(RouteRequirement::Admin),
            _ => None,
        }
    }

    /// Parses a requirement, treating anything unrecognized as `Admin`
    pub fn parse_or_restrictive(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            SecurityEvent::ConfigurationWarning {
                component: "route_guard".to_string(),
                warning: format!("unrecognized route requirement '{}', treating as Admin", s),
            }
            .log();
            RouteRequirement::Admin
        })
    }
}

/// Redirect targets the guard can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Destination {
    Login,
    ParentHome,
    AdminHome,
}

impl Destination {
    pub fn path(&self) -> &'static str {
        match self {
            Destination::Login => LOGIN_PATH,
            Destination::ParentHome => PARENT_HOME_PATH,
            Destination::AdminHome => ADMIN_HOME_PATH,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of a guard evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardDecision {
    Allow,
    Redirect(Destination),
    /// The session is not resolved yet; nothing may be decided
    Defer,
}

/// Pure decision function over `(session, requirement)`
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteGuard;

impl RouteGuard {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether a destination with `requirement` may be served for `session`.
    ///
    /// Authenticated users are steered to exactly one home per role: they never
    /// see the public surface nor the other role's protected surface.
    pub fn evaluate(&self, session: &Session, requirement: RouteRequirement) -> GuardDecision {
        if session.status == SessionStatus::Initializing {
            return GuardDecision::Defer;
        }

        let role = match (&session.principal, session.role) {
            (None, _) => None,
            (Some(_), Some(role)) => Some(role),
            // A principal without a derived role only happens for hand-built
            // sessions; least privilege applies.
            (Some(_), None) => Some(Role::Parent),
        };

        match (role, requirement) {
            (None, RouteRequirement::Public) => GuardDecision::Allow,
            (None, RouteRequirement::AnyAuthenticated | RouteRequirement::Admin) => {
                GuardDecision::Redirect(Destination::Login)
            }
            (Some(Role::Parent), RouteRequirement::AnyAuthenticated)
            | (Some(Role::Admin), RouteRequirement::Admin) => GuardDecision::Allow,
            // Signed-in users only ever land on their own home
            (Some(role), _) => GuardDecision::Redirect(role.home()),
        }
    }

    /// Evaluate against a requirement given as configuration text
    pub fn evaluate_raw(&self, session: &Session, requirement: &str) -> GuardDecision {
        self.evaluate(session, RouteRequirement::parse_or_restrictive(requirement))
    }
}
