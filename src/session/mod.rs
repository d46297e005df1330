//! Process-wide authentication session

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::auth::principal::{Principal, Role};

pub use store::SessionStore;

/// Whether the identity backend has answered yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Initializing,
    Resolved,
}

/// Snapshot of who is signed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub status: SessionStatus,
    #[serde(serialize_with = "serialize_profile")]
    pub principal: Option<Principal>,
    /// Derived from the principal; `None` when signed out
    pub role: Option<Role>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn initializing() -> Self {
        Self {
            status: SessionStatus::Initializing,
            principal: None,
            role: None,
            resolved_at: None,
        }
    }

    /// A resolved session for `principal`, with the role derived against `admin_email`
    pub fn resolved(principal: Option<Principal>, admin_email: Option<&str>) -> Self {
        let role = principal.as_ref().map(|p| Role::derive(p, admin_email));
        Self {
            status: SessionStatus::Resolved,
            principal,
            role,
            resolved_at: Some(Utc::now()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == SessionStatus::Resolved
    }

    pub fn user_id(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.id.as_str())
    }
}

/// Principal as served to the UI, with the name split the portal greets by
#[derive(Serialize)]
struct Profile<'a> {
    #[serde(flatten)]
    principal: &'a Principal,
    first_name: Option<&'a str>,
    last_name: Option<&'a str>,
}

fn serialize_profile<S>(principal: &Option<Principal>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    principal
        .as_ref()
        .map(|principal| Profile {
            principal,
            first_name: principal.first_name(),
            last_name: principal.last_name(),
        })
        .serialize(serializer)
}
