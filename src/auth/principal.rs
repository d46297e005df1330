use serde::{Deserialize, Serialize};

use crate::guard::Destination;

/// Access tier derived from a principal's email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Parent,
    Admin,
}

impl Role {
    /// Derives the role of a principal against the configured administrator email.
    ///
    /// The comparison ignores ASCII case. Without a configured administrator
    /// email, or without an email on the principal, the role is always `Parent`.
    pub fn derive(principal: &Principal, admin_email: Option<&str>) -> Self {
        match (principal.email.as_deref(), admin_email) {
            (Some(email), Some(admin)) if email.trim().eq_ignore_ascii_case(admin.trim()) => {
                Role::Admin
            }
            _ => Role::Parent,
        }
    }

    /// The single landing destination for this role
    pub fn home(&self) -> Destination {
        match self {
            Role::Parent => Destination::ParentHome,
            Role::Admin => Destination::AdminHome,
        }
    }
}

/// The authenticated identity record for the current user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Identifier assigned by the identity backend
    pub id: String,
    /// Email address (optional, some providers do not share it)
    pub email: Option<String>,
    /// Display name, usually the provider's full name
    pub display_name: Option<String>,
    /// Avatar URL (optional)
    pub avatar_url: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
            avatar_url: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// First word of the display name
    pub fn first_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
    }

    /// Everything after the first word of the display name
    pub fn last_name(&self) -> Option<&str> {
        let name = self.display_name.as_deref()?.trim();
        let (_, rest) = name.split_once(char::is_whitespace)?;
        let rest = rest.trim();
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    }
}
