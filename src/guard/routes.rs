use std::collections::HashMap;

use crate::constants::{ADMIN_HOME_PATH, LANDING_PATH, LOGIN_PATH, PARENT_HOME_PATH, SIGNUP_PATH};
use crate::error::{GateError, Result};
use crate::guard::RouteRequirement;

/// Maps portal paths to their access requirement
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: HashMap<String, RouteRequirement>,
}

impl Default for RouteTable {
    fn default() -> Self {
        let mut routes = HashMap::new();
        routes.insert(LANDING_PATH.to_string(), RouteRequirement::Public);
        routes.insert(LOGIN_PATH.to_string(), RouteRequirement::Public);
        routes.insert(SIGNUP_PATH.to_string(), RouteRequirement::Public);
        routes.insert(PARENT_HOME_PATH.to_string(), RouteRequirement::AnyAuthenticated);
        routes.insert(ADMIN_HOME_PATH.to_string(), RouteRequirement::Admin);
        Self { routes }
    }
}

impl RouteTable {
    /// Parses an override of the form `path=requirement,path=requirement`.
    ///
    /// Entries extend the default table. Unrecognized requirements become
    /// `Admin`; entries without `=` or with a relative path are rejected.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut table = Self::default();

        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (path, requirement) = entry.split_once('=').ok_or_else(|| {
                GateError::Config(format!("Route entry '{}' must look like path=requirement", entry))
            })?;
            let path = path.trim();
            if !path.starts_with('/') {
                return Err(GateError::Config(format!(
                    "Route path '{}' must start with '/'",
                    path
                )));
            }

            table.insert(path, RouteRequirement::parse_or_restrictive(requirement));
        }

        Ok(table)
    }

    pub fn insert(&mut self, path: &str, requirement: RouteRequirement) {
        self.routes.insert(normalize(path), requirement);
    }

    /// Canonical form of `path` if it is a known route.
    ///
    /// Unknown paths resolve to the landing page.
    pub fn resolve(&self, path: &str) -> (String, RouteRequirement) {
        let path = normalize(path);
        match self.routes.get(&path) {
            Some(requirement) => (path, *requirement),
            None => (LANDING_PATH.to_string(), self.requirement_of(LANDING_PATH)),
        }
    }

    pub fn requirement_of(&self, path: &str) -> RouteRequirement {
        self.routes
            .get(&normalize(path))
            .copied()
            .unwrap_or(RouteRequirement::Public)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(&normalize(path))
    }
}

/// Strips query, fragment and trailing slashes
fn normalize(path: &str) -> String {
    let path = path
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    let trimmed = path.trim_end_matches('/');

    if trimmed.is_empty() {
        LANDING_PATH.to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
