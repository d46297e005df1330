//! Navigation surface: turns guard decisions into the route actually displayed

use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::constants::{LANDING_PATH, MAX_REDIRECT_HOPS};
use crate::guard::{GuardDecision, RouteGuard, RouteTable};
use crate::security_logger::SecurityEvent;
use crate::session::{Session, SessionStore};

/// What the embedding UI should display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NavigationOutcome {
    /// Session not resolved yet; show a neutral placeholder
    Resolving { requested: String },
    /// Show `path`; `redirected_from` is set when the guard moved the user
    Render {
        path: String,
        redirected_from: Option<String>,
    },
    /// Redirects did not settle, the route table is inconsistent
    Denied { requested: String },
}

impl NavigationOutcome {
    /// The route the user asked for, used when re-checking
    pub fn requested_path(&self) -> &str {
        match self {
            NavigationOutcome::Resolving { requested } => requested,
            NavigationOutcome::Render { path, .. } => path,
            NavigationOutcome::Denied { requested } => requested,
        }
    }
}

pub struct Navigator {
    store: Arc<SessionStore>,
    guard: RouteGuard,
    routes: RouteTable,
    displayed: watch::Sender<NavigationOutcome>,
}

impl Navigator {
    pub fn new(store: Arc<SessionStore>, guard: RouteGuard, routes: RouteTable) -> Arc<Self> {
        let (displayed, _) = watch::channel(NavigationOutcome::Resolving {
            requested: LANDING_PATH.to_string(),
        });
        Arc::new(Self {
            store,
            guard,
            routes,
            displayed,
        })
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Whether `path` names a route of the portal
    pub fn knows(&self, path: &str) -> bool {
        self.routes.contains(path)
    }

    /// Attempt to display `path` with the session as it is right now
    pub fn navigate(&self, path: &str) -> NavigationOutcome {
        let session = self.store.current_session();
        let outcome = self.decide(&session, path);

        self.displayed.send_if_modified(|current| {
            if *current == outcome {
                return false;
            }
            *current = outcome.clone();
            true
        });
        outcome
    }

    /// Re-evaluate whatever is displayed against the current session
    pub fn recheck(&self) -> NavigationOutcome {
        let requested = self.displayed.borrow().requested_path().to_string();
        self.navigate(&requested)
    }

    pub fn current(&self) -> NavigationOutcome {
        self.displayed.borrow().clone()
    }

    pub fn displayed(&self) -> watch::Receiver<NavigationOutcome> {
        self.displayed.subscribe()
    }

    fn decide(&self, session: &Session, requested: &str) -> NavigationOutcome {
        let (resolved, _) = self.routes.resolve(requested);

        // Never ask the guard before the backend has answered
        if !session.is_resolved() {
            return NavigationOutcome::Resolving {
                requested: resolved,
            };
        }

        let mut path = resolved.clone();
        for _ in 0..MAX_REDIRECT_HOPS {
            match self.guard.evaluate(session, self.routes.requirement_of(&path)) {
                GuardDecision::Allow => {
                    let redirected_from = (path != resolved).then(|| resolved.clone());
                    return NavigationOutcome::Render {
                        path,
                        redirected_from,
                    };
                }
                GuardDecision::Redirect(destination) => {
                    SecurityEvent::AccessRedirected {
                        user_id: session.user_id().map(str::to_string),
                        path: path.clone(),
                        target: destination.path().to_string(),
                    }
                    .log();
                    path = destination.path().to_string();
                }
                GuardDecision::Defer => {
                    return NavigationOutcome::Resolving {
                        requested: resolved,
                    };
                }
            }
        }

        log::error!(
            "Redirects for {} did not settle after {} hops, check the route table",
            resolved,
            MAX_REDIRECT_HOPS
        );
        NavigationOutcome::Denied {
            requested: resolved,
        }
    }

    /// Re-check the displayed route after every session change
    pub fn spawn_recheck(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.store.subscribe();
        let navigator: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let Some(navigator) = navigator.upgrade() else {
                    break;
                };
                let outcome = navigator.recheck();
                log::debug!("Route re-checked after session change: {:?}", outcome);
            }
        })
    }
}
