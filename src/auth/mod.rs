//! Identity: principals, roles, access tokens and the pluggable backends

pub mod backend;
pub mod hosted;
pub mod local;
pub mod pkce;
pub mod principal;
pub mod token;

// Re-export main components
pub use backend::{AuthEvent, CeremonyTicket, IdentityBackend, Provider, SessionChange};
pub use hosted::HostedBackend;
pub use local::LocalBackend;
pub use principal::{Principal, Role};
pub use token::{Claims, TokenVerifier};
