//! Sandbox boundary for agent sessions.
//!
//! Paths are normalised by [`resolve_path`] and checked against a session's
//! working directory by [`AuthorizationGuard`]. Human approvals are remembered
//! per `(session, operation)` in a [`GrantStore`].

pub mod authorization;
pub mod grants;
pub mod path_resolver;

pub use authorization::{AuthorizationDecision, AuthorizationGuard, AuthorizationRequest};
pub use grants::GrantStore;
pub use path_resolver::{canonicalize_lossy, expand_tilde, is_within, resolve_path};
