//! Middleware for protected routes.
//!
//! # Components
//!
//! - `auth` - Authorization guard enforcing credential validity and
//!   per-route role requirements

pub mod auth;

pub use auth::{require_auth, AuthenticatedParty, GuardState, PartyExt, RequiredRoles};
