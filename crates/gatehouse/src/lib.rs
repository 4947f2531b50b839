//! # Gatehouse
//!
//! Bearer-token validation and role-based authorization for axum
//! services. Gatehouse verifies identity-provider-issued signed tokens
//! against the provider's published signing keys, accepts pre-shared
//! service tokens for unsophisticated clients, and enforces per-route
//! role requirements for verified callers.
//!
//! # Architecture
//!
//! The guard middleware drives the validation engine, which in turn uses
//! the key directory client and the token decoder/verifier:
//!
//! ```text
//! middleware/auth.rs -> auth/engine.rs -> auth/{keys,token,claims}.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Process-wide validation configuration from environment
//! - `errors` - Guard error types with HTTP status code mapping
//! - `auth` - Key discovery, token decoding/verification, validation engine
//! - `middleware` - Authorization guard for protected routes
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = Arc::new(ValidationConfig::from_env()?);
//! let state = Arc::new(GuardState::from_config(config));
//!
//! let app = Router::new()
//!     .route("/reports", get(reports))
//!     .route_layer(middleware::from_fn_with_state(state, require_auth))
//!     .route_layer(Extension(RequiredRoles::any_of(["admin"])));
//! ```

pub mod auth;
pub mod config;
pub mod errors;
pub mod middleware;

pub use auth::claims::{AuthenticatedPrincipal, TokenClaims, ValidationOutcome};
pub use auth::engine::TokenValidationEngine;
pub use auth::keys::{KeyDirectoryClient, SigningKey};
pub use config::{TenantApplication, ValidationConfig};
pub use errors::AuthError;
pub use middleware::auth::{require_auth, AuthenticatedParty, GuardState, RequiredRoles};
