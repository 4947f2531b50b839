//! Token validation.
//!
//! # Components
//!
//! - `claims` - Token claims and the derived authenticated principal
//! - `keys` - Key directory client with a TTL cache
//! - `token` - Compact-token decoding and signature verification
//! - `engine` - Orchestration plus the pre-shared service-token fallback

pub mod claims;
pub mod engine;
pub mod keys;
pub mod token;

pub use claims::{AuthenticatedPrincipal, TokenClaims, ValidationOutcome};
pub use engine::TokenValidationEngine;
pub use keys::{KeyDirectoryClient, SigningKey};
