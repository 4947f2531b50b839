//! # Gatehouse Test Utilities
//!
//! Shared test utilities for the gatehouse library.
//!
//! This crate provides:
//! - A process-wide RSA signing fixture (one keypair per test binary)
//! - Token builders (`TestTokenBuilder`) that sign against the fixture
//! - Key discovery document builders for mocked endpoints
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gatehouse_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     // Serve a discovery document matching the fixture key
//!     let document = key_directory_json(&["key-1"]);
//!
//!     // Build a signed token naming that key
//!     let token = TestTokenBuilder::new("key-1")
//!         .upn("alice@example.com")
//!         .tenant("tenant-1")
//!         .audience("api://audience-1")
//!         .build();
//! }
//! ```

pub mod crypto_fixtures;
pub mod key_directory;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use key_directory::*;
pub use token_builders::*;
