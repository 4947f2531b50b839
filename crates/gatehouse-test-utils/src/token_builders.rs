//! Builder patterns for test token construction.
//!
//! Tokens are signed RS256 with the process-wide fixture key from
//! [`crate::crypto_fixtures`].

use crate::crypto_fixtures::fixture_private_key_pem;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for signed test tokens.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new("key-1")
///     .upn("alice@example.com")
///     .tenant("tenant-1")
///     .audience("api://audience-1")
///     .roles(&["Admin"])
///     .build();
/// ```
pub struct TestTokenBuilder {
    kid: String,
    algorithm: Algorithm,
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a builder for a token named after the given key ID, expiring
    /// an hour from now.
    pub fn new(kid: &str) -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("iat".to_string(), json!(now.timestamp()));

        Self {
            kid: kid.to_string(),
            algorithm: Algorithm::RS256,
            claims,
        }
    }

    /// Set the user-principal name (marks the token as a human token).
    pub fn upn(self, upn: &str) -> Self {
        self.claim("upn", json!(upn))
    }

    /// Set the display name.
    pub fn name(self, name: &str) -> Self {
        self.claim("name", json!(name))
    }

    /// Set the directory object id.
    pub fn oid(self, oid: &str) -> Self {
        self.claim("oid", json!(oid))
    }

    /// Set the subject identifier.
    pub fn subject(self, sub: &str) -> Self {
        self.claim("sub", json!(sub))
    }

    /// Set the issuing tenant id.
    pub fn tenant(self, tid: &str) -> Self {
        self.claim("tid", json!(tid))
    }

    /// Set the audience.
    pub fn audience(self, aud: &str) -> Self {
        self.claim("aud", json!(aud))
    }

    /// Set the client-application id (machine tokens).
    pub fn app_id(self, appid: &str) -> Self {
        self.claim("appid", json!(appid))
    }

    /// Set the application roles.
    pub fn roles(self, roles: &[&str]) -> Self {
        self.claim("roles", json!(roles))
    }

    /// Set expiration relative to now; negative values build already
    /// expired tokens.
    pub fn expires_in_secs(self, seconds: i64) -> Self {
        self.claim(
            "exp",
            json!((Utc::now() + Duration::seconds(seconds)).timestamp()),
        )
    }

    /// Set a not-before claim relative to now.
    pub fn not_before_in_secs(self, seconds: i64) -> Self {
        self.claim(
            "nbf",
            json!((Utc::now() + Duration::seconds(seconds)).timestamp()),
        )
    }

    /// Drop the expiry claim entirely.
    pub fn without_exp(mut self) -> Self {
        self.claims.remove("exp");
        self
    }

    /// Sign with a different algorithm (the fixture key also signs RS384
    /// and RS512).
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set an arbitrary claim.
    pub fn claim(mut self, key: &str, value: Value) -> Self {
        self.claims.insert(key.to_string(), value);
        self
    }

    /// Sign and return the compact token.
    pub fn build(self) -> String {
        let mut header = Header::new(self.algorithm);
        header.kid = Some(self.kid);

        let encoding_key = EncodingKey::from_rsa_pem(fixture_private_key_pem().as_bytes())
            .expect("encoding key");

        encode(&header, &Value::Object(self.claims), &encoding_key).expect("token")
    }
}
