//! Key directory client for fetching and caching provider signing keys.
//!
//! The client fetches the identity provider's published signing keys over
//! HTTPS and caches them with a configurable TTL.
//!
//! # Security
//!
//! - Keys are cached to reduce load on the provider and improve latency
//! - Cache is invalidated on TTL expiry to pick up key rotations
//! - A kid miss inside a live cache does NOT trigger a refetch, so
//!   attacker-chosen kids cannot drive request volume to the provider

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// One signing key from the provider's discovery document.
#[derive(Debug, Clone, Deserialize)]
pub struct SigningKey {
    /// Key ID - used to select the correct key for verification.
    /// Entries without one are dropped while indexing.
    #[serde(default)]
    pub kid: String,

    /// Key type (should be "RSA").
    #[serde(default)]
    pub kty: Option<String>,

    /// Algorithm (should be "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// X.509 certificate chain; the first entry holds the verification
    /// certificate. The verifier consumes `n`/`e` instead, but the chain
    /// is kept for callers that need it.
    #[serde(default)]
    pub x5c: Option<Vec<String>>,
}

/// Key discovery response from the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyDirectoryResponse {
    /// List of published signing keys.
    pub keys: Vec<SigningKey>,
}

/// Key directory failure. Detail strings are for logs only; callers
/// surface a generic rejection to clients.
#[derive(Debug, Error)]
pub enum KeyDirectoryError {
    #[error("Key directory request failed: {0}")]
    Network(String),

    #[error("Key directory endpoint returned status {0}")]
    Endpoint(u16),

    #[error("Key directory response could not be parsed: {0}")]
    Parse(String),
}

/// Cached key set with expiry time.
struct CachedKeys {
    /// Map of key ID to signing key, shared with callers.
    keys: Arc<HashMap<String, SigningKey>>,

    /// When this cache entry expires.
    expires_at: Instant,
}

/// Client for fetching and caching the provider's signing keys.
///
/// Thread-safe; one refresh is in flight per client at a time, and
/// concurrent callers reuse its result.
pub struct KeyDirectoryClient {
    /// URL of the key discovery endpoint.
    keys_url: String,

    /// HTTP client for fetching the discovery document.
    http_client: reqwest::Client,

    /// Cached key set.
    cache: RwLock<Option<CachedKeys>>,

    /// Serializes cache refreshes.
    fetch_lock: Mutex<()>,

    /// Cache TTL duration.
    cache_ttl: Duration,
}

impl KeyDirectoryClient {
    /// Create a new client with the default cache TTL.
    pub fn new(keys_url: String) -> Self {
        Self::with_ttl(keys_url, Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS))
    }

    /// Create a new client with a custom cache TTL.
    pub fn with_ttl(keys_url: String, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gate.keys", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            keys_url,
            http_client,
            cache: RwLock::new(None),
            fetch_lock: Mutex::new(()),
            cache_ttl,
        }
    }

    /// Get the current signing keys, indexed by key ID.
    ///
    /// Serves from cache while the TTL holds, otherwise refreshes from
    /// the discovery endpoint. Only one refresh runs at a time; callers
    /// that arrive during a refresh wait for it and reuse its result.
    ///
    /// # Errors
    ///
    /// Returns `KeyDirectoryError` if the keys cannot be fetched or
    /// parsed. The cache is left untouched on failure.
    #[instrument(skip(self))]
    pub async fn fetch_keys(
        &self,
    ) -> Result<Arc<HashMap<String, SigningKey>>, KeyDirectoryError> {
        if let Some(keys) = self.cached_keys().await {
            tracing::debug!(target: "gate.keys", "Signing-key cache hit");
            return Ok(keys);
        }

        let _guard = self.fetch_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        if let Some(keys) = self.cached_keys().await {
            return Ok(keys);
        }

        self.refresh_cache().await
    }

    /// Return the cached key set if it is still live.
    async fn cached_keys(&self) -> Option<Arc<HashMap<String, SigningKey>>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.expires_at > Instant::now())
            .map(|cached| Arc::clone(&cached.keys))
    }

    /// Fetch the discovery document and replace the cache.
    #[instrument(skip(self))]
    async fn refresh_cache(
        &self,
    ) -> Result<Arc<HashMap<String, SigningKey>>, KeyDirectoryError> {
        tracing::debug!(target: "gate.keys", url = %self.keys_url, "Fetching signing keys");

        let response = self
            .http_client
            .get(&self.keys_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gate.keys", error = %e, "Failed to fetch signing keys");
                KeyDirectoryError::Network(e.to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "gate.keys",
                status = %response.status(),
                "Key discovery endpoint returned error"
            );
            return Err(KeyDirectoryError::Endpoint(response.status().as_u16()));
        }

        let document: KeyDirectoryResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "gate.keys", error = %e, "Failed to parse key discovery response");
            KeyDirectoryError::Parse(e.to_string())
        })?;

        // Build key map, dropping entries without a usable kid.
        let total = document.keys.len();
        let keys: HashMap<String, SigningKey> = document
            .keys
            .into_iter()
            .filter(|key| !key.kid.trim().is_empty())
            .map(|key| (key.kid.clone(), key))
            .collect();

        if keys.len() < total {
            tracing::warn!(
                target: "gate.keys",
                dropped = total - keys.len(),
                "Dropped key entries without a kid"
            );
        }

        tracing::info!(
            target: "gate.keys",
            key_count = keys.len(),
            "Signing-key cache refreshed"
        );

        let keys = Arc::new(keys);
        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeys {
            keys: Arc::clone(&keys),
            expires_at: Instant::now() + self.cache_ttl,
        });

        Ok(keys)
    }

    /// Force refresh the cache.
    ///
    /// Useful for manual cache invalidation after a known key rotation.
    pub async fn force_refresh(&self) -> Result<(), KeyDirectoryError> {
        let _guard = self.fetch_lock.lock().await;
        self.refresh_cache().await.map(|_| ())
    }

    /// Clear the cache.
    ///
    /// Useful for testing.
    #[cfg(test)]
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_deserialization() {
        let json = r#"{
            "kty": "RSA",
            "kid": "test-key-01",
            "use": "sig",
            "alg": "RS256",
            "n": "rCbmrPGpqUkkrLV5qCmW",
            "e": "AQAB",
            "x5c": ["MIIC8TCCAdmgAwIBAgIQ"]
        }"#;

        let key: SigningKey = serde_json::from_str(json).unwrap();

        assert_eq!(key.kid, "test-key-01");
        assert_eq!(key.kty, Some("RSA".to_string()));
        assert_eq!(key.alg, Some("RS256".to_string()));
        assert_eq!(key.key_use, Some("sig".to_string()));
        assert_eq!(key.n, Some("rCbmrPGpqUkkrLV5qCmW".to_string()));
        assert_eq!(key.e, Some("AQAB".to_string()));
        assert_eq!(key.x5c, Some(vec!["MIIC8TCCAdmgAwIBAgIQ".to_string()]));
    }

    #[test]
    fn test_signing_key_deserialization_minimal() {
        // Only the key ID
        let json = r#"{ "kid": "test-key-02" }"#;

        let key: SigningKey = serde_json::from_str(json).unwrap();

        assert_eq!(key.kid, "test-key-02");
        assert!(key.kty.is_none());
        assert!(key.alg.is_none());
        assert!(key.n.is_none());
        assert!(key.e.is_none());
        assert!(key.x5c.is_none());
    }

    #[test]
    fn test_signing_key_without_kid_parses_to_blank() {
        let json = r#"{ "kty": "RSA" }"#;

        let key: SigningKey = serde_json::from_str(json).unwrap();
        assert!(key.kid.is_empty());
    }

    #[test]
    fn test_signing_key_ignores_unknown_provider_fields() {
        let json = r#"{
            "kid": "test-key-03",
            "x5t": "thumbprint",
            "issuer": "https://sts.example.com/"
        }"#;

        let key: SigningKey = serde_json::from_str(json).unwrap();
        assert_eq!(key.kid, "test-key-03");
    }

    #[test]
    fn test_key_directory_response_deserialization() {
        let json = r#"{
            "keys": [
                {"kty": "RSA", "kid": "key-1"},
                {"kty": "RSA", "kid": "key-2"}
            ]
        }"#;

        let document: KeyDirectoryResponse = serde_json::from_str(json).unwrap();

        assert_eq!(document.keys.len(), 2);
        assert_eq!(document.keys.first().unwrap().kid, "key-1");
        assert_eq!(document.keys.get(1).unwrap().kid, "key-2");
    }

    #[test]
    fn test_client_creation() {
        let client =
            KeyDirectoryClient::new("https://keys.example.com/discovery".to_string());
        assert_eq!(client.keys_url, "https://keys.example.com/discovery");
        assert_eq!(
            client.cache_ttl,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS)
        );
    }

    #[test]
    fn test_client_custom_ttl() {
        let client = KeyDirectoryClient::with_ttl(
            "https://keys.example.com/discovery".to_string(),
            Duration::from_secs(60),
        );
        assert_eq!(client.cache_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_error_display_for_logs() {
        assert_eq!(
            format!("{}", KeyDirectoryError::Endpoint(503)),
            "Key directory endpoint returned status 503"
        );
        assert!(format!("{}", KeyDirectoryError::Network("timed out".to_string()))
            .contains("timed out"));
    }
}
