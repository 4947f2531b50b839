//! Token validation engine.
//!
//! Orchestrates the full validation path: fetch signing keys, decode the
//! token header, match the key, verify the signature, build the
//! principal, and check tenant/audience membership. Pre-shared service
//! tokens are accepted by exact match when principal extraction fails.
//!
//! No failure crosses out of the engine: every internal error degrades
//! to "no principal" plus a log line, so attacker-controlled input can
//! never crash the caller.

use crate::auth::claims::{AuthenticatedPrincipal, ValidationOutcome};
use crate::auth::keys::{KeyDirectoryClient, KeyDirectoryError};
use crate::auth::token::{decode_header, verify_signature, TokenError};
use crate::config::ValidationConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Why a credential failed to yield a principal.
///
/// The public contract collapses every failure to an absent principal;
/// this enum exists so the logging policy stays deterministic instead of
/// scattered through the validation path.
#[derive(Debug)]
enum RejectionReason {
    /// The signing keys could not be fetched.
    KeyFetch(KeyDirectoryError),

    /// The credential is not a compact token (no `.` separator). This is
    /// the expected path for pre-shared service tokens.
    OpaqueCredential,

    /// The credential looks like a compact token but its header cannot
    /// be decoded, or it failed the size limit.
    MalformedToken(TokenError),

    /// The header decoded but named no key.
    MissingKeyId,

    /// No fetched signing key matches the token's key id. Signals
    /// provider key rotation lag or tenant misconfiguration.
    KeyNotFound(String),

    /// Signature or temporal-claim verification failed.
    VerificationFailed(TokenError),

    /// The verified token was issued by/for a tenant or application this
    /// process does not trust. Expected multi-tenant noise.
    TenantMismatch,
}

impl RejectionReason {
    /// Emit the log line this rejection calls for, if any.
    fn log(&self, debug_logging: bool) {
        match self {
            RejectionReason::KeyFetch(err) => {
                tracing::error!(target: "gate.engine", error = %err, "Signing-key fetch failed; token rejected");
            }
            RejectionReason::OpaqueCredential => {}
            RejectionReason::MalformedToken(err) => {
                if debug_logging {
                    tracing::warn!(target: "gate.engine", error = ?err, "Token could not be decoded");
                } else {
                    tracing::debug!(target: "gate.engine", error = ?err, "Token could not be decoded");
                }
            }
            RejectionReason::MissingKeyId => {
                tracing::error!(target: "gate.engine", "Token header carries no key id");
            }
            RejectionReason::KeyNotFound(kid) => {
                tracing::error!(target: "gate.engine", kid = %kid, "No signing key matches token key id");
            }
            RejectionReason::VerificationFailed(err) => {
                tracing::error!(target: "gate.engine", reason = ?err, "Token verification failed");
            }
            RejectionReason::TenantMismatch => {}
        }
    }
}

/// Validation engine combining the process configuration with a key
/// directory client.
///
/// Holds no per-request state; concurrent validations share it behind an
/// `Arc` without locking.
pub struct TokenValidationEngine {
    /// Process-wide validation configuration.
    config: Arc<ValidationConfig>,

    /// Client for the provider's signing keys.
    keys: Arc<KeyDirectoryClient>,
}

impl TokenValidationEngine {
    /// Create an engine from a configuration and an existing key client.
    pub fn new(config: Arc<ValidationConfig>, keys: Arc<KeyDirectoryClient>) -> Self {
        Self { config, keys }
    }

    /// Create an engine with a key client built from the configuration's
    /// discovery URL and cache TTL.
    pub fn from_config(config: Arc<ValidationConfig>) -> Self {
        let keys = Arc::new(KeyDirectoryClient::with_ttl(
            config.keys_url.clone(),
            Duration::from_secs(config.keys_cache_ttl_secs),
        ));
        Self::new(config, keys)
    }

    /// Decide whether a credential is acceptable.
    ///
    /// # Decision order
    ///
    /// 1. Attempt principal extraction (keys, header, signature,
    ///    tenant/audience membership). Success means a verified user or
    ///    machine token.
    /// 2. Otherwise check the credential against the pre-shared
    ///    service-token list (exact string match).
    /// 3. Otherwise the credential is invalid.
    ///
    /// Never fails: every internal error resolves to an invalid outcome.
    #[instrument(skip_all)]
    pub async fn is_token_valid(&self, token: &str) -> ValidationOutcome {
        if let Some(principal) = self.extract_principal(token).await {
            return ValidationOutcome::user(principal);
        }

        let matched = self.config.is_service_token(token);
        if self.config.debug_logging {
            tracing::debug!(
                target: "gate.engine",
                is_service_token = matched,
                "Service-token fallback evaluated"
            );
        }
        if matched {
            return ValidationOutcome::service_token();
        }

        ValidationOutcome::invalid()
    }

    /// Extract the verified principal from a token, or `None` for every
    /// failure. Service tokens are not considered here.
    #[instrument(skip_all)]
    pub async fn principal_from_token(&self, token: &str) -> Option<AuthenticatedPrincipal> {
        self.extract_principal(token).await
    }

    /// Extract a verified principal that carries at least one role.
    ///
    /// Skips the tenant/audience membership check; legacy role-only
    /// callers gate purely on role presence.
    #[instrument(skip_all)]
    pub async fn roles_from_token(&self, token: &str) -> Option<AuthenticatedPrincipal> {
        let principal = match self.verified_principal(token).await {
            Ok(principal) => principal,
            Err(reason) => {
                reason.log(self.config.debug_logging);
                return None;
            }
        };

        if principal.roles.is_empty() {
            if self.config.debug_logging {
                tracing::debug!(target: "gate.engine", "Verified token carries no roles");
            }
            return None;
        }

        Some(principal)
    }

    /// Full extraction path: verified principal plus the tenant/audience
    /// membership check.
    async fn extract_principal(&self, token: &str) -> Option<AuthenticatedPrincipal> {
        let principal = match self.verified_principal(token).await {
            Ok(principal) => principal,
            Err(reason) => {
                reason.log(self.config.debug_logging);
                return None;
            }
        };

        if !self.is_trusted(&principal) {
            RejectionReason::TenantMismatch.log(self.config.debug_logging);
            return None;
        }

        Some(principal)
    }

    /// Fetch keys, decode the header, match the key, verify, and build
    /// the principal. Tenant/audience membership is the caller's check.
    async fn verified_principal(
        &self,
        token: &str,
    ) -> Result<AuthenticatedPrincipal, RejectionReason> {
        let keys = self
            .keys
            .fetch_keys()
            .await
            .map_err(RejectionReason::KeyFetch)?;

        let header = match decode_header(token) {
            Ok(Some(header)) => header,
            Ok(None) => return Err(RejectionReason::OpaqueCredential),
            Err(TokenError::MissingKeyId) => return Err(RejectionReason::MissingKeyId),
            Err(err) => return Err(RejectionReason::MalformedToken(err)),
        };

        let key = keys
            .get(&header.key_id)
            .ok_or_else(|| RejectionReason::KeyNotFound(header.key_id.clone()))?;

        let claims = verify_signature(token, key).map_err(RejectionReason::VerificationFailed)?;

        Ok(AuthenticatedPrincipal::from_claims(&claims))
    }

    /// Tenant/audience membership: some trusted pair must match the
    /// principal's tenant and either its audience or its application id.
    /// The second disjunct covers machine tokens whose audience claim is
    /// a fixed platform value while the caller's own application id
    /// appears as `app_id`.
    fn is_trusted(&self, principal: &AuthenticatedPrincipal) -> bool {
        self.config.trusted_apps.iter().any(|app| {
            principal.tenant.as_deref() == Some(app.tenant_id.as_str())
                && (principal.audience.as_deref() == Some(app.audience_id.as_str())
                    || principal.app_id.as_deref() == Some(app.audience_id.as_str()))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::claims::TokenClaims;
    use serde_json::json;
    use std::collections::HashMap;

    // Port 9 is the discard service; connections are refused immediately,
    // which makes these tests exercise the fail-closed path without a
    // mock server.
    const DEAD_KEYS_URL: &str = "http://127.0.0.1:9/keys";

    fn engine_with(service_tokens: &str) -> TokenValidationEngine {
        let mut vars = HashMap::from([
            ("TRUSTED_APPS".to_string(), "tenant-1:audience-1".to_string()),
            ("KEY_DISCOVERY_URL".to_string(), DEAD_KEYS_URL.to_string()),
        ]);
        if !service_tokens.is_empty() {
            vars.insert("SERVICE_TOKENS".to_string(), service_tokens.to_string());
        }
        let config = ValidationConfig::from_vars(&vars).expect("config");
        TokenValidationEngine::from_config(Arc::new(config))
    }

    fn principal_with(tenant: &str, audience: &str, app_id: Option<&str>) -> AuthenticatedPrincipal {
        let claims: TokenClaims = serde_json::from_value(json!({
            "exp": 1_700_003_600,
            "tid": tenant,
            "aud": audience,
            "appid": app_id,
            "upn": "user@example.com",
        }))
        .expect("claims");
        AuthenticatedPrincipal::from_claims(&claims)
    }

    #[test]
    fn test_is_trusted_matches_tenant_and_audience() {
        let engine = engine_with("");
        assert!(engine.is_trusted(&principal_with("tenant-1", "audience-1", None)));
    }

    #[test]
    fn test_is_trusted_matches_app_id_disjunct() {
        // Audience claim is a platform value; the caller's own app id
        // matches the configured audience.
        let engine = engine_with("");
        assert!(engine.is_trusted(&principal_with(
            "tenant-1",
            "api://platform",
            Some("audience-1")
        )));
    }

    #[test]
    fn test_is_trusted_rejects_other_tenant() {
        let engine = engine_with("");
        assert!(!engine.is_trusted(&principal_with("tenant-2", "audience-1", None)));
    }

    #[test]
    fn test_is_trusted_rejects_other_audience() {
        let engine = engine_with("");
        assert!(!engine.is_trusted(&principal_with("tenant-1", "audience-2", None)));
    }

    #[test]
    fn test_is_trusted_requires_tenant_claim() {
        let engine = engine_with("");
        let claims: TokenClaims = serde_json::from_value(json!({
            "exp": 1_700_003_600,
            "aud": "audience-1",
        }))
        .expect("claims");
        let principal = AuthenticatedPrincipal::from_claims(&claims);

        assert!(!engine.is_trusted(&principal));
    }

    #[tokio::test]
    async fn test_service_token_accepted_when_key_fetch_fails() {
        let engine = engine_with("ops-token");

        let outcome = engine.is_token_valid("ops-token").await;

        assert!(outcome.valid);
        assert!(outcome.is_service_token);
        assert!(outcome.principal.is_none());
    }

    #[tokio::test]
    async fn test_unknown_credential_is_invalid() {
        let engine = engine_with("ops-token");

        let outcome = engine.is_token_valid("some-other-string").await;

        assert!(!outcome.valid);
        assert!(!outcome.is_service_token);
        assert!(outcome.principal.is_none());
    }

    #[tokio::test]
    async fn test_empty_credential_is_invalid() {
        let engine = engine_with("");

        let outcome = engine.is_token_valid("").await;

        assert!(!outcome.valid);
        assert!(!outcome.is_service_token);
        assert!(outcome.principal.is_none());
    }

    #[tokio::test]
    async fn test_principal_from_token_fails_closed_on_network_error() {
        let engine = engine_with("");

        let token = gatehouse_test_utils::TestTokenBuilder::new("key-1")
            .tenant("tenant-1")
            .audience("audience-1")
            .build();

        assert!(engine.principal_from_token(&token).await.is_none());
    }
}
