//! Authorization guard middleware for protected routes.
//!
//! Extracts the credential from the configured header, validates it with
//! the token validation engine, enforces per-route role requirements, and
//! stores the authenticated party in request extensions.

use crate::auth::claims::AuthenticatedPrincipal;
use crate::auth::engine::TokenValidationEngine;
use crate::config::ValidationConfig;
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Generic client-facing rejection message.
const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// State for the guard middleware.
#[derive(Clone)]
pub struct GuardState {
    /// Validation engine shared across requests.
    pub engine: Arc<TokenValidationEngine>,

    /// Process-wide validation configuration.
    pub config: Arc<ValidationConfig>,
}

impl GuardState {
    /// Create guard state from a configuration and an existing engine.
    pub fn new(engine: Arc<TokenValidationEngine>, config: Arc<ValidationConfig>) -> Self {
        Self { engine, config }
    }

    /// Create guard state with an engine built from the configuration.
    pub fn from_config(config: Arc<ValidationConfig>) -> Self {
        let engine = Arc::new(TokenValidationEngine::from_config(Arc::clone(&config)));
        Self::new(engine, config)
    }
}

/// Role requirement attached to a route by the embedding application.
///
/// Attach with `.route_layer(Extension(RequiredRoles::any_of(["admin"])))`.
/// Routes without the extension carry no role requirement; an empty list
/// denies every principal.
#[derive(Debug, Clone)]
pub struct RequiredRoles(Vec<String>);

impl RequiredRoles {
    /// Require at least one of the given roles (case-insensitive match).
    pub fn any_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RequiredRoles(roles.into_iter().map(Into::into).collect())
    }

    /// The declared role list.
    pub fn roles(&self) -> &[String] {
        &self.0
    }
}

/// Identity attached to the request once the guard allows it.
#[derive(Debug, Clone)]
pub enum AuthenticatedParty {
    /// Accepted via the pre-shared service-token list; no principal.
    Service,

    /// Verified user or machine token.
    User(AuthenticatedPrincipal),
}

/// Guard middleware enforcing credential validity and role requirements.
///
/// # Decision points
///
/// 1. Read the configured header; the value may be `"<scheme> <token>"`,
///    so the credential is the last whitespace-separated field after
///    trimming. A missing header yields the empty string, which always
///    fails validation.
/// 2. Invalid credential - 401 with a `WWW-Authenticate` header.
/// 3. Service token - allow without role checks.
/// 4. User token - allow if the route declares no `RequiredRoles`
///    extension; otherwise require a case-insensitive role intersection,
///    denying with 403 when it is empty.
#[instrument(skip(state, req, next), name = "gate.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<GuardState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let header_value = req
        .headers()
        .get(state.config.token_header_name.as_str())
        .and_then(|h| h.to_str().ok());
    let token = token_from_header(header_value);

    let outcome = state.engine.is_token_valid(token).await;

    if !outcome.valid {
        tracing::debug!(target: "gate.guard", "Credential rejected");
        return Err(AuthError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string()));
    }

    if outcome.is_service_token {
        // Service tokens are never role-checked.
        req.extensions_mut().insert(AuthenticatedParty::Service);
        return Ok(next.run(req).await);
    }

    // A valid non-service outcome always carries a principal.
    let principal = outcome
        .principal
        .ok_or_else(|| AuthError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string()))?;

    if let Some(required) = req.extensions().get::<RequiredRoles>() {
        if !principal.has_any_role(required.roles()) {
            if state.config.debug_logging {
                tracing::warn!(
                    target: "gate.guard",
                    required = ?required.roles(),
                    "Permission denied: principal holds none of the required roles"
                );
            }
            return Err(AuthError::Forbidden("Permission denied".to_string()));
        }
    }

    req.extensions_mut()
        .insert(AuthenticatedParty::User(principal));

    Ok(next.run(req).await)
}

/// Pull the credential out of a header value.
///
/// The value may carry a scheme prefix (`"Bearer <token>"`); the
/// credential is always the last whitespace-separated field after
/// trimming. Missing or blank values yield the empty string.
fn token_from_header(value: Option<&str>) -> &str {
    value
        .and_then(|v| v.split_whitespace().next_back())
        .unwrap_or("")
}

/// Extension trait for extracting the authenticated party from a request.
///
/// Provides a convenient method for handlers downstream of the guard.
pub trait PartyExt {
    /// Get the authenticated party from request extensions.
    ///
    /// Returns `None` if the guard was not applied to this request.
    fn party(&self) -> Option<&AuthenticatedParty>;
}

impl<B> PartyExt for axum::extract::Request<B> {
    fn party(&self) -> Option<&AuthenticatedParty> {
        self.extensions().get::<AuthenticatedParty>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    // Note: Full middleware tests require a mocked key directory, which
    // is done in integration tests. Unit tests here focus on header
    // parsing, types, and the paths that need no key fetch.

    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
    use tower::ServiceExt;

    // Connections to port 9 are refused immediately, so the key fetch
    // fails closed without a mock server.
    fn guarded_app(service_tokens: &str) -> Router {
        let mut vars = HashMap::from([
            ("TRUSTED_APPS".to_string(), "tenant-1:audience-1".to_string()),
            (
                "KEY_DISCOVERY_URL".to_string(),
                "http://127.0.0.1:9/keys".to_string(),
            ),
        ]);
        if !service_tokens.is_empty() {
            vars.insert("SERVICE_TOKENS".to_string(), service_tokens.to_string());
        }
        let config = ValidationConfig::from_vars(&vars).expect("config");
        let state = Arc::new(GuardState::from_config(Arc::new(config)));

        Router::new()
            .route("/", get(|| async { "ok" }))
            .route_layer(axum::middleware::from_fn_with_state(state, require_auth))
    }

    #[tokio::test]
    async fn test_missing_header_is_rejected() {
        let app = guarded_app("");

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("WWW-Authenticate").is_some());
    }

    #[tokio::test]
    async fn test_service_token_allowed_when_key_fetch_fails() {
        let app = guarded_app("ops-token");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("authtoken", "ops-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_token_from_missing_header_is_empty() {
        assert_eq!(token_from_header(None), "");
    }

    #[test]
    fn test_token_from_blank_header_is_empty() {
        assert_eq!(token_from_header(Some("")), "");
        assert_eq!(token_from_header(Some("   ")), "");
    }

    #[test]
    fn test_token_from_bare_value() {
        assert_eq!(token_from_header(Some("raw-token")), "raw-token");
    }

    #[test]
    fn test_token_from_scheme_prefixed_value() {
        assert_eq!(token_from_header(Some("Bearer abc.def.ghi")), "abc.def.ghi");
    }

    #[test]
    fn test_token_is_last_field_after_trim() {
        assert_eq!(token_from_header(Some("  Bearer   abc  ")), "abc");
        assert_eq!(token_from_header(Some("a b c")), "c");
    }

    #[test]
    fn test_required_roles_accepts_mixed_inputs() {
        let from_strs = RequiredRoles::any_of(["admin", "reader"]);
        assert_eq!(from_strs.roles(), ["admin", "reader"]);

        let from_strings = RequiredRoles::any_of(vec!["admin".to_string()]);
        assert_eq!(from_strings.roles(), ["admin"]);
    }

    #[test]
    fn test_guard_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<GuardState>();
        assert_clone::<RequiredRoles>();
        assert_clone::<AuthenticatedParty>();
    }
}
