//! Token claims and the authenticated principal derived from them.
//!
//! `TokenClaims` is the deserialization target for a verified token
//! payload. `AuthenticatedPrincipal` is the immutable identity handed to
//! downstream authorization code. Personal identifiers are redacted in
//! Debug output to prevent exposure in logs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix used to synthesize an identity for machine tokens that carry
/// no human subject.
const CLIENT_CREDENTIALS_PREFIX: &str = "ClientCredentialsToken|";

/// Claims carried by a verified bearer token.
///
/// Identity providers attach many more claims than these; unknown fields
/// are ignored during deserialization. Everything except `exp` is
/// optional because machine tokens omit most of the human-subject claims.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Audience the token was issued for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Issuer URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Display name - redacted in Debug output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Directory object id of the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,

    /// Application roles granted to the subject. Absent for most tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    /// Subject identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Tenant id the token was issued under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,

    /// Legacy user-principal name - redacted in Debug output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,

    /// User-principal name - redacted in Debug output. Absent for
    /// machine (client-credential) tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upn: Option<String>,

    /// Client-application id. Present for machine tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<String>,

    /// Token format version reported by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
}

/// Custom Debug implementation that redacts personal identifiers.
impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("aud", &self.aud)
            .field("iss", &self.iss)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("exp", &self.exp)
            .field("name", &self.name.as_ref().map(|_| "[REDACTED]"))
            .field("given_name", &self.given_name.as_ref().map(|_| "[REDACTED]"))
            .field(
                "family_name",
                &self.family_name.as_ref().map(|_| "[REDACTED]"),
            )
            .field("nonce", &self.nonce)
            .field("oid", &self.oid)
            .field("roles", &self.roles)
            .field("sub", &self.sub)
            .field(
                "unique_name",
                &self.unique_name.as_ref().map(|_| "[REDACTED]"),
            )
            .field("upn", &self.upn.as_ref().map(|_| "[REDACTED]"))
            .field("tid", &self.tid)
            .field("appid", &self.appid)
            .field("ver", &self.ver)
            .finish()
    }
}

/// Identity derived from a successfully verified token.
///
/// One is built per successful validation and discarded after the
/// authorization decision. `email` and `full_name` contain personal
/// identifiers and are redacted in Debug output.
#[derive(Clone)]
pub struct AuthenticatedPrincipal {
    /// Directory object id of the subject.
    pub id: Option<String>,

    /// User-principal name, or the synthesized client-credentials
    /// identity for machine tokens.
    pub email: String,

    /// Display name, or the synthesized client-credentials identity for
    /// machine tokens.
    pub full_name: String,

    /// Application roles granted to the subject. Empty when the token
    /// carried none.
    pub roles: Vec<String>,

    /// Audience the token was issued for.
    pub audience: Option<String>,

    /// Tenant id the token was issued under.
    pub tenant: Option<String>,

    /// Subject identifier.
    pub subject: Option<String>,

    /// Client-application id, when the token carried one.
    pub app_id: Option<String>,
}

/// Custom Debug implementation that redacts `email` and `full_name`.
impl fmt::Debug for AuthenticatedPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedPrincipal")
            .field("id", &self.id)
            .field("email", &"[REDACTED]")
            .field("full_name", &"[REDACTED]")
            .field("roles", &self.roles)
            .field("audience", &self.audience)
            .field("tenant", &self.tenant)
            .field("subject", &self.subject)
            .field("app_id", &self.app_id)
            .finish()
    }
}

impl AuthenticatedPrincipal {
    /// Build a principal from verified claims.
    ///
    /// Tokens without a `upn` claim have no human subject; `email` and
    /// `full_name` are synthesized from the client-application id so
    /// machine callers stay uniform with human callers downstream while
    /// remaining distinguishable via `app_id`.
    pub fn from_claims(claims: &TokenClaims) -> Self {
        let (email, full_name) = match &claims.upn {
            Some(upn) => (upn.clone(), claims.name.clone().unwrap_or_default()),
            None => {
                let synthesized = format!(
                    "{}{}",
                    CLIENT_CREDENTIALS_PREFIX,
                    claims.appid.as_deref().unwrap_or_default()
                );
                (synthesized.clone(), synthesized)
            }
        };

        AuthenticatedPrincipal {
            id: claims.oid.clone(),
            email,
            full_name,
            roles: claims.roles.clone().unwrap_or_default(),
            audience: claims.aud.clone(),
            tenant: claims.tid.clone(),
            subject: claims.sub.clone(),
            app_id: claims.appid.clone(),
        }
    }

    /// Check if the principal holds a specific role.
    ///
    /// Role comparison is case-insensitive.
    pub fn has_role(&self, role: &str) -> bool {
        let wanted = role.to_lowercase();
        self.roles.iter().any(|r| r.to_lowercase() == wanted)
    }

    /// Check if the principal holds at least one of the given roles.
    pub fn has_any_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| self.has_role(r))
    }
}

/// Result of a validation attempt.
///
/// `principal` is present only for verified user tokens; pre-shared
/// service tokens are accepted without one.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// Whether the credential was accepted.
    pub valid: bool,

    /// Identity derived from a verified token, absent otherwise.
    pub principal: Option<AuthenticatedPrincipal>,

    /// Whether acceptance came from the pre-shared service-token list.
    pub is_service_token: bool,
}

impl ValidationOutcome {
    /// Accepted: verified user or machine token.
    pub fn user(principal: AuthenticatedPrincipal) -> Self {
        ValidationOutcome {
            valid: true,
            principal: Some(principal),
            is_service_token: false,
        }
    }

    /// Accepted: pre-shared service token.
    pub fn service_token() -> Self {
        ValidationOutcome {
            valid: true,
            principal: None,
            is_service_token: true,
        }
    }

    /// Rejected. Never reports a service-token match.
    pub fn invalid() -> Self {
        ValidationOutcome {
            valid: false,
            principal: None,
            is_service_token: false,
        }
    }
}
