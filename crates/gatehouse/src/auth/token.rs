//! Compact-token decoding and signature verification.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only the RS256 algorithm is accepted
//! - Generic error messages prevent information leakage; detail is
//!   logged at debug level for troubleshooting
//! - Header decoding proves nothing: a decoded header is only used to
//!   pick which signing key to try

use crate::auth::claims::TokenClaims;
use crate::auth::keys::SigningKey;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use thiserror::Error;

/// Maximum allowed token size in bytes (8KB).
///
/// Typical bearer tokens are well under 2KB. Candidates larger than this
/// are rejected before any base64 or cryptographic work.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192; // 8KB

/// Clock skew tolerance in seconds applied to `exp` and `nbf` checks.
pub const CLOCK_SKEW_SECONDS: u64 = 60;

/// Errors that can occur while decoding or verifying a token.
///
/// Note: Error messages are intentionally generic to prevent information
/// leakage. The `Verification` reason string is for server-side logs only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TooLarge,

    /// Header segment is not base64url-encoded JSON.
    #[error("The access token is invalid or expired")]
    MalformedHeader,

    /// Header carries no usable `kid` field.
    #[error("The access token is invalid or expired")]
    MissingKeyId,

    /// Token or key asserts an algorithm other than RS256.
    #[error("The access token is invalid or expired")]
    UnsupportedAlgorithm,

    /// Key entry lacks the material needed for verification.
    #[error("The access token is invalid or expired")]
    UnusableKey,

    /// Signature or temporal-claim verification failed.
    #[error("The access token is invalid or expired")]
    Verification(String),
}

/// Header fields parsed without verification from a compact token.
///
/// Used only to pick which signing key to try; nothing here is trusted
/// until the signature verifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTokenHeader {
    /// Key ID naming the signing key.
    pub key_id: String,

    /// Asserted signing algorithm. Defaults to "RS256" when the header
    /// omits it.
    pub algorithm: String,
}

/// Decode the header segment of a compact token without verifying it.
///
/// Returns `Ok(None)` for credentials that contain no `.` at all: those
/// are not compact tokens, and the caller decides what that means
/// (pre-shared service tokens take this path).
///
/// # Errors
///
/// - `TooLarge` - candidate exceeds `MAX_TOKEN_SIZE_BYTES`
/// - `MalformedHeader` - header segment is not base64url-encoded JSON
/// - `MissingKeyId` - header has no non-empty string `kid`
pub fn decode_header(token: &str) -> Result<Option<DecodedTokenHeader>, TokenError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_TOKEN_SIZE_BYTES {
        tracing::debug!(
            target: "gate.token",
            token_size = token.len(),
            max_size = MAX_TOKEN_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(TokenError::TooLarge);
    }

    // No '.' means this is not a compact token at all.
    let Some((header_part, _)) = token.split_once('.') else {
        return Ok(None);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "gate.token", error = %e, "Failed to decode token header base64");
        TokenError::MalformedHeader
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "gate.token", error = %e, "Failed to parse token header JSON");
        TokenError::MalformedHeader
    })?;

    // Extract kid as string, rejecting empty values
    let key_id = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(TokenError::MissingKeyId)?;

    let algorithm = header
        .get("alg")
        .and_then(|v| v.as_str())
        .unwrap_or("RS256")
        .to_string();

    Ok(Some(DecodedTokenHeader { key_id, algorithm }))
}

/// Verify a compact token against a signing key and return its claims.
///
/// Checks the RSA signature plus the standard temporal claims (`exp`
/// required, `nbf` when present) with `CLOCK_SKEW_SECONDS` of leeway.
/// Audience membership is the validation engine's check, so `aud` is not
/// validated here.
///
/// # Errors
///
/// - `UnsupportedAlgorithm` - key or token header asserts anything
///   other than RS256
/// - `UnusableKey` - key is not RSA or lacks its public components
/// - `Verification` - signature or temporal-claim check failed
pub fn verify_signature(token: &str, key: &SigningKey) -> Result<TokenClaims, TokenError> {
    if let Some(alg) = &key.alg {
        if alg != "RS256" {
            tracing::debug!(target: "gate.token", kid = %key.kid, alg = %alg, "Rejecting key with unsupported algorithm");
            return Err(TokenError::UnsupportedAlgorithm);
        }
    }

    if let Some(kty) = &key.kty {
        if kty != "RSA" {
            tracing::debug!(target: "gate.token", kid = %key.kid, kty = %kty, "Rejecting non-RSA key");
            return Err(TokenError::UnusableKey);
        }
    }

    let (n, e) = match (&key.n, &key.e) {
        (Some(n), Some(e)) => (n, e),
        _ => {
            tracing::debug!(target: "gate.token", kid = %key.kid, "Key entry is missing RSA public components");
            return Err(TokenError::UnusableKey);
        }
    };

    let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|e| {
        tracing::debug!(target: "gate.token", kid = %key.kid, error = %e, "Failed to build decoding key from RSA components");
        TokenError::UnusableKey
    })?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    // Audience membership is checked by the engine against the configured
    // tenant/audience pairs, not here.
    validation.validate_aud = false;
    validation.leeway = CLOCK_SKEW_SECONDS;

    let token_data =
        decode::<TokenClaims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidAlgorithm => TokenError::UnsupportedAlgorithm,
            _ => TokenError::Verification(e.to_string()),
        })?;

    Ok(token_data.claims)
}
