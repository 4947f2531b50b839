//! Validation configuration.
//!
//! Configuration is loaded from environment variables, built once at
//! process start, and shared read-only for the process lifetime.
//! Pre-shared service tokens are redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default header carrying the credential.
pub const DEFAULT_TOKEN_HEADER_NAME: &str = "authtoken";

/// Default identity-provider key discovery endpoint.
pub const DEFAULT_KEY_DISCOVERY_URL: &str =
    "https://login.microsoftonline.com/common/discovery/keys";

/// Default signing-key cache TTL in seconds (5 minutes).
pub const DEFAULT_KEYS_CACHE_TTL_SECONDS: u64 = 300;

/// Maximum allowed signing-key cache TTL in seconds (1 hour).
///
/// Caps misconfiguration: a longer TTL would leave rotated-out provider
/// keys trusted for too long.
pub const MAX_KEYS_CACHE_TTL_SECONDS: u64 = 3600;

/// One (tenant, audience) pair the process trusts.
///
/// A verified token is accepted only if some trusted pair matches its
/// tenant claim and either its audience claim or its client-application id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantApplication {
    /// Identity-provider tenant id the token must be issued under.
    pub tenant_id: String,

    /// Audience (or client-application id) the token must be issued for.
    pub audience_id: String,
}

/// Process-wide validation configuration.
///
/// Immutable after construction; duplicates in `trusted_apps` are harmless
/// and intentionally not deduplicated.
#[derive(Clone)]
pub struct ValidationConfig {
    /// Trusted (tenant, audience) pairs. Non-empty in production use.
    pub trusted_apps: Vec<TenantApplication>,

    /// Pre-shared opaque tokens accepted without signature verification.
    /// Blank entries are filtered out during loading.
    pub service_tokens: Vec<String>,

    /// Enables the verbose diagnostic log lines (malformed-header warnings,
    /// service-token match attempts, role denials).
    pub debug_logging: bool,

    /// Name of the request header carrying the credential.
    pub token_header_name: String,

    /// Identity-provider key discovery endpoint.
    pub keys_url: String,

    /// Signing-key cache TTL in seconds.
    pub keys_cache_ttl_secs: u64,
}

/// Custom Debug implementation that redacts the pre-shared tokens.
impl fmt::Debug for ValidationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationConfig")
            .field("trusted_apps", &self.trusted_apps)
            .field(
                "service_tokens",
                &format_args!("[REDACTED; {}]", self.service_tokens.len()),
            )
            .field("debug_logging", &self.debug_logging)
            .field("token_header_name", &self.token_header_name)
            .field("keys_url", &self.keys_url)
            .field("keys_cache_ttl_secs", &self.keys_cache_ttl_secs)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid trusted application configuration: {0}")]
    InvalidTrustedApps(String),

    #[error("Invalid debug logging configuration: {0}")]
    InvalidDebugLogging(String),

    #[error("Invalid keys cache TTL configuration: {0}")]
    InvalidKeysCacheTtl(String),
}

impl ValidationConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let trusted_apps_raw = vars
            .get("TRUSTED_APPS")
            .ok_or_else(|| ConfigError::MissingEnvVar("TRUSTED_APPS".to_string()))?;

        let trusted_apps = parse_trusted_apps(trusted_apps_raw)?;
        if trusted_apps.is_empty() {
            return Err(ConfigError::InvalidTrustedApps(
                "TRUSTED_APPS must contain at least one tenantId:audienceId pair".to_string(),
            ));
        }

        // Configured tokens plus the optional environment-provided one,
        // with blank entries filtered out.
        let mut service_tokens: Vec<String> = vars
            .get("SERVICE_TOKENS")
            .map(|raw| raw.split(',').map(|t| t.trim().to_string()).collect())
            .unwrap_or_default();
        if let Some(env_token) = vars.get("SERVICE_TOKEN") {
            service_tokens.push(env_token.clone());
        }
        service_tokens.retain(|t| !t.trim().is_empty());

        let debug_logging = if let Some(value) = vars.get("AUTH_DEBUG_LOGGING") {
            match value.trim() {
                "true" | "1" => true,
                "false" | "0" => false,
                other => {
                    return Err(ConfigError::InvalidDebugLogging(format!(
                        "AUTH_DEBUG_LOGGING must be true/false/1/0, got '{}'",
                        other
                    )))
                }
            }
        } else {
            false
        };

        let token_header_name = vars
            .get("TOKEN_HEADER_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TOKEN_HEADER_NAME.to_string());

        let keys_url = vars
            .get("KEY_DISCOVERY_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_KEY_DISCOVERY_URL.to_string());

        // Parse cache TTL with validation
        let keys_cache_ttl_secs = if let Some(value_str) = vars.get("KEYS_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidKeysCacheTtl(format!(
                    "KEYS_CACHE_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidKeysCacheTtl(
                    "KEYS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }

            if value > MAX_KEYS_CACHE_TTL_SECONDS {
                return Err(ConfigError::InvalidKeysCacheTtl(format!(
                    "KEYS_CACHE_TTL_SECONDS must not exceed {} seconds, got {}",
                    MAX_KEYS_CACHE_TTL_SECONDS, value
                )));
            }

            value
        } else {
            DEFAULT_KEYS_CACHE_TTL_SECONDS
        };

        Ok(ValidationConfig {
            trusted_apps,
            service_tokens,
            debug_logging,
            token_header_name,
            keys_url,
            keys_cache_ttl_secs,
        })
    }

    /// Exact-match lookup against the pre-shared token list.
    pub fn is_service_token(&self, token: &str) -> bool {
        self.service_tokens.iter().any(|t| t == token)
    }
}

/// Parse `tenantId:audienceId` pairs from a comma-separated list.
///
/// Empty segments between commas are skipped; a pair with a blank side is
/// a configuration error.
fn parse_trusted_apps(raw: &str) -> Result<Vec<TenantApplication>, ConfigError> {
    let mut apps = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let (tenant_id, audience_id) = entry.split_once(':').ok_or_else(|| {
            ConfigError::InvalidTrustedApps(format!(
                "expected tenantId:audienceId, got '{}'",
                entry
            ))
        })?;

        let tenant_id = tenant_id.trim();
        let audience_id = audience_id.trim();
        if tenant_id.is_empty() || audience_id.is_empty() {
            return Err(ConfigError::InvalidTrustedApps(format!(
                "tenantId and audienceId must both be non-empty, got '{}'",
                entry
            )));
        }

        apps.push(TenantApplication {
            tenant_id: tenant_id.to_string(),
            audience_id: audience_id.to_string(),
        });
    }
    Ok(apps)
}
