//! Guard error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Error messages returned to clients are intentionally generic to avoid
//! leaking internal details. Actual errors are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Authorization guard error type.
///
/// Maps to appropriate HTTP status codes:
/// - InvalidToken: 401 Unauthorized
/// - Forbidden: 403 Forbidden
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl AuthError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidToken(_) => 401,
            AuthError::Forbidden(_) => 403,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            AuthError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"gatehouse\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    // Helper function to read the response body as JSON
    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_invalid_token() {
        let error = AuthError::InvalidToken("expired".to_string());
        assert_eq!(format!("{}", error), "Invalid token: expired");
    }

    #[test]
    fn test_display_forbidden() {
        let error = AuthError::Forbidden("insufficient permissions".to_string());
        assert_eq!(format!("{}", error), "Forbidden: insufficient permissions");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::InvalidToken("test".to_string()).status_code(), 401);
        assert_eq!(AuthError::Forbidden("test".to_string()).status_code(), 403);
    }

    #[tokio::test]
    async fn test_into_response_invalid_token() {
        let error = AuthError::InvalidToken("The access token is invalid or expired".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Check WWW-Authenticate header
        let www_auth = response.headers().get("WWW-Authenticate");
        assert!(www_auth.is_some());
        let www_auth_str = www_auth.unwrap().to_str().unwrap();
        assert!(www_auth_str.contains("Bearer realm=\"gatehouse\""));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "INVALID_TOKEN");
        assert_eq!(
            body_json["error"]["message"],
            "The access token is invalid or expired"
        );
    }

    #[tokio::test]
    async fn test_into_response_forbidden() {
        let error = AuthError::Forbidden("Permission denied".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "FORBIDDEN");
        assert_eq!(body_json["error"]["message"], "Permission denied");
    }
}
