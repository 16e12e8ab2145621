// Authentication Error Types
// Failure taxonomy of the gatekeeper flow and its HTTP mapping

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    // Request-side errors
    #[error("Failed to read session cookie: {0}")]
    CookieRead(String),

    #[error("Failed to write session cookie: {0}")]
    CookieWrite(String),

    #[error("Provider returned error '{error}' on callback: {}", .description.as_deref().unwrap_or("no description"))]
    Callback {
        error: String,
        description: Option<String>,
    },

    // Provider round-trips
    #[error("OAuth2 code exchange failed: {0}")]
    CodeExchangeFailed(String),

    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    #[error("OIDC discovery failed: {0}")]
    Discovery(String),

    // Configuration errors
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Request cancelled by server shutdown")]
    Cancelled,
}

impl AuthError {
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Callback { .. } | AuthError::CodeExchangeFailed(_) => 400,

            AuthError::InvalidToken(_) => 401,

            AuthError::Discovery(_) => 502,

            AuthError::Cancelled => 503,

            AuthError::CookieRead(_)
            | AuthError::CookieWrite(_)
            | AuthError::MissingConfig(_)
            | AuthError::InvalidConfig { .. }
            | AuthError::HttpClient(_) => 500,
        }
    }

    /// Stable machine-readable tag used in error bodies and log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::CookieRead(_) => "cookie_read_error",
            AuthError::CookieWrite(_) => "cookie_write_error",
            AuthError::Callback { .. } => "callback_error",
            AuthError::CodeExchangeFailed(_) => "exchange_error",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::Discovery(_) => "discovery_error",
            AuthError::MissingConfig(_) | AuthError::InvalidConfig { .. } => "config_error",
            AuthError::HttpClient(_) => "http_client_error",
            AuthError::Cancelled => "cancelled",
        }
    }
}

/// Error response for authentication failures
#[derive(Debug)]
pub struct AuthErrorResponse {
    pub error: AuthError,
}

impl IntoResponse for AuthErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = serde_json::json!({
            "error": self.error.error_code(),
            "message": self.error.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for AuthErrorResponse {
    fn from(error: AuthError) -> Self {
        Self { error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AuthError::CookieRead("bad header".to_string()).status_code(), 500);
        assert_eq!(AuthError::CookieWrite("bad value".to_string()).status_code(), 500);
        assert_eq!(
            AuthError::Callback {
                error: "access_denied".to_string(),
                description: None,
            }
            .status_code(),
            400
        );
        assert_eq!(
            AuthError::CodeExchangeFailed("invalid_grant".to_string()).status_code(),
            400
        );
        assert_eq!(AuthError::InvalidToken("expired".to_string()).status_code(), 401);
        assert_eq!(AuthError::Discovery("timeout".to_string()).status_code(), 502);
        assert_eq!(AuthError::Cancelled.status_code(), 503);
    }

    #[test]
    fn test_error_display() {
        let err = AuthError::Callback {
            error: "access_denied".to_string(),
            description: Some("User denied consent".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Provider returned error 'access_denied' on callback: User denied consent"
        );

        let err = AuthError::Callback {
            error: "server_error".to_string(),
            description: None,
        };
        assert_eq!(
            err.to_string(),
            "Provider returned error 'server_error' on callback: no description"
        );

        let err = AuthError::InvalidConfig {
            key: "auth.issuer".to_string(),
            reason: "cannot be empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for auth.issuer: cannot be empty"
        );
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let response = AuthErrorResponse::from(AuthError::InvalidToken("revoked".to_string()))
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "invalid_token");
        assert_eq!(body["status"], 401);
        assert_eq!(body["message"], "Invalid access token: revoked");
    }
}
