/// Token and claim types exchanged with the identity provider
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque bearer access token.
///
/// The value is only reachable through [`AccessToken::secret`] so that it never
/// ends up in `Debug` output or structured log fields by accident.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([redacted])")
    }
}

/// Successful token endpoint response (RFC 6749 section 5.1)
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<AccessToken>,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub expires_in: Option<u64>,

    #[serde(default)]
    pub scope: Option<String>,
}

/// Error body returned by the token endpoint (RFC 6749 section 5.2)
#[derive(Debug, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,

    #[serde(default)]
    pub error_description: Option<String>,
}

impl fmt::Display for TokenErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => f.write_str(&self.error),
        }
    }
}

/// Claims returned by the user-info endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    /// Subject identifier
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Every other claim the provider sent
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}
