/// Token Validator
///
/// Confirms a bearer token is still accepted by the identity provider by calling
/// its user-info endpoint. No retries: transport failures and rejections both
/// surface as [`AuthError::InvalidToken`].
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::error::AuthError;
use super::provider::OidcProvider;
use super::token::{AccessToken, UserInfo};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Validate `token`, returning the claims the provider reports for it
    async fn validate(&self, token: &AccessToken) -> Result<UserInfo, AuthError>;
}

/// Validator backed by the provider's user-info endpoint
pub struct UserInfoValidator {
    provider: Arc<OidcProvider>,
}

impl UserInfoValidator {
    pub fn new(provider: Arc<OidcProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TokenValidator for UserInfoValidator {
    #[instrument(name = "validate_token", skip_all)]
    async fn validate(&self, token: &AccessToken) -> Result<UserInfo, AuthError> {
        debug!("validate_token called");

        if token.is_empty() {
            return Err(AuthError::InvalidToken("token is empty".to_string()));
        }

        let response = self
            .provider
            .http_client()
            .get(&self.provider.endpoints().userinfo_endpoint)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| AuthError::InvalidToken(format!("UserInfo request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::InvalidToken(format!(
                "UserInfo request failed with status {}: {}",
                status, error_text
            )));
        }

        let user_info: UserInfo = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidToken(format!("Failed to parse userinfo: {}", e)))?;

        if user_info.sub.is_empty() {
            return Err(AuthError::InvalidToken(
                "userinfo response has an empty subject".to_string(),
            ));
        }

        debug!(subject = %user_info.sub, "Token accepted by provider");
        Ok(user_info)
    }
}
