/// Authorization Code Exchanger
///
/// Trades a one-time authorization code for a bearer token at the provider's
/// token endpoint. One round-trip, no retry; replay protection is the
/// provider's job.
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::cookie::is_cookie_value;
use super::error::AuthError;
use super::provider::OidcProvider;
use super::token::{AccessToken, TokenErrorResponse, TokenResponse};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    /// Exchange `code` for an access token. `code_verifier` is the PKCE
    /// verifier of the authorization request, when one was sent.
    async fn exchange(
        &self,
        code: &str,
        code_verifier: Option<String>,
    ) -> Result<AccessToken, AuthError>;
}

/// Exchanger for the standard `authorization_code` grant
pub struct TokenEndpointExchanger {
    provider: Arc<OidcProvider>,
}

impl TokenEndpointExchanger {
    pub fn new(provider: Arc<OidcProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CodeExchanger for TokenEndpointExchanger {
    #[instrument(name = "exchange_code", skip_all)]
    async fn exchange(
        &self,
        code: &str,
        code_verifier: Option<String>,
    ) -> Result<AccessToken, AuthError> {
        debug!(pkce = code_verifier.is_some(), "exchange_code called");

        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.provider.redirect_uri()),
        ];

        let mut request = self
            .provider
            .http_client()
            .post(&self.provider.endpoints().token_endpoint);

        // client_secret_basic for confidential clients, client_id in the body otherwise
        match self.provider.client_secret() {
            Some(secret) => {
                request = request.basic_auth(self.provider.client_id(), Some(secret));
            }
            None => form.push(("client_id", self.provider.client_id())),
        }
        if let Some(ref verifier) = code_verifier {
            form.push(("code_verifier", verifier.as_str()));
        }

        let response = request
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::CodeExchangeFailed(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<TokenErrorResponse>(&error_text) {
                Ok(provider_error) => provider_error.to_string(),
                Err(_) => format!("status {}: {}", status, error_text),
            };
            return Err(AuthError::CodeExchangeFailed(reason));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            AuthError::CodeExchangeFailed(format!("Failed to parse token response: {}", e))
        })?;

        let access_token = token_response
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AuthError::CodeExchangeFailed("server response missing access_token".to_string())
            })?;

        // The token ends up verbatim in a Set-Cookie header
        if !is_cookie_value(access_token.secret()) {
            return Err(AuthError::CodeExchangeFailed(
                "access_token contains characters not allowed in a cookie".to_string(),
            ));
        }

        debug!(
            token_type = token_response.token_type.as_deref().unwrap_or("unknown"),
            expires_in = token_response.expires_in,
            "Token received from code exchange"
        );

        Ok(access_token)
    }
}
