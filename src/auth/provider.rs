/// OIDC Provider
///
/// Read-only view of the identity provider shared by every request: client
/// credentials, resolved endpoints, the precomputed authorization URL and the
/// deadline-bounded HTTP client used for all outbound calls.
use std::fmt;
use std::time::Duration;
use tracing::info;

use super::config::AuthConfig;
use super::discovery::{self, ProviderEndpoints};
use super::error::AuthError;

pub struct OidcProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
    endpoints: ProviderEndpoints,
    authorization_url: String,
    http_client: reqwest::Client,
}

impl OidcProvider {
    /// Resolve endpoints (discovering them when needed) and build the provider
    pub async fn discover(config: &AuthConfig, redirect_uri: &str) -> Result<Self, AuthError> {
        let http_client = build_http_client(config.http_timeout())?;
        let endpoints = discovery::resolve_endpoints(config, &http_client).await?;

        let provider = Self::from_endpoints(config, redirect_uri, endpoints, http_client)?;
        info!(
            client_id = %provider.client_id,
            redirect_uri = %provider.redirect_uri,
            scopes = %provider.scopes.join(" "),
            "OIDC provider ready"
        );

        Ok(provider)
    }

    pub fn from_endpoints(
        config: &AuthConfig,
        redirect_uri: &str,
        endpoints: ProviderEndpoints,
        http_client: reqwest::Client,
    ) -> Result<Self, AuthError> {
        let scopes = config.effective_scopes();
        let authorization_url = build_authorization_url(
            &endpoints.authorization_endpoint,
            &config.client_id,
            redirect_uri,
            &scopes,
        )?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: redirect_uri.to_string(),
            scopes,
            endpoints,
            authorization_url,
            http_client,
        })
    }

    /// Where unauthenticated users are sent
    pub fn authorization_url(&self) -> &str {
        &self.authorization_url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Client secret, `None` for public clients
    pub fn client_secret(&self) -> Option<&str> {
        if self.client_secret.is_empty() {
            None
        } else {
            Some(&self.client_secret)
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }
}

impl fmt::Debug for OidcProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcProvider")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

/// HTTP client for provider calls. The same bound covers connecting and the
/// whole request so a stalled provider cannot block a request forever.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, AuthError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| AuthError::HttpClient(e.to_string()))
}

fn build_authorization_url(
    authorization_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
) -> Result<String, AuthError> {
    let mut url = url::Url::parse(authorization_endpoint).map_err(|e| AuthError::InvalidConfig {
        key: "authorization_endpoint".to_string(),
        reason: format!("not a valid URL: {}", e),
    })?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", client_id);
        query.append_pair("redirect_uri", redirect_uri);
        query.append_pair("response_type", "code");
        if !scopes.is_empty() {
            query.append_pair("scope", &scopes.join(" "));
        }
    }

    Ok(url.to_string())
}
