//! OIDC provider discovery.
//!
//! Fetches `<issuer>/.well-known/openid-configuration` once at startup and
//! merges it with any endpoints configured explicitly.

use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::config::AuthConfig;
use super::error::AuthError;

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Subset of the discovery document the gatekeeper relies on
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,

    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
}

/// Endpoints resolved for the configured provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
}

/// Resolve the provider endpoints, consulting the discovery document only when
/// the configuration leaves at least one of them unset.
#[instrument(name = "discover", skip_all, fields(issuer = %config.issuer))]
pub async fn resolve_endpoints(
    config: &AuthConfig,
    http_client: &reqwest::Client,
) -> Result<ProviderEndpoints, AuthError> {
    if let (Some(authorization), Some(token), Some(userinfo)) = (
        &config.authorization_endpoint,
        &config.token_endpoint,
        &config.userinfo_endpoint,
    ) {
        debug!("All provider endpoints configured, skipping discovery");
        return Ok(ProviderEndpoints {
            authorization_endpoint: authorization.clone(),
            token_endpoint: token.clone(),
            userinfo_endpoint: userinfo.clone(),
        });
    }

    let metadata = fetch_metadata(&config.issuer, http_client).await?;

    let userinfo_endpoint = config
        .userinfo_endpoint
        .clone()
        .or(metadata.userinfo_endpoint)
        .ok_or_else(|| {
            AuthError::Discovery("provider does not advertise a userinfo_endpoint".to_string())
        })?;

    let endpoints = ProviderEndpoints {
        authorization_endpoint: config
            .authorization_endpoint
            .clone()
            .unwrap_or(metadata.authorization_endpoint),
        token_endpoint: config
            .token_endpoint
            .clone()
            .unwrap_or(metadata.token_endpoint),
        userinfo_endpoint,
    };

    info!(
        authorization_endpoint = %endpoints.authorization_endpoint,
        token_endpoint = %endpoints.token_endpoint,
        userinfo_endpoint = %endpoints.userinfo_endpoint,
        "OIDC provider endpoints resolved"
    );

    Ok(endpoints)
}

/// Fetch and check the discovery document of `issuer`
pub async fn fetch_metadata(
    issuer: &str,
    http_client: &reqwest::Client,
) -> Result<ProviderMetadata, AuthError> {
    let url = format!("{}{}", issuer.trim_end_matches('/'), DISCOVERY_PATH);
    debug!(url = %url, "Fetching discovery document");

    let response = http_client
        .get(&url)
        .send()
        .await
        .map_err(|e| AuthError::Discovery(format!("request to {} failed: {}", url, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Discovery(format!(
            "{} returned status {}: {}",
            url, status, body
        )));
    }

    let metadata: ProviderMetadata = response
        .json()
        .await
        .map_err(|e| AuthError::Discovery(format!("invalid discovery document: {}", e)))?;

    if metadata.issuer.trim_end_matches('/') != issuer.trim_end_matches('/') {
        return Err(AuthError::Discovery(format!(
            "issuer mismatch: expected '{}', provider reports '{}'",
            issuer, metadata.issuer
        )));
    }

    Ok(metadata)
}
