// Authentication Configuration
// Identity provider settings, session cookie attributes and gatekeeper policy

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use super::error::AuthError;

/// Identity provider (relying party) configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OIDC issuer URL, used for discovery
    pub issuer: String,

    /// OAuth2 client ID
    pub client_id: String,

    /// OAuth2 client secret (empty for public clients)
    pub client_secret: String,

    /// Callback URL registered at the provider (derived from the server address when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// OAuth2 scopes, as a list or a single space-separated string
    #[serde(deserialize_with = "deserialize_scopes")]
    pub scopes: Vec<String>,

    /// Endpoint overrides; discovery fills in whatever is left unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// Deadline for every outbound call to the provider
    pub http_timeout_ms: u64,

    /// What to do when the session cookie carries a token the provider rejects
    pub on_invalid_cookie: InvalidCookiePolicy,

    pub cookie: CookieConfig,
}

impl AuthConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.issuer.is_empty() {
            return Err(AuthError::MissingConfig("auth.issuer".to_string()));
        }
        parse_http_url("auth.issuer", &self.issuer)?;

        if self.client_id.is_empty() {
            return Err(AuthError::MissingConfig("auth.client_id".to_string()));
        }

        if let Some(ref redirect_uri) = self.redirect_uri {
            parse_http_url("auth.redirect_uri", redirect_uri)?;
        }

        for (key, endpoint) in [
            ("auth.authorization_endpoint", &self.authorization_endpoint),
            ("auth.token_endpoint", &self.token_endpoint),
            ("auth.userinfo_endpoint", &self.userinfo_endpoint),
        ] {
            if let Some(endpoint) = endpoint {
                parse_http_url(key, endpoint)?;
            }
        }

        if !(100..=60_000).contains(&self.http_timeout_ms) {
            return Err(AuthError::InvalidConfig {
                key: "auth.http_timeout_ms".to_string(),
                reason: "must be between 100 and 60000".to_string(),
            });
        }

        self.cookie.validate()?;

        Ok(())
    }

    /// Scopes sent with the authorization request; `openid` is always present
    pub fn effective_scopes(&self) -> Vec<String> {
        if self.scopes.is_empty() {
            tracing::warn!("auth.scopes is empty, requesting only 'openid'");
        }

        let mut scopes: Vec<String> = self
            .scopes
            .iter()
            .filter(|scope| !scope.is_empty())
            .cloned()
            .collect();

        if !scopes.iter().any(|scope| scope == "openid") {
            scopes.insert(0, "openid".to_string());
        }

        scopes
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),    // Must be set explicitly
            client_id: String::new(), // Must be set explicitly
            client_secret: String::new(),
            redirect_uri: None,
            scopes: default_scopes(),
            authorization_endpoint: None,
            token_endpoint: None,
            userinfo_endpoint: None,
            http_timeout_ms: default_http_timeout_ms(),
            on_invalid_cookie: InvalidCookiePolicy::default(),
            cookie: CookieConfig::default(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &if self.client_secret.is_empty() {
                    ""
                } else {
                    "[redacted]"
                },
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("userinfo_endpoint", &self.userinfo_endpoint)
            .field("http_timeout_ms", &self.http_timeout_ms)
            .field("on_invalid_cookie", &self.on_invalid_cookie)
            .field("cookie", &self.cookie)
            .finish()
    }
}

/// Behaviour when the session cookie holds a token the provider no longer accepts
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvalidCookiePolicy {
    /// Fail the request with 401
    #[default]
    Reject,

    /// Clear the cookie and send the user back to the provider
    Reauthenticate,
}

/// Session cookie attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie name
    pub name: String,

    /// Name of the cookie holding the PKCE verifier (public clients only)
    pub pkce_name: String,

    /// Cookie path
    pub path: String,

    /// Cookie domain (None = current domain)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Secure flag (HTTPS only) - should be true in production
    pub secure: bool,

    /// HttpOnly flag (prevent JavaScript access)
    pub http_only: bool,

    /// SameSite policy
    pub same_site: SameSitePolicy,

    /// Max-Age in seconds (None = session cookie)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_secs: Option<u64>,
}

impl CookieConfig {
    fn validate(&self) -> Result<(), AuthError> {
        validate_cookie_name("auth.cookie.name", &self.name)?;
        validate_cookie_name("auth.cookie.pkce_name", &self.pkce_name)?;

        if self.name == self.pkce_name {
            return Err(AuthError::InvalidConfig {
                key: "auth.cookie.pkce_name".to_string(),
                reason: "must differ from auth.cookie.name".to_string(),
            });
        }

        if !self.path.starts_with('/') {
            return Err(AuthError::InvalidConfig {
                key: "auth.cookie.path".to_string(),
                reason: "must start with '/'".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            pkce_name: "pkce-verifier".to_string(),
            path: "/".to_string(),
            domain: None,
            secure: false, // Development default
            http_only: true,
            same_site: SameSitePolicy::Lax,
            max_age_secs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl SameSitePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSitePolicy::Strict => "Strict",
            SameSitePolicy::Lax => "Lax",
            SameSitePolicy::None => "None",
        }
    }
}

fn validate_cookie_name(key: &str, name: &str) -> Result<(), AuthError> {
    if name.is_empty() {
        return Err(AuthError::InvalidConfig {
            key: key.to_string(),
            reason: "cannot be empty".to_string(),
        });
    }

    if name
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || "()<>@,;:\\\"/[]?={}".contains(c))
    {
        return Err(AuthError::InvalidConfig {
            key: key.to_string(),
            reason: "contains characters not allowed in a cookie name".to_string(),
        });
    }

    Ok(())
}

fn parse_http_url(key: &str, value: &str) -> Result<Url, AuthError> {
    let url = Url::parse(value).map_err(|e| AuthError::InvalidConfig {
        key: key.to_string(),
        reason: format!("not a valid URL: {}", e),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(AuthError::InvalidConfig {
            key: key.to_string(),
            reason: format!("unsupported scheme '{}', expected http or https", scheme),
        }),
    }
}

fn deserialize_scopes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scopes {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Scopes::deserialize(deserializer)? {
        Scopes::List(scopes) => scopes,
        Scopes::Joined(joined) => joined.split_whitespace().map(str::to_string).collect(),
    })
}

// Default value functions
fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "profile".to_string(),
        "email".to_string(),
    ]
}

fn default_http_timeout_ms() -> u64 {
    5000
}

fn default_cookie_name() -> String {
    "auth-token".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AuthConfig {
        AuthConfig {
            issuer: "https://auth.example.com/realms/demo".to_string(),
            client_id: "demo-client".to_string(),
            client_secret: "demo-secret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_issuer() {
        let config = AuthConfig {
            issuer: String::new(),
            ..valid_config()
        };

        assert!(matches!(
            config.validate(),
            Err(AuthError::MissingConfig(key)) if key == "auth.issuer"
        ));
    }

    #[test]
    fn test_missing_client_id() {
        let config = AuthConfig {
            client_id: String::new(),
            ..valid_config()
        };

        assert!(matches!(
            config.validate(),
            Err(AuthError::MissingConfig(key)) if key == "auth.client_id"
        ));
    }

    #[test]
    fn test_public_client_without_secret_is_valid() {
        let config = AuthConfig {
            client_secret: String::new(),
            ..valid_config()
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_urls() {
        let config = AuthConfig {
            issuer: "ftp://auth.example.com".to_string(),
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(AuthError::InvalidConfig { .. })
        ));

        let config = AuthConfig {
            token_endpoint: Some("not-a-url".to_string()),
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(AuthError::InvalidConfig { key, .. }) if key == "auth.token_endpoint"
        ));
    }

    #[test]
    fn test_http_timeout_bounds() {
        let mut config = valid_config();

        config.http_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.http_timeout_ms = 120_000;
        assert!(config.validate().is_err());

        config.http_timeout_ms = 3000;
        assert!(config.validate().is_ok());
        assert_eq!(config.http_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_cookie_name_validation() {
        let mut config = valid_config();

        config.cookie.name = String::new();
        assert!(config.validate().is_err());

        config.cookie.name = "auth token".to_string();
        assert!(config.validate().is_err());

        config.cookie.name = "auth;token".to_string();
        assert!(config.validate().is_err());

        config.cookie.name = "auth-token".to_string();
        assert!(config.validate().is_ok());

        config.cookie.pkce_name = "pkce verifier".to_string();
        assert!(config.validate().is_err());

        config.cookie.pkce_name = "auth-token".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_scopes_always_include_openid() {
        let config = AuthConfig {
            scopes: vec!["profile".to_string(), "email".to_string()],
            ..valid_config()
        };
        assert_eq!(config.effective_scopes(), vec!["openid", "profile", "email"]);

        let config = AuthConfig {
            scopes: vec![],
            ..valid_config()
        };
        assert_eq!(config.effective_scopes(), vec!["openid"]);

        assert_eq!(
            valid_config().effective_scopes(),
            vec!["openid", "profile", "email"]
        );
    }

    #[test]
    fn test_scopes_from_space_separated_string() {
        let config: AuthConfig = serde_json::from_value(serde_json::json!({
            "issuer": "https://auth.example.com",
            "client_id": "demo-client",
            "scopes": "openid  profile email"
        }))
        .unwrap();

        assert_eq!(config.scopes, vec!["openid", "profile", "email"]);
    }

    #[test]
    fn test_defaults_from_partial_document() {
        let config: AuthConfig = serde_json::from_value(serde_json::json!({
            "issuer": "https://auth.example.com",
            "client_id": "demo-client",
            "on_invalid_cookie": "reauthenticate",
            "cookie": { "secure": true }
        }))
        .unwrap();

        assert_eq!(config.on_invalid_cookie, InvalidCookiePolicy::Reauthenticate);
        assert_eq!(config.http_timeout_ms, 5000);
        assert_eq!(config.cookie.name, "auth-token");
        assert!(config.cookie.secure);
        assert!(config.cookie.http_only);
        assert_eq!(config.scopes, vec!["openid", "profile", "email"]);
    }

    #[test]
    fn test_debug_redacts_client_secret() {
        let rendered = format!("{:?}", valid_config());
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains("demo-secret"));
    }
}
