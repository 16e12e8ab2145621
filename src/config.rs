//! Process configuration.
//!
//! Layers, later ones winning: built-in defaults, an optional TOML file,
//! `GATEKEEPER_`-prefixed environment variables (`__` separates nesting levels),
//! then the short unprefixed variables (`ISSUER`, `CLIENT_ID`, `LOG_LEVEL`, ...).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::auth::{AuthConfig, AuthError};

/// Unprefixed environment variables and the keys they set
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("ISSUER", "auth.issuer"),
    ("CLIENT_ID", "auth.client_id"),
    ("CLIENT_SECRET", "auth.client_secret"),
    ("SCOPES", "auth.scopes"),
    ("REDIRECT_URI", "auth.redirect_uri"),
    ("LOG_LEVEL", "log.level"),
    ("LOG_PRETTY", "log.pretty"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path guarded by the gatekeeper
    pub protected_path: String,
    /// Path the provider redirects back to
    pub callback_path: String,
    /// Deadline for handling one inbound request
    pub request_timeout_ms: u64,
    /// How long in-flight requests may take to finish once shutdown starts
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            protected_path: "/".to_string(),
            callback_path: "/auth/callback".to_string(),
            request_timeout_ms: 30_000,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl ServerConfig {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    /// Multi-line human readable output
    pub pretty: bool,
    /// JSON lines output (takes precedence over `pretty`)
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            pretty: false,
            json: false,
        }
    }
}

impl Config {
    /// Load configuration, reading `path` when it exists
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }

        figment
            .merge(Env::prefixed("GATEKEEPER_").split("__"))
            .merge(legacy_env())
            .extract()
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        for (key, path) in [
            ("server.protected_path", &self.server.protected_path),
            ("server.callback_path", &self.server.callback_path),
        ] {
            if !path.starts_with('/') {
                return Err(AuthError::InvalidConfig {
                    key: key.to_string(),
                    reason: "must start with '/'".to_string(),
                });
            }
            if path == "/health" {
                return Err(AuthError::InvalidConfig {
                    key: key.to_string(),
                    reason: "'/health' is reserved".to_string(),
                });
            }
        }

        if self.server.request_timeout_ms == 0 {
            return Err(AuthError::InvalidConfig {
                key: "server.request_timeout_ms".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        self.auth.validate()
    }

    /// Configured redirect URI, or the callback path on localhost
    pub fn redirect_uri(&self) -> String {
        self.auth.redirect_uri.clone().unwrap_or_else(|| {
            format!(
                "http://localhost:{}{}",
                self.server.port, self.server.callback_path
            )
        })
    }
}

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(name, _)| *name).collect();

    Env::raw().only(&names).map(|name| {
        LEGACY_ENV_KEYS
            .iter()
            .find(|(env, _)| name.as_str().eq_ignore_ascii_case(env))
            .map(|(_, key)| (*key).into())
            .unwrap_or_else(|| name.as_str().to_string().into())
    })
}
