//! Test harness: an in-process identity provider plus a gatekeeper bound to
//! an ephemeral port.

#![allow(dead_code)]

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use oidc_gatekeeper::{config::Config, start_server_with_config};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub const GOOD_CODE: &str = "good-code";
pub const GOOD_TOKEN: &str = "tok-123";
/// User-info never answers for this token
pub const STALLED_TOKEN: &str = "tok-stalled";
/// Exchanging this code yields a token carrying cookie attributes
pub const INJECTING_CODE: &str = "injecting-code";
pub const SUBJECT: &str = "user-1";
pub const CLIENT_ID: &str = "gatekeeper-test";
pub const CLIENT_SECRET: &str = "s3cret";

/// What the token endpoint received
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub form: HashMap<String, String>,
    pub authorization: Option<String>,
}

#[derive(Clone)]
struct IdpState {
    issuer: String,
    token_requests: Arc<Mutex<Vec<TokenRequest>>>,
}

/// Mock OpenID provider serving discovery, token and user-info endpoints
pub struct MockIdp {
    pub port: u16,
    token_requests: Arc<Mutex<Vec<TokenRequest>>>,
    shutdown: CancellationToken,
}

impl MockIdp {
    pub async fn start() -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let token_requests = Arc::new(Mutex::new(Vec::new()));
        let state = IdpState {
            issuer: format!("http://127.0.0.1:{}", port),
            token_requests: Arc::clone(&token_requests),
        };

        let app = Router::new()
            .route("/.well-known/openid-configuration", get(discovery))
            .route("/token", post(token))
            .route("/userinfo", get(userinfo))
            .with_state(state);

        let shutdown = CancellationToken::new();
        let stop = shutdown.clone().cancelled_owned();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).with_graceful_shutdown(stop).await;
        });

        Ok(Self {
            port,
            token_requests,
            shutdown,
        })
    }

    pub fn issuer(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Requests received by the token endpoint so far
    pub async fn token_requests(&self) -> Vec<TokenRequest> {
        self.token_requests.lock().await.clone()
    }
}

impl Drop for MockIdp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn discovery(State(state): State<IdpState>) -> Json<serde_json::Value> {
    Json(json!({
        "issuer": state.issuer,
        "authorization_endpoint": format!("{}/authorize", state.issuer),
        "token_endpoint": format!("{}/token", state.issuer),
        "userinfo_endpoint": format!("{}/userinfo", state.issuer),
    }))
}

async fn token(
    State(state): State<IdpState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let authorization_code = form.get("grant_type").map(String::as_str) == Some("authorization_code");
    let access_token = match form.get("code").map(String::as_str) {
        Some(GOOD_CODE) if authorization_code => Some(GOOD_TOKEN),
        Some(INJECTING_CODE) if authorization_code => Some("abc; Domain=evil.example"),
        _ => None,
    };

    state.token_requests.lock().await.push(TokenRequest {
        form,
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    if let Some(access_token) = access_token {
        Json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3600,
        }))
        .into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "authorization code is invalid or expired",
            })),
        )
            .into_response()
    }
}

async fn userinfo(headers: HeaderMap) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if bearer == Some(STALLED_TOKEN) {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }

    match bearer {
        Some(token) if token == GOOD_TOKEN || token.starts_with("abc") => Json(json!({
            "sub": SUBJECT,
            "email": "user@example.com",
            "name": "Test User",
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

/// Gatekeeper configuration pointed at `idp`, listening on an ephemeral port
pub fn test_config(idp: &MockIdp) -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.protected_path = "/".to_string();
    config.server.callback_path = "/auth/callback".to_string();
    config.auth.issuer = idp.issuer();
    config.auth.client_id = CLIENT_ID.to_string();
    config.auth.client_secret = CLIENT_SECRET.to_string();
    config.auth.redirect_uri = Some("http://localhost:8080/auth/callback".to_string());
    config.auth.http_timeout_ms = 2000;
    config
}

/// Same provider, registered as a public client (no secret, PKCE)
pub fn public_client_config(idp: &MockIdp) -> Config {
    let mut config = test_config(idp);
    config.auth.client_secret = String::new();
    config
}

/// Running gatekeeper, stopped on drop
pub struct TestServer {
    pub port: u16,
    shutdown: CancellationToken,
}

impl TestServer {
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let shutdown = CancellationToken::new();
        let port = start_server_with_config(config, shutdown.clone()).await?;
        Ok(Self { port, shutdown })
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path_and_query)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// HTTP client that leaves redirects for the test to inspect
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// `Set-Cookie` header values of a response
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}
