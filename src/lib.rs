use anyhow::Context;
use axum::{Router, http::StatusCode};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

pub mod auth;
pub mod config;
pub mod logging;
pub mod middleware;
pub mod shutdown;

use auth::{
    AuthError, Gatekeeper, OidcProvider, TokenEndpointExchanger, UserInfoValidator,
};
use config::Config;

/// Shared state handed to every request handler. Nothing in it is mutated
/// after startup.
#[derive(Clone)]
pub struct AppState {
    pub gatekeeper: Arc<Gatekeeper>,
    /// Cancelled when the process shuts down; in-flight provider calls race it
    pub shutdown: CancellationToken,
    pub protected_path: Arc<str>,
    pub callback_path: Arc<str>,
}

/// Builds the router with request logging and the inbound request deadline
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    auth::routes::create_auth_router(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(axum::middleware::from_fn(
            middleware::request_logging_middleware,
        ))
}

/// Discovers the provider and wires validator and exchanger into a gatekeeper
pub async fn build_gatekeeper(config: &Config) -> Result<Gatekeeper, AuthError> {
    let provider = Arc::new(OidcProvider::discover(&config.auth, &config.redirect_uri()).await?);

    // Public clients prove the code exchange with PKCE
    let pkce = provider.client_secret().is_none();

    Ok(Gatekeeper::new(
        provider.authorization_url().to_string(),
        Arc::new(UserInfoValidator::new(Arc::clone(&provider))),
        Arc::new(TokenEndpointExchanger::new(provider)),
        config.auth.cookie.clone(),
        config.auth.on_invalid_cookie,
    )
    .with_pkce(pkce))
}

async fn prepare(config: &Config, shutdown: CancellationToken) -> anyhow::Result<(TcpListener, Router)> {
    config.validate().context("invalid configuration")?;

    let gatekeeper = build_gatekeeper(config)
        .await
        .context("failed to set up the OIDC provider")?;

    let state = AppState {
        gatekeeper: Arc::new(gatekeeper),
        shutdown,
        protected_path: Arc::from(config.server.protected_path.as_str()),
        callback_path: Arc::from(config.server.callback_path.as_str()),
    };
    let app = build_router(state, config.server.request_timeout());

    let addr = config.server.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    Ok((listener, app))
}

async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    grace: Duration,
) -> anyhow::Result<()> {
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();

    let grace_elapsed = async {
        shutdown.cancelled().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => result?,
        _ = grace_elapsed => warn!("Shutdown grace period elapsed with requests still in flight"),
    }

    Ok(())
}

/// Runs the server until `shutdown` is cancelled
pub async fn run_server(config: Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let (listener, app) = prepare(&config, shutdown.clone()).await?;

    info!(
        "Listening on http://{}{}",
        listener.local_addr()?,
        config.server.protected_path
    );

    serve(listener, app, shutdown, config.server.shutdown_grace()).await?;

    info!("Server stopped");
    Ok(())
}

/// Starts the server in a background task and returns the bound port, which
/// makes `server.port = 0` usable in tests.
pub async fn start_server_with_config(
    config: Config,
    shutdown: CancellationToken,
) -> anyhow::Result<u16> {
    let (listener, app) = prepare(&config, shutdown.clone()).await?;
    let port = listener.local_addr()?.port();
    let grace = config.server.shutdown_grace();

    info!("Server listening on port {}", port);

    tokio::spawn(async move {
        if let Err(e) = serve(listener, app, shutdown, grace).await {
            tracing::error!("Server error: {:#}", e);
        }
    });

    Ok(port)
}
