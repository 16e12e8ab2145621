/// Authentication Routes
///
/// HTTP handlers hosting the gatekeeper: the protected page, the OAuth2
/// callback and the health check.
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cookie::HeaderCookieStore;
use super::error::{AuthError, AuthErrorResponse};
use super::gatekeeper::{AuthOutcome, CallbackParams};
use crate::AppState;

/// JSON body returned for an authenticated caller
#[derive(Debug, Serialize)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// Where an authenticated request ends up
enum Landing {
    /// Render the status page in place
    Page,
    /// Send the browser on to the protected path
    RedirectTo(String),
}

/// Protected page: runs the gatekeeper and reports the authenticated user
async fn protected(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    debug!("protected page called");
    let params = CallbackParams::from_pairs(pairs);
    guard(&state, &params, &headers, Landing::Page).await
}

/// OAuth2 callback: same decision flow, then back to the protected page
async fn callback(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    debug!("callback called");
    let params = CallbackParams::from_pairs(pairs);
    let landing = Landing::RedirectTo(state.protected_path.to_string());
    guard(&state, &params, &headers, landing).await
}

async fn guard(
    state: &AppState,
    params: &CallbackParams,
    headers: &HeaderMap,
    landing: Landing,
) -> Response {
    let mut cookies = HeaderCookieStore::new(headers);

    let outcome = tokio::select! {
        outcome = state.gatekeeper.check_auth(&mut cookies, params) => outcome,
        _ = state.shutdown.cancelled() => AuthOutcome::Failed(AuthError::Cancelled),
    };

    let mut response = match outcome {
        AuthOutcome::Authenticated { user, .. } => {
            info!(subject = %user.sub, "Request authenticated");
            match landing {
                Landing::Page => Json(AuthStatusResponse {
                    authenticated: true,
                    subject: user.sub,
                    email: user.email,
                    name: user.name,
                })
                .into_response(),
                Landing::RedirectTo(path) => Redirect::to(&path).into_response(),
            }
        }
        AuthOutcome::Redirected { location } => {
            info!("Redirect to identity provider performed");
            found(&location)
        }
        AuthOutcome::Failed(error) => {
            info!(error = %error, code = error.error_code(), "Authentication failed");
            AuthErrorResponse::from(error).into_response()
        }
    };

    match cookies.set_cookie_headers() {
        Ok(values) => {
            for value in values {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            response
        }
        Err(error) => {
            warn!(error = %error, "Refusing to send response with unusable cookie");
            AuthErrorResponse::from(error).into_response()
        }
    }
}

/// `302 Found` to `location`
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => AuthErrorResponse::from(AuthError::InvalidConfig {
            key: "authorization_endpoint".to_string(),
            reason: "cannot be used as a Location header".to_string(),
        })
        .into_response(),
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Create the gatekeeper router; the callback route is skipped when it
/// shares the protected path
pub fn create_auth_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route(&state.protected_path, get(protected));

    if state.callback_path != state.protected_path {
        router = router.route(&state.callback_path, get(callback));
    }

    router.with_state(state)
}
