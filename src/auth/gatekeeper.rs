//! Authentication gatekeeper.
//!
//! Decides for one inbound request whether the caller is authenticated. The
//! checks run in a fixed order and the first match wins:
//!
//! 1. session cookie present: validate its token
//! 2. cookie unreadable: fail
//! 3. `error` query parameter: fail with the provider's error
//! 4. no `code` query parameter: redirect to the provider
//! 5. `code` present: exchange it, validate the token, set the session cookie
//!
//! With PKCE enabled (public clients) step 4 also stores a fresh verifier in a
//! short-lived cookie and step 5 requires it back.
//!
//! Redirects, authenticated results and failures are terminal for the request.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::config::{CookieConfig, InvalidCookiePolicy};
use super::cookie::{CookieStore, SessionCookie};
use super::error::AuthError;
use super::exchange::CodeExchanger;
use super::pkce::{self, PkcePair};
use super::token::{AccessToken, UserInfo};
use super::validator::TokenValidator;

/// Query parameters the provider may attach when redirecting back
#[derive(Debug, Default, Clone)]
pub struct CallbackParams {
    /// Authorization code from provider
    pub code: Option<String>,

    /// Error from provider
    pub error: Option<String>,

    /// Error description from provider
    pub error_description: Option<String>,

    /// Accepted but not verified
    pub state: Option<String>,
}

impl CallbackParams {
    /// Build from decoded query pairs. A repeated key keeps its first value;
    /// unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();

        for (key, value) in pairs {
            let slot = match key.as_str() {
                "code" => &mut params.code,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                "state" => &mut params.state,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        params
    }

    pub fn code(&self) -> Option<&str> {
        non_empty(&self.code)
    }

    pub fn error(&self) -> Option<&str> {
        non_empty(&self.error)
    }

    pub fn error_description(&self) -> Option<&str> {
        non_empty(&self.error_description)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Result of [`Gatekeeper::check_auth`]
#[derive(Debug)]
pub enum AuthOutcome {
    /// Token accepted by the provider
    Authenticated { token: AccessToken, user: UserInfo },

    /// Caller must be sent to `location`; nothing else should be processed
    Redirected { location: String },

    Failed(AuthError),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated { .. })
    }
}

/// Stateless per request; everything it holds is shared read-only
pub struct Gatekeeper {
    authorization_url: String,
    validator: Arc<dyn TokenValidator>,
    exchanger: Arc<dyn CodeExchanger>,
    cookie: CookieConfig,
    on_invalid_cookie: InvalidCookiePolicy,
    pkce: bool,
}

impl Gatekeeper {
    pub fn new(
        authorization_url: String,
        validator: Arc<dyn TokenValidator>,
        exchanger: Arc<dyn CodeExchanger>,
        cookie: CookieConfig,
        on_invalid_cookie: InvalidCookiePolicy,
    ) -> Self {
        Self {
            authorization_url,
            validator,
            exchanger,
            cookie,
            on_invalid_cookie,
            pkce: false,
        }
    }

    /// Send an S256 challenge with every redirect and the matching verifier
    /// with every code exchange
    pub fn with_pkce(mut self, enabled: bool) -> Self {
        self.pkce = enabled;
        self
    }

    pub fn authorization_url(&self) -> &str {
        &self.authorization_url
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie.name
    }

    #[instrument(name = "check_auth", skip_all)]
    pub async fn check_auth<C>(&self, cookies: &mut C, params: &CallbackParams) -> AuthOutcome
    where
        C: CookieStore + Send,
    {
        debug!("check_auth called");

        match cookies.get(&self.cookie.name) {
            Ok(Some(value)) => {
                debug!(cookie = %self.cookie.name, "Token found in cookie");
                return self.check_cookie_token(cookies, AccessToken::new(value)).await;
            }
            Ok(None) => {}
            Err(e) => {
                info!(error = %e, "Unexpected error reading session cookie");
                return AuthOutcome::Failed(e);
            }
        }

        if let Some(error) = params.error() {
            let description = params.error_description().map(str::to_string);
            info!(
                error = %error,
                error_description = description.as_deref().unwrap_or(""),
                "Error returned on auth callback"
            );
            return AuthOutcome::Failed(AuthError::Callback {
                error: error.to_string(),
                description,
            });
        }

        let Some(code) = params.code() else {
            debug!("Redirecting to auth endpoint");
            return self.redirect_to_provider(cookies);
        };

        debug!("Code found in request");

        let code_verifier = if self.pkce {
            match self.take_code_verifier(cookies) {
                Ok(verifier) => Some(verifier),
                Err(e) => {
                    info!(error = %e, "No usable PKCE verifier for code exchange");
                    return AuthOutcome::Failed(e);
                }
            }
        } else {
            None
        };

        let token = match self.exchanger.exchange(code, code_verifier).await {
            Ok(token) => token,
            Err(e) => {
                info!(error = %e, "Error exchanging code for token");
                return AuthOutcome::Failed(e);
            }
        };

        let user = match self.validator.validate(&token).await {
            Ok(user) => user,
            Err(e) => {
                info!(error = %e, "Token from code exchange failed validation");
                return AuthOutcome::Failed(e);
            }
        };

        cookies.set(SessionCookie::new(&self.cookie, token.secret()));
        info!(subject = %user.sub, "Authenticated via code exchange");

        AuthOutcome::Authenticated { token, user }
    }

    async fn check_cookie_token<C>(&self, cookies: &mut C, token: AccessToken) -> AuthOutcome
    where
        C: CookieStore + Send,
    {
        match self.validator.validate(&token).await {
            Ok(user) => {
                debug!(subject = %user.sub, "Authenticated via session cookie");
                AuthOutcome::Authenticated { token, user }
            }
            Err(e) => match self.on_invalid_cookie {
                InvalidCookiePolicy::Reject => {
                    info!(error = %e, "Session cookie token rejected");
                    AuthOutcome::Failed(e)
                }
                InvalidCookiePolicy::Reauthenticate => {
                    warn!(error = %e, "Session cookie token rejected, re-authenticating");
                    cookies.set(SessionCookie::removal(&self.cookie));
                    self.redirect_to_provider(cookies)
                }
            },
        }
    }

    fn redirect_to_provider<C>(&self, cookies: &mut C) -> AuthOutcome
    where
        C: CookieStore + Send,
    {
        if !self.pkce {
            return AuthOutcome::Redirected {
                location: self.authorization_url.clone(),
            };
        }

        let pair = PkcePair::generate();
        match pkce::with_code_challenge(&self.authorization_url, &pair.code_challenge) {
            Ok(location) => {
                cookies.set(SessionCookie::pkce_verifier(&self.cookie, &pair.code_verifier));
                AuthOutcome::Redirected { location }
            }
            Err(e) => AuthOutcome::Failed(e),
        }
    }

    /// Read the verifier stored at redirect time and queue its removal; it is
    /// good for one exchange only
    fn take_code_verifier<C>(&self, cookies: &mut C) -> Result<String, AuthError>
    where
        C: CookieStore + Send,
    {
        let verifier = cookies
            .get(&self.cookie.pkce_name)?
            .filter(|verifier| !verifier.is_empty())
            .ok_or_else(|| {
                AuthError::CodeExchangeFailed("PKCE code verifier cookie is missing".to_string())
            })?;

        cookies.set(SessionCookie::pkce_removal(&self.cookie));
        Ok(verifier)
    }
}
