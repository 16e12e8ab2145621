// Authentication Module
// OIDC relying-party gatekeeper: cookie check, code exchange, token validation

pub mod config;
pub mod cookie;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod gatekeeper;
pub mod pkce;
pub mod provider;
pub mod routes;
pub mod token;
pub mod validator;

pub use config::{AuthConfig, CookieConfig, InvalidCookiePolicy, SameSitePolicy};
pub use cookie::{CookieStore, HeaderCookieStore, SessionCookie, is_cookie_value};
pub use discovery::ProviderEndpoints;
pub use error::{AuthError, AuthErrorResponse};
pub use exchange::{CodeExchanger, TokenEndpointExchanger};
pub use gatekeeper::{AuthOutcome, CallbackParams, Gatekeeper};
pub use provider::OidcProvider;
pub use token::{AccessToken, UserInfo};
pub use validator::{TokenValidator, UserInfoValidator};
