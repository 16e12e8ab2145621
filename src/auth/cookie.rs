/// Session cookie access
///
/// The gatekeeper reads and writes cookies only through [`CookieStore`], so the
/// decision flow stays independent of the HTTP framework.
use axum::http::{HeaderMap, HeaderValue, header};

use super::config::CookieConfig;
use super::error::AuthError;

/// Lifetime of the PKCE verifier cookie; one login round-trip
pub const PKCE_COOKIE_MAX_AGE_SECS: u64 = 600;

/// True when `value` consists only of RFC 6265 cookie-octets, so it can be
/// sent as a cookie value without quoting
pub fn is_cookie_value(value: &str) -> bool {
    value.bytes().all(|b| {
        matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E)
    })
}

/// Read/set capability for request cookies
pub trait CookieStore {
    /// Value of cookie `name`; `Ok(None)` when the request does not carry it
    fn get(&self, name: &str) -> Result<Option<String>, AuthError>;

    /// Queue a cookie to be sent back with the response
    fn set(&mut self, cookie: SessionCookie);
}

/// Cookie to be emitted as a `Set-Cookie` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: Option<String>,
    pub max_age_secs: Option<u64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<&'static str>,
}

impl SessionCookie {
    /// Session cookie carrying `value` with the configured attributes
    pub fn new(config: &CookieConfig, value: &str) -> Self {
        Self::named(config, &config.name, value)
    }

    /// Short-lived cookie holding the PKCE code verifier between the
    /// redirect and the callback
    pub fn pkce_verifier(config: &CookieConfig, verifier: &str) -> Self {
        Self {
            max_age_secs: Some(PKCE_COOKIE_MAX_AGE_SECS),
            ..Self::named(config, &config.pkce_name, verifier)
        }
    }

    /// Expired cookie that makes the browser drop the session cookie
    pub fn removal(config: &CookieConfig) -> Self {
        Self {
            max_age_secs: Some(0),
            ..Self::new(config, "")
        }
    }

    /// Expired cookie that drops a used PKCE verifier
    pub fn pkce_removal(config: &CookieConfig) -> Self {
        Self {
            max_age_secs: Some(0),
            ..Self::named(config, &config.pkce_name, "")
        }
    }

    fn named(config: &CookieConfig, name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            path: config.path.clone(),
            domain: config.domain.clone(),
            max_age_secs: config.max_age_secs,
            secure: config.secure,
            http_only: config.http_only,
            same_site: Some(config.same_site.as_str()),
        }
    }

    /// Render the `Set-Cookie` header value
    pub fn to_header_value(&self) -> String {
        let mut cookie = format!("{}={}; Path={}", self.name, self.value, self.path);

        if let Some(ref domain) = self.domain {
            cookie.push_str(&format!("; Domain={}", domain));
        }
        if let Some(max_age) = self.max_age_secs {
            cookie.push_str(&format!("; Max-Age={}", max_age));
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if let Some(same_site) = self.same_site {
            cookie.push_str(&format!("; SameSite={}", same_site));
        }
        if self.secure {
            cookie.push_str("; Secure");
        }

        cookie
    }
}

/// [`CookieStore`] over the request's `Cookie` headers, collecting `Set-Cookie`
/// values for the response.
pub struct HeaderCookieStore<'a> {
    request_headers: &'a HeaderMap,
    outgoing: Vec<SessionCookie>,
}

impl<'a> HeaderCookieStore<'a> {
    pub fn new(request_headers: &'a HeaderMap) -> Self {
        Self {
            request_headers,
            outgoing: Vec::new(),
        }
    }

    /// Cookies queued with [`CookieStore::set`]
    pub fn outgoing(&self) -> &[SessionCookie] {
        &self.outgoing
    }

    /// `Set-Cookie` header values for everything queued. Fails rather than
    /// emit a cookie whose value the browser would not store verbatim.
    pub fn set_cookie_headers(&self) -> Result<Vec<HeaderValue>, AuthError> {
        self.outgoing
            .iter()
            .map(|cookie| {
                if !is_cookie_value(&cookie.value) {
                    return Err(AuthError::CookieWrite(format!(
                        "value of cookie '{}' contains characters not allowed in a cookie",
                        cookie.name
                    )));
                }
                HeaderValue::from_str(&cookie.to_header_value()).map_err(|e| {
                    AuthError::CookieWrite(format!("cookie '{}': {}", cookie.name, e))
                })
            })
            .collect()
    }
}

impl CookieStore for HeaderCookieStore<'_> {
    fn get(&self, name: &str) -> Result<Option<String>, AuthError> {
        // HTTP/2 clients may split cookies over several headers
        for header_value in self.request_headers.get_all(header::COOKIE) {
            let cookie_str = header_value.to_str().map_err(|_| {
                AuthError::CookieRead("Cookie header contains non-ASCII bytes".to_string())
            })?;

            for pair in cookie_str.split(';') {
                let Some((cookie_name, value)) = pair.trim().split_once('=') else {
                    continue;
                };
                if cookie_name.trim() == name {
                    return Ok(Some(unquote(value.trim()).to_string()));
                }
            }
        }

        Ok(None)
    }

    fn set(&mut self, cookie: SessionCookie) {
        self.outgoing.push(cookie);
    }
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
