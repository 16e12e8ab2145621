//! PKCE (RFC 7636) for public clients.
//!
//! Clients without a secret send an S256 `code_challenge` with the
//! authorization redirect and prove possession of the matching
//! `code_verifier` at the token endpoint.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use super::error::AuthError;

const VERIFIER_LEN: usize = 64;

/// Unreserved characters allowed in a verifier
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Verifier and its S256 challenge
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = code_challenge_s256(&code_verifier);

        Self {
            code_verifier,
            code_challenge,
        }
    }
}

/// Random verifier of unreserved characters, within the 43..=128 length range
pub fn generate_code_verifier() -> String {
    (0..VERIFIER_LEN)
        .map(|_| VERIFIER_CHARSET[rand::random::<u8>() as usize % VERIFIER_CHARSET.len()] as char)
        .collect()
}

/// BASE64URL(SHA256(verifier)) without padding
pub fn code_challenge_s256(code_verifier: &str) -> String {
    let hash = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// `authorization_url` with `code_challenge` and `code_challenge_method=S256` appended
pub fn with_code_challenge(authorization_url: &str, code_challenge: &str) -> Result<String, AuthError> {
    let mut url = url::Url::parse(authorization_url).map_err(|e| AuthError::InvalidConfig {
        key: "authorization_endpoint".to_string(),
        reason: format!("not a valid URL: {}", e),
    })?;

    url.query_pairs_mut()
        .append_pair("code_challenge", code_challenge)
        .append_pair("code_challenge_method", "S256");

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_shape() {
        let verifier = generate_code_verifier();
        assert_eq!(verifier.len(), VERIFIER_LEN);
        assert!(verifier.bytes().all(|b| VERIFIER_CHARSET.contains(&b)));

        assert_ne!(generate_code_verifier(), verifier);
    }

    #[test]
    fn test_challenge_matches_rfc_example() {
        assert_eq!(
            code_challenge_s256("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_pair_is_consistent() {
        let pair = PkcePair::generate();
        assert_eq!(code_challenge_s256(&pair.code_verifier), pair.code_challenge);
    }

    #[test]
    fn test_challenge_appended_to_authorization_url() {
        let url = with_code_challenge(
            "https://idp.example.com/authorize?client_id=demo&response_type=code",
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM",
        )
        .unwrap();

        assert_eq!(
            url,
            "https://idp.example.com/authorize?client_id=demo&response_type=code\
             &code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM\
             &code_challenge_method=S256"
        );
        assert!(with_code_challenge("not a url", "abc").is_err());
    }
}
