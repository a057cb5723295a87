//! Caller authentication.
//!
//! Every `/api` route authenticates the caller the same way: a bearer JWT
//! issued by the wallet auth provider, verified against the provider's key
//! set by [`JwtVerifier`]. The verified subject becomes an [`Identity`]
//! that handlers take as an extractor.

pub mod identity;
pub mod jwt;

pub use identity::Identity;
pub use jwt::{JwtVerifier, KeySet, VerifiedClaims};

use axum::http::{HeaderMap, header};
use thiserror::Error;

/// Why a request could not be authenticated.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("invalid or expired token")]
    InvalidToken,

    /// The provider key set could not be retrieved; nothing can be verified.
    #[error("key set fetch failed: {0}")]
    KeySetFetch(String),
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::MalformedHeader)?;

    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

/// First characters of a token, safe to put in a log line.
pub(crate) fn token_prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(10)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_token_is_extracted() {
        let h = headers("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&h).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_header_is_distinguished() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingHeader)
        ));
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_malformed() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer ", "bearer abc", "Bearer a b"] {
            assert!(
                matches!(bearer_token(&headers(value)), Err(AuthError::MalformedHeader)),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn token_prefix_is_bounded() {
        assert_eq!(token_prefix("0123456789abcdef"), "0123456789");
        assert_eq!(token_prefix("short"), "short");
    }
}
