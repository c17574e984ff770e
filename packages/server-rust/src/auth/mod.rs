//! Authentication errors and reference [`Authenticator`](crate::traits::Authenticator)
//! implementations.
//!
//! - [`StaticTokenAuthenticator`]: fixed bearer tokens mapped to tenants
//! - [`JwtAuthenticator`]: HS256 bearer JWTs carrying a `namespace` claim

pub mod jwt;
pub mod token;

pub use jwt::{JwtAuthenticator, TenantClaims};
pub use token::StaticTokenAuthenticator;

use gatehouse_core::RequestContext;

/// Why a request could not be authenticated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing authorization credential")]
    MissingCredential,
    #[error("malformed authorization credential")]
    MalformedCredential,
    #[error("invalid credential: {reason}")]
    InvalidCredential { reason: String },
    #[error("authentication backend unavailable: {0}")]
    Unavailable(String),
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// # Errors
///
/// `MissingCredential` without the header, `MalformedCredential` when the
/// scheme is not `Bearer` or the token is empty.
pub fn bearer_token(ctx: &RequestContext) -> Result<&str, AuthError> {
    let header = ctx
        .header("authorization")
        .ok_or(AuthError::MissingCredential)?;
    let (scheme, token) = header
        .split_once(' ')
        .ok_or(AuthError::MalformedCredential)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedCredential);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_auth(value: &str) -> RequestContext {
        RequestContext::new("t", "GET", "/v1/nodes").with_header("authorization", value)
    }

    #[test]
    fn bearer_token_extracts_token() {
        assert_eq!(bearer_token(&ctx_with_auth("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(&ctx_with_auth("bearer  abc ")), Ok("abc"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        assert_eq!(
            bearer_token(&ctx_with_auth("Basic dXNlcg==")),
            Err(AuthError::MalformedCredential)
        );
        assert_eq!(
            bearer_token(&ctx_with_auth("Bearer")),
            Err(AuthError::MalformedCredential)
        );
        assert_eq!(
            bearer_token(&ctx_with_auth("Bearer ")),
            Err(AuthError::MalformedCredential)
        );
    }

    #[test]
    fn bearer_token_requires_header() {
        let ctx = RequestContext::new("t", "GET", "/v1/nodes");
        assert_eq!(bearer_token(&ctx), Err(AuthError::MissingCredential));
    }
}
