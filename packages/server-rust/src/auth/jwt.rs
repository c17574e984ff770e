//! HS256 bearer JWT authentication.

use async_trait::async_trait;
use gatehouse_core::{RequestContext, TenantIdentity};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::{bearer_token, AuthError};
use crate::traits::Authenticator;

/// Claims carried by a tenant access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantClaims {
    /// Namespace the token grants access to.
    pub namespace: String,
    /// Principal the token was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

/// Verifies HS256-signed JWTs and resolves the tenant from the `namespace` claim.
#[derive(Clone)]
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    #[must_use]
    pub fn hs256(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Only accept tokens whose `iss` claim is `issuer`.
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, ctx: &RequestContext) -> Result<TenantIdentity, AuthError> {
        let token = bearer_token(ctx)?;
        let data = decode::<TenantClaims>(token, &self.key, &self.validation).map_err(|e| {
            AuthError::InvalidCredential {
                reason: e.to_string(),
            }
        })?;
        let claims = data.claims;
        if claims.namespace.is_empty() {
            return Err(AuthError::InvalidCredential {
                reason: "token has an empty namespace claim".to_string(),
            });
        }
        let identity = TenantIdentity::new(claims.namespace);
        Ok(match claims.sub {
            Some(sub) => identity.with_principal(sub),
            None => identity,
        })
    }
}
