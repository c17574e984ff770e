//! Fixed bearer tokens mapped to tenants.

use async_trait::async_trait;
use gatehouse_core::{RequestContext, TenantIdentity};
use subtle::ConstantTimeEq;

use super::{bearer_token, AuthError};
use crate::traits::Authenticator;

/// Authenticates requests against a static token table.
///
/// Every configured token is compared in constant time, so lookup time does
/// not depend on which token (if any) matched.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: Vec<(String, TenantIdentity)>,
}

impl StaticTokenAuthenticator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `token` access as `identity`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, identity: TenantIdentity) -> Self {
        self.tokens.push((token.into(), identity));
        self
    }

    fn lookup(&self, presented: &str) -> Option<&TenantIdentity> {
        let mut found = None;
        for (token, identity) in &self.tokens {
            if bool::from(token.as_bytes().ct_eq(presented.as_bytes())) && found.is_none() {
                found = Some(identity);
            }
        }
        found
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, ctx: &RequestContext) -> Result<TenantIdentity, AuthError> {
        let token = bearer_token(ctx)?;
        self.lookup(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidCredential {
                reason: "unknown token".to_string(),
            })
    }
}
