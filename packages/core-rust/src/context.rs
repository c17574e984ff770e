use std::collections::BTreeMap;

use crate::types::TenantIdentity;

/// Per-request context carrying identity, tracing and raw request metadata.
///
/// Created by the transport for every request and threaded through every
/// pipeline stage. The request metadata is fixed once built; the tenant
/// identity is attached exactly once by the authentication gate.
#[derive(Debug, Clone)]
pub struct RequestContext {
    trace_id: String,
    method: String,
    path: String,
    query: Option<String>,
    /// Lowercase header names.
    headers: BTreeMap<String, String>,
    /// Path parameters captured by the route pattern.
    params: BTreeMap<String, String>,
    identity: Option<TenantIdentity>,
}

impl RequestContext {
    /// Creates an unauthenticated context for a request.
    #[must_use]
    pub fn new(
        trace_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            method: method.into(),
            path: path.into(),
            query: None,
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
            identity: None,
        }
    }

    /// Sets the raw query string (without the leading `?`). Empty strings are ignored.
    #[must_use]
    pub fn with_query(mut self, query: Option<impl Into<String>>) -> Self {
        self.query = query.map(Into::into).filter(|q| !q.is_empty());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Attaches the tenant identity resolved by the authentication gate.
    #[must_use]
    pub fn authenticated(mut self, identity: TenantIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Looks up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    #[must_use]
    pub fn identity(&self) -> Option<&TenantIdentity> {
        self.identity.as_ref()
    }

    /// Namespace of the authenticated tenant, `None` before authentication.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.identity.as_ref().map(|id| id.namespace.as_str())
    }
}
