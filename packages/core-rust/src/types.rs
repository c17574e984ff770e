use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Authenticated tenant identity resolved by the authentication gate.
///
/// Every authenticated request resolves to exactly one namespace; the
/// namespace is the isolation boundary for resources, quotas and cached
/// responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantIdentity {
    /// Namespace the request operates in.
    pub namespace: String,
    /// Authenticated principal (user, service account), if the credential names one.
    pub principal: Option<String>,
}

impl TenantIdentity {
    /// Identity scoped to `namespace` with no named principal.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            principal: None,
        }
    }

    #[must_use]
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }
}

/// Resource kinds exposed by the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Config,
    Registry,
    Certificate,
    Secret,
    Node,
    Application,
    Namespace,
    Function,
    Object,
    Property,
    Module,
    Quota,
    Yaml,
}

impl ResourceKind {
    /// Stable lowercase name, used in lock names, metric labels and config keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Registry => "registry",
            Self::Certificate => "certificate",
            Self::Secret => "secret",
            Self::Node => "node",
            Self::Application => "application",
            Self::Namespace => "namespace",
            Self::Function => "function",
            Self::Object => "object",
            Self::Property => "property",
            Self::Module => "module",
            Self::Quota => "quota",
            Self::Yaml => "yaml",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown resource kind name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownResourceKind(pub String);

impl fmt::Display for UnknownResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown resource kind: {}", self.0)
    }
}

impl std::error::Error for UnknownResourceKind {}

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "config" => Self::Config,
            "registry" => Self::Registry,
            "certificate" => Self::Certificate,
            "secret" => Self::Secret,
            "node" => Self::Node,
            "application" => Self::Application,
            "namespace" => Self::Namespace,
            "function" => Self::Function,
            "object" => Self::Object,
            "property" => Self::Property,
            "module" => Self::Module,
            "quota" => Self::Quota,
            "yaml" => Self::Yaml,
            other => return Err(UnknownResourceKind(other.to_string())),
        };
        Ok(kind)
    }
}

/// Successful result of a terminal handler.
///
/// The body is serialized as JSON by the pipeline. Handlers may attach
/// response headers; only whitelisted ones survive response caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// HTTP status code, 200 unless the handler chooses otherwise.
    pub status: u16,
    /// JSON response body.
    pub body: serde_json::Value,
    /// Extra response headers, lowercase names.
    pub headers: BTreeMap<String, String>,
}

impl Payload {
    /// A `200 OK` payload with the given JSON body.
    #[must_use]
    pub fn json(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            body,
            headers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }
}
