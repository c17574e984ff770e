//! Declarative route table of the admin API.
//!
//! Each [`RouteSpec`] names its operation id, resource kind and the gates
//! it needs. The pipeline composer turns a spec plus its registered handler
//! into a [`RouteService`](super::middleware::RouteService).

use gatehouse_core::ResourceKind;
use http::Method;

use crate::lock::LockScope;
use crate::service::config::RouteFeatures;
use crate::traits::ValidateAction;

/// Operation ids, the keys of the [`HandlerRegistry`](super::registry::HandlerRegistry).
pub mod operations {
    pub const CONFIGS_GET: &str = "configs.get";
    pub const CONFIGS_UPDATE: &str = "configs.update";
    pub const CONFIGS_DELETE: &str = "configs.delete";
    pub const CONFIGS_CREATE: &str = "configs.create";
    pub const CONFIGS_LIST: &str = "configs.list";
    pub const CONFIGS_APPS: &str = "configs.apps";

    pub const REGISTRIES_GET: &str = "registries.get";
    pub const REGISTRIES_UPDATE: &str = "registries.update";
    pub const REGISTRIES_REFRESH: &str = "registries.refresh";
    pub const REGISTRIES_DELETE: &str = "registries.delete";
    pub const REGISTRIES_CREATE: &str = "registries.create";
    pub const REGISTRIES_LIST: &str = "registries.list";
    pub const REGISTRIES_APPS: &str = "registries.apps";

    pub const CERTIFICATES_GET: &str = "certificates.get";
    pub const CERTIFICATES_UPDATE: &str = "certificates.update";
    pub const CERTIFICATES_DELETE: &str = "certificates.delete";
    pub const CERTIFICATES_CREATE: &str = "certificates.create";
    pub const CERTIFICATES_LIST: &str = "certificates.list";
    pub const CERTIFICATES_APPS: &str = "certificates.apps";

    pub const SECRETS_GET: &str = "secrets.get";
    pub const SECRETS_UPDATE: &str = "secrets.update";
    pub const SECRETS_DELETE: &str = "secrets.delete";
    pub const SECRETS_CREATE: &str = "secrets.create";
    pub const SECRETS_LIST: &str = "secrets.list";
    pub const SECRETS_APPS: &str = "secrets.apps";

    pub const NODES_GET: &str = "nodes.get";
    pub const NODES_BATCH_GET: &str = "nodes.batch_get";
    pub const NODES_APPS: &str = "nodes.apps";
    pub const NODES_FUNCTIONS: &str = "nodes.functions";
    pub const NODES_STATS: &str = "nodes.stats";
    pub const NODES_UPDATE: &str = "nodes.update";
    pub const NODES_DELETE: &str = "nodes.delete";
    pub const NODES_CREATE: &str = "nodes.create";
    pub const NODES_LIST: &str = "nodes.list";
    pub const NODES_DEPLOYS: &str = "nodes.deploys";
    pub const NODES_INIT: &str = "nodes.init";
    pub const NODES_UPDATE_MODE: &str = "nodes.update_mode";
    pub const NODES_UPDATE_PROPERTIES: &str = "nodes.update_properties";
    pub const NODES_GET_PROPERTIES: &str = "nodes.get_properties";
    pub const NODES_UPDATE_CORE_CONFIGS: &str = "nodes.update_core_configs";
    pub const NODES_GET_CORE_CONFIGS: &str = "nodes.get_core_configs";
    pub const NODES_CORE_VERSIONS: &str = "nodes.core_versions";

    pub const APPS_GET: &str = "apps.get";
    pub const APPS_CONFIGS: &str = "apps.configs";
    pub const APPS_SECRETS: &str = "apps.secrets";
    pub const APPS_CERTIFICATES: &str = "apps.certificates";
    pub const APPS_REGISTRIES: &str = "apps.registries";
    pub const APPS_UPDATE: &str = "apps.update";
    pub const APPS_DELETE: &str = "apps.delete";
    pub const APPS_CREATE: &str = "apps.create";
    pub const APPS_LIST: &str = "apps.list";

    pub const NAMESPACE_CREATE: &str = "namespace.create";
    pub const NAMESPACE_GET: &str = "namespace.get";
    pub const NAMESPACE_DELETE: &str = "namespace.delete";

    pub const FUNCTION_SOURCES: &str = "functions.sources";
    pub const FUNCTIONS_LIST: &str = "functions.list";
    pub const FUNCTION_VERSIONS: &str = "functions.versions";
    pub const FUNCTION_IMPORT: &str = "functions.import";

    pub const OBJECT_SOURCES: &str = "objects.sources";
    pub const OBJECT_BUCKETS: &str = "objects.buckets";
    pub const OBJECT_LIST: &str = "objects.list";
    pub const OBJECT_SOURCES_V2: &str = "objects.v2.sources";
    pub const OBJECT_BUCKETS_V2: &str = "objects.v2.buckets";
    pub const OBJECT_LIST_V2: &str = "objects.v2.list";
    pub const OBJECT_PATH_V2: &str = "objects.v2.path";
    pub const OBJECT_PUT_PATH_V2: &str = "objects.v2.put_path";

    pub const PROPERTIES_GET: &str = "properties.get";
    pub const SYSCONFIG_LATEST_VERSION: &str = "sysconfig.latest_version";
    pub const SYSCONFIG_FUNCTION_RUNTIMES: &str = "sysconfig.function_runtimes";

    pub const MODULES_LIST: &str = "modules.list";
    pub const MODULES_GET: &str = "modules.get";
    pub const MODULES_GET_VERSION: &str = "modules.get_version";
    pub const MODULES_LATEST: &str = "modules.latest";
    pub const MODULES_CREATE: &str = "modules.create";
    pub const MODULES_UPDATE_VERSION: &str = "modules.update_version";
    pub const MODULES_DELETE: &str = "modules.delete";
    pub const MODULES_DELETE_VERSION: &str = "modules.delete_version";

    pub const QUOTAS_GET: &str = "quotas.get";

    pub const YAML_CREATE: &str = "yaml.create";
    pub const YAML_UPDATE: &str = "yaml.update";
    pub const YAML_DELETE: &str = "yaml.delete";
}

/// One route and the gates wrapped around its handler.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub method: Method,
    /// axum path pattern, e.g. `/v1/nodes/{name}`.
    pub path: &'static str,
    pub operation: &'static str,
    pub kind: ResourceKind,
    pub auth: bool,
    pub cache: bool,
    pub lock: Option<LockScope>,
    pub quota: bool,
    pub validate: Option<ValidateAction>,
}

impl RouteSpec {
    /// An authenticated route with no other gates.
    #[must_use]
    pub fn new(
        method: Method,
        path: &'static str,
        operation: &'static str,
        kind: ResourceKind,
    ) -> Self {
        Self {
            method,
            path,
            operation,
            kind,
            auth: true,
            cache: false,
            lock: None,
            quota: false,
            validate: None,
        }
    }

    #[must_use]
    pub fn get(path: &'static str, operation: &'static str, kind: ResourceKind) -> Self {
        Self::new(Method::GET, path, operation, kind)
    }

    #[must_use]
    pub fn post(path: &'static str, operation: &'static str, kind: ResourceKind) -> Self {
        Self::new(Method::POST, path, operation, kind)
    }

    #[must_use]
    pub fn put(path: &'static str, operation: &'static str, kind: ResourceKind) -> Self {
        Self::new(Method::PUT, path, operation, kind)
    }

    #[must_use]
    pub fn delete(path: &'static str, operation: &'static str, kind: ResourceKind) -> Self {
        Self::new(Method::DELETE, path, operation, kind)
    }

    /// Serve from the response cache. Only meaningful on GET routes.
    #[must_use]
    pub fn cached(mut self) -> Self {
        self.cache = self.method == Method::GET;
        self
    }

    #[must_use]
    pub fn locked(mut self, scope: LockScope) -> Self {
        self.lock = Some(scope);
        self
    }

    #[must_use]
    pub fn with_quota(mut self) -> Self {
        self.quota = true;
        self
    }

    #[must_use]
    pub fn validated(mut self, action: ValidateAction) -> Self {
        self.validate = Some(action);
        self
    }

    #[must_use]
    pub fn public(mut self) -> Self {
        self.auth = false;
        self
    }
}

/// The full admin route table, filtered by plugin features.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn admin_routes(features: &RouteFeatures) -> Vec<RouteSpec> {
    use operations as op;
    use ResourceKind as K;
    use ValidateAction::{Create, Delete};

    let mut routes = vec![
        // configs
        RouteSpec::get("/v1/configs/{name}", op::CONFIGS_GET, K::Config)
            .cached(),
        RouteSpec::put("/v1/configs/{name}", op::CONFIGS_UPDATE, K::Config)
            .locked(LockScope::Resource),
        RouteSpec::delete("/v1/configs/{name}", op::CONFIGS_DELETE, K::Config)
            .validated(Delete),
        RouteSpec::post("/v1/configs", op::CONFIGS_CREATE, K::Config)
            .validated(Create),
        RouteSpec::get("/v1/configs", op::CONFIGS_LIST, K::Config)
            .cached(),
        RouteSpec::get("/v1/configs/{name}/apps", op::CONFIGS_APPS, K::Config),
        // registries
        RouteSpec::get("/v1/registries/{name}", op::REGISTRIES_GET, K::Registry),
        RouteSpec::put("/v1/registries/{name}", op::REGISTRIES_UPDATE, K::Registry),
        RouteSpec::post(
            "/v1/registries/{name}/refresh",
            op::REGISTRIES_REFRESH,
            K::Registry,
        ),
        RouteSpec::delete("/v1/registries/{name}", op::REGISTRIES_DELETE, K::Registry)
            .validated(Delete),
        RouteSpec::post("/v1/registries", op::REGISTRIES_CREATE, K::Registry)
            .validated(Create),
        RouteSpec::get("/v1/registries", op::REGISTRIES_LIST, K::Registry)
            .cached(),
        RouteSpec::get(
            "/v1/registries/{name}/apps",
            op::REGISTRIES_APPS,
            K::Registry,
        ),
        // certificates
        RouteSpec::get(
            "/v1/certificates/{name}",
            op::CERTIFICATES_GET,
            K::Certificate,
        ),
        RouteSpec::put(
            "/v1/certificates/{name}",
            op::CERTIFICATES_UPDATE,
            K::Certificate,
        )
        .locked(LockScope::Resource),
        RouteSpec::delete(
            "/v1/certificates/{name}",
            op::CERTIFICATES_DELETE,
            K::Certificate,
        )
        .validated(Delete),
        RouteSpec::post("/v1/certificates", op::CERTIFICATES_CREATE, K::Certificate)
            .validated(Create),
        RouteSpec::get("/v1/certificates", op::CERTIFICATES_LIST, K::Certificate)
            .cached(),
        RouteSpec::get(
            "/v1/certificates/{name}/apps",
            op::CERTIFICATES_APPS,
            K::Certificate,
        ),
        // secrets
        RouteSpec::get("/v1/secrets/{name}", op::SECRETS_GET, K::Secret),
        RouteSpec::put("/v1/secrets/{name}", op::SECRETS_UPDATE, K::Secret),
        RouteSpec::delete("/v1/secrets/{name}", op::SECRETS_DELETE, K::Secret)
            .validated(Delete),
        RouteSpec::post("/v1/secrets", op::SECRETS_CREATE, K::Secret)
            .validated(Create),
        RouteSpec::get("/v1/secrets", op::SECRETS_LIST, K::Secret)
            .cached(),
        RouteSpec::get("/v1/secrets/{name}/apps", op::SECRETS_APPS, K::Secret),
        // nodes
        RouteSpec::get("/v1/nodes/{name}", op::NODES_GET, K::Node)
            .cached(),
        RouteSpec::put("/v1/nodes", op::NODES_BATCH_GET, K::Node),
        RouteSpec::get("/v1/nodes/{name}/apps", op::NODES_APPS, K::Node)
            .cached(),
        RouteSpec::get("/v1/nodes/{name}/functions", op::NODES_FUNCTIONS, K::Node),
        RouteSpec::get("/v1/nodes/{name}/stats", op::NODES_STATS, K::Node)
            .cached(),
        RouteSpec::put("/v1/nodes/{name}", op::NODES_UPDATE, K::Node)
            .locked(LockScope::Resource),
        RouteSpec::delete("/v1/nodes/{name}", op::NODES_DELETE, K::Node),
        // Kind-wide lock: concurrent creates must not both pass the quota check.
        RouteSpec::post("/v1/nodes", op::NODES_CREATE, K::Node)
            .locked(LockScope::Kind)
            .with_quota(),
        RouteSpec::get("/v1/nodes", op::NODES_LIST, K::Node)
            .cached(),
        RouteSpec::get("/v1/nodes/{name}/deploys", op::NODES_DEPLOYS, K::Node)
            .cached(),
        RouteSpec::get("/v1/nodes/{name}/init", op::NODES_INIT, K::Node)
            .cached(),
        RouteSpec::put("/v1/nodes/{name}/mode", op::NODES_UPDATE_MODE, K::Node),
        RouteSpec::put(
            "/v1/nodes/{name}/properties",
            op::NODES_UPDATE_PROPERTIES,
            K::Node,
        ),
        RouteSpec::get(
            "/v1/nodes/{name}/properties",
            op::NODES_GET_PROPERTIES,
            K::Node,
        )
        .cached(),
        RouteSpec::put(
            "/v1/nodes/{name}/core/configs",
            op::NODES_UPDATE_CORE_CONFIGS,
            K::Node,
        ),
        RouteSpec::get(
            "/v1/nodes/{name}/core/configs",
            op::NODES_GET_CORE_CONFIGS,
            K::Node,
        )
        .cached(),
        RouteSpec::get(
            "/v1/nodes/{name}/core/versions",
            op::NODES_CORE_VERSIONS,
            K::Node,
        )
        .cached(),
        // apps
        RouteSpec::get("/v1/apps/{name}", op::APPS_GET, K::Application)
            .cached(),
        RouteSpec::get("/v1/apps/{name}/configs", op::APPS_CONFIGS, K::Application)
            .cached(),
        RouteSpec::get("/v1/apps/{name}/secrets", op::APPS_SECRETS, K::Application)
            .cached(),
        RouteSpec::get(
            "/v1/apps/{name}/certificates",
            op::APPS_CERTIFICATES,
            K::Application,
        )
        .cached(),
        RouteSpec::get(
            "/v1/apps/{name}/registries",
            op::APPS_REGISTRIES,
            K::Application,
        )
        .cached(),
        RouteSpec::put("/v1/apps/{name}", op::APPS_UPDATE, K::Application)
            .locked(LockScope::Resource),
        RouteSpec::delete("/v1/apps/{name}", op::APPS_DELETE, K::Application)
            .validated(Delete),
        RouteSpec::post("/v1/apps", op::APPS_CREATE, K::Application)
            .validated(Create)
            .locked(LockScope::Resource),
        RouteSpec::get("/v1/apps", op::APPS_LIST, K::Application)
            .cached(),
        // namespace
        RouteSpec::post("/v1/namespace", op::NAMESPACE_CREATE, K::Namespace),
        RouteSpec::get("/v1/namespace", op::NAMESPACE_GET, K::Namespace)
            .cached(),
        RouteSpec::delete("/v1/namespace", op::NAMESPACE_DELETE, K::Namespace),
        // functions
        RouteSpec::get("/v1/functions", op::FUNCTION_SOURCES, K::Function),
        // objects (deprecated v1 surface)
        RouteSpec::get("/v1/objects", op::OBJECT_SOURCES, K::Object),
        // properties and sysconfig
        RouteSpec::get("/v1/properties/{name}", op::PROPERTIES_GET, K::Property),
        RouteSpec::get(
            "/v1/sysconfig/baetyl_version/latest",
            op::SYSCONFIG_LATEST_VERSION,
            K::Property,
        ),
        RouteSpec::get(
            "/v1/sysconfig/baetyl-function-runtime",
            op::SYSCONFIG_FUNCTION_RUNTIMES,
            K::Property,
        ),
        // modules
        RouteSpec::get("/v1/modules", op::MODULES_LIST, K::Module)
            .cached(),
        RouteSpec::get("/v1/modules/{name}", op::MODULES_GET, K::Module)
            .cached(),
        RouteSpec::get(
            "/v1/modules/{name}/version/{version}",
            op::MODULES_GET_VERSION,
            K::Module,
        )
        .cached(),
        RouteSpec::get("/v1/modules/{name}/latest", op::MODULES_LATEST, K::Module)
            .cached(),
        RouteSpec::post("/v1/modules", op::MODULES_CREATE, K::Module),
        RouteSpec::put(
            "/v1/modules/{name}/version/{version}",
            op::MODULES_UPDATE_VERSION,
            K::Module,
        ),
        RouteSpec::delete("/v1/modules/{name}", op::MODULES_DELETE, K::Module),
        RouteSpec::delete(
            "/v1/modules/{name}/version/{version}",
            op::MODULES_DELETE_VERSION,
            K::Module,
        ),
        // quotas
        RouteSpec::get("/v1/quotas", op::QUOTAS_GET, K::Quota)
            .cached(),
        // yaml manifests
        RouteSpec::post("/v1/yaml", op::YAML_CREATE, K::Yaml),
        RouteSpec::put("/v1/yaml", op::YAML_UPDATE, K::Yaml),
        RouteSpec::post("/v1/yaml/delete", op::YAML_DELETE, K::Yaml),
        // v2 objects
        RouteSpec::get("/v2/objects", op::OBJECT_SOURCES_V2, K::Object)
            .cached(),
    ];

    if features.functions {
        routes.extend([
            RouteSpec::get(
                "/v1/functions/{source}/functions",
                op::FUNCTIONS_LIST,
                K::Function,
            ),
            RouteSpec::get(
                "/v1/functions/{source}/functions/{name}/versions",
                op::FUNCTION_VERSIONS,
                K::Function,
            ),
            RouteSpec::post(
                "/v1/functions/{source}/functions/{name}/versions/{version}",
                op::FUNCTION_IMPORT,
                K::Function,
            ),
        ]);
    }

    if features.objects {
        routes.extend([
            RouteSpec::get(
                "/v1/objects/{source}/buckets",
                op::OBJECT_BUCKETS,
                K::Object,
            ),
            RouteSpec::get(
                "/v1/objects/{source}/buckets/{bucket}/objects",
                op::OBJECT_LIST,
                K::Object,
            ),
            RouteSpec::get(
                "/v2/objects/{source}/buckets",
                op::OBJECT_BUCKETS_V2,
                K::Object,
            ),
            RouteSpec::get(
                "/v2/objects/{source}/buckets/{bucket}/objects",
                op::OBJECT_LIST_V2,
                K::Object,
            ),
            RouteSpec::get(
                "/v2/objects/{source}/buckets/{bucket}/object",
                op::OBJECT_PATH_V2,
                K::Object,
            ),
            RouteSpec::get(
                "/v2/objects/{source}/buckets/{bucket}/object/put",
                op::OBJECT_PUT_PATH_V2,
                K::Object,
            ),
        ]);
    }

    routes
}
