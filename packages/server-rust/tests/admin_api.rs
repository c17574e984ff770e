//! End-to-end tests of the admin router: HTTP in, envelope out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use gatehouse_core::{ManualClock, Payload, ResourceKind, TenantIdentity};
use gatehouse_server::auth::StaticTokenAuthenticator;
use gatehouse_server::lock::LockPolicy;
use gatehouse_server::service::handler_fn;
use gatehouse_server::service::operations as op;
use gatehouse_server::{
    AdminServer, CollectorRegistry, HandlerRegistry, InMemoryCacheStore, InMemoryLockService,
    NetworkConfig, PipelineConfig, PipelineDeps, QuotaCollector, QuotaService,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Semaphore};
use tower::ServiceExt;

struct Harness {
    router: Router,
    clock: Arc<ManualClock>,
    cache: Arc<InMemoryCacheStore>,
    locks: Arc<InMemoryLockService>,
}

fn harness(
    pipeline: PipelineConfig,
    handlers: HandlerRegistry,
    collectors: CollectorRegistry,
) -> Harness {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let cache = Arc::new(InMemoryCacheStore::with_clock(clock.clone()));
    let locks = Arc::new(InMemoryLockService::with_clock(
        pipeline.lock.lease_ttl(),
        clock.clone(),
    ));
    let authenticator = StaticTokenAuthenticator::new()
        .with_token("token-a", TenantIdentity::new("tenant-a"))
        .with_token("token-b", TenantIdentity::new("tenant-b"));
    let quota = QuotaService::from_config(&pipeline.quota, collectors);
    let deps = PipelineDeps::new(
        Arc::new(authenticator),
        handlers,
        cache.clone(),
        locks.clone(),
        Arc::new(quota),
    )
    .with_clock(clock.clone());
    let router = AdminServer::new(NetworkConfig::default(), pipeline, deps).build_router();
    Harness {
        router,
        clock,
        cache,
        locks,
    }
}

fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get_json(router: &Router, uri: &str, token: &str) -> Value {
    json_body(send(router, request("GET", uri, Some(token))).await).await
}

/// Starts `PUT /v1/apps/web`, ready to be spawned.
fn put_app(
    router: &Router,
    token: &str,
) -> impl std::future::Future<Output = Result<Response, std::convert::Infallible>> {
    router
        .clone()
        .oneshot(request("PUT", "/v1/apps/web", Some(token)))
}

/// Handler that echoes the tenant and counts its calls.
fn counting(calls: &Arc<AtomicUsize>) -> Arc<dyn gatehouse_server::ResourceHandler> {
    let calls = Arc::clone(calls);
    handler_fn(move |request| {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            Ok(Payload::json(json!({
                "namespace": request.ctx.namespace(),
                "call": call,
            })))
        }
    })
}

struct FixedCount(u64);

#[async_trait]
impl QuotaCollector for FixedCount {
    async fn count(&self, _namespace: &str) -> anyhow::Result<u64> {
        Ok(self.0)
    }
}

fn cached_pipeline() -> PipelineConfig {
    let mut pipeline = PipelineConfig::default();
    pipeline.cache.enabled = true;
    pipeline
}

// ---------------------------------------------------------------------------
// Response cache
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cached_read_served_within_ttl_and_refetched_after() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handlers = HandlerRegistry::new().with(op::CONFIGS_GET, counting(&calls));
    let h = harness(cached_pipeline(), handlers, CollectorRegistry::new());

    let first = get_json(&h.router, "/v1/configs/db", "token-a").await;
    h.clock.advance(Duration::from_millis(1_500));
    let second = get_json(&h.router, "/v1/configs/db", "token-a").await;
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.cache.len(), 1);

    h.clock.advance(Duration::from_secs(3));
    let third = get_json(&h.router, "/v1/configs/db", "token-a").await;
    assert_eq!(third["call"], 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cache_entries_are_isolated_per_tenant() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handlers = HandlerRegistry::new().with(op::CONFIGS_GET, counting(&calls));
    let h = harness(cached_pipeline(), handlers, CollectorRegistry::new());

    let a = get_json(&h.router, "/v1/configs/db", "token-a").await;
    let b = get_json(&h.router, "/v1/configs/db", "token-b").await;
    assert_eq!(a["namespace"], "tenant-a");
    assert_eq!(b["namespace"], "tenant-b");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.cache.len(), 2);
}

#[tokio::test]
async fn query_order_does_not_split_the_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handlers = HandlerRegistry::new().with(op::CONFIGS_LIST, counting(&calls));
    let h = harness(cached_pipeline(), handlers, CollectorRegistry::new());

    send(&h.router, request("GET", "/v1/configs?a=1&b=2", Some("token-a"))).await;
    send(&h.router, request("GET", "/v1/configs?b=2&a=1", Some("token-a"))).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disabled_cache_always_calls_the_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handlers = HandlerRegistry::new().with(op::CONFIGS_GET, counting(&calls));
    let h = harness(PipelineConfig::default(), handlers, CollectorRegistry::new());

    send(&h.router, request("GET", "/v1/configs/db", Some("token-a"))).await;
    send(&h.router, request("GET", "/v1/configs/db", Some("token-a"))).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(h.cache.is_empty());
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unauthenticated_requests_touch_nothing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handlers = HandlerRegistry::new()
        .with(op::CONFIGS_GET, counting(&calls))
        .with(op::APPS_UPDATE, counting(&calls));
    let h = harness(cached_pipeline(), handlers, CollectorRegistry::new());

    let missing = send(&h.router, request("GET", "/v1/configs/db", None)).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(missing).await["code"], "AccessDenied");

    let wrong = send(&h.router, request("PUT", "/v1/apps/web", Some("token-z"))).await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(h.cache.is_empty());
    assert!(h.locks.is_empty());
}

// ---------------------------------------------------------------------------
// Quota
// ---------------------------------------------------------------------------

fn quota_pipeline(limit: u64) -> PipelineConfig {
    let mut pipeline = PipelineConfig::default();
    pipeline.quota.default_limits.insert(ResourceKind::Node, limit);
    pipeline
}

#[tokio::test]
async fn node_creation_rejected_at_the_limit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handlers = HandlerRegistry::new().with(op::NODES_CREATE, counting(&calls));
    let collectors = CollectorRegistry::new();
    collectors.register(ResourceKind::Node, Arc::new(FixedCount(10)));
    let h = harness(quota_pipeline(10), handlers, collectors);

    let response = send(&h.router, request("POST", "/v1/nodes", Some("token-a"))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["code"], "QuotaExceeded");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // The kind lock was taken around the check and handed back.
    assert!(h.locks.is_empty());
}

#[tokio::test]
async fn node_creation_admitted_below_the_limit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handlers = HandlerRegistry::new().with(op::NODES_CREATE, counting(&calls));
    let collectors = CollectorRegistry::new();
    collectors.register(ResourceKind::Node, Arc::new(FixedCount(9)));
    let h = harness(quota_pipeline(10), handlers, collectors);

    let response = send(&h.router, request("POST", "/v1/nodes", Some("token-a"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn limited_kind_without_collector_fails_closed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handlers = HandlerRegistry::new().with(op::NODES_CREATE, counting(&calls));
    let h = harness(quota_pipeline(10), handlers, CollectorRegistry::new());

    let response = send(&h.router, request("POST", "/v1/nodes", Some("token-a"))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Node table shared by the create handler and the quota collector.
#[derive(Clone, Default)]
struct NodeTable(Arc<std::sync::Mutex<Vec<String>>>);

impl NodeTable {
    fn created_in(&self, namespace: &str) -> u64 {
        let nodes = self.0.lock().unwrap();
        nodes.iter().filter(|ns| ns.as_str() == namespace).count() as u64
    }
}

#[async_trait]
impl QuotaCollector for NodeTable {
    async fn count(&self, namespace: &str) -> anyhow::Result<u64> {
        Ok(self.created_in(namespace))
    }
}

fn node_creator(table: &NodeTable) -> Arc<dyn gatehouse_server::ResourceHandler> {
    let table = table.clone();
    handler_fn(move |request| {
        let table = table.clone();
        async move {
            let namespace = request.ctx.namespace().unwrap_or_default().to_string();
            // Yield between count and insert so racing creates would interleave.
            tokio::task::yield_now().await;
            table.0.lock().unwrap().push(namespace);
            Ok(Payload::json(json!({ "created": true })).with_status(201))
        }
    })
}

#[tokio::test]
async fn concurrent_creates_stop_exactly_at_the_limit() {
    const LIMIT: u64 = 3;
    let table = NodeTable::default();
    let handlers = HandlerRegistry::new().with(op::NODES_CREATE, node_creator(&table));
    let collectors = CollectorRegistry::new();
    collectors.register(ResourceKind::Node, Arc::new(table.clone()));
    let h = harness(quota_pipeline(LIMIT), handlers, collectors);

    let attempts = (0..=LIMIT).map(|_| {
        let router = h.router.clone();
        tokio::spawn(async move {
            router
                .oneshot(request("POST", "/v1/nodes", Some("token-a")))
                .await
                .unwrap()
        })
    });
    let mut created = 0;
    let mut rejected = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        let response = attempt.await.unwrap();
        match response.status() {
            StatusCode::CREATED => created += 1,
            StatusCode::FORBIDDEN => {
                assert_eq!(json_body(response).await["code"], "QuotaExceeded");
                rejected += 1;
            }
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(created, LIMIT);
    assert_eq!(rejected, 1);
    assert_eq!(table.created_in("tenant-a"), LIMIT);

    // Another tenant still has its own budget.
    let other = send(&h.router, request("POST", "/v1/nodes", Some("token-b"))).await;
    assert_eq!(other.status(), StatusCode::CREATED);
    assert_eq!(table.created_in("tenant-a"), LIMIT);
}

// ---------------------------------------------------------------------------
// Locking
// ---------------------------------------------------------------------------

/// Handler that reports entry, then blocks until the test hands out a permit.
fn gated(
    entered: mpsc::UnboundedSender<()>,
    gate: Arc<Semaphore>,
) -> Arc<dyn gatehouse_server::ResourceHandler> {
    handler_fn(move |_request| {
        let entered = entered.clone();
        let gate = Arc::clone(&gate);
        async move {
            let _ = entered.send(());
            let _permit = gate.acquire().await;
            Ok(Payload::json(json!({ "updated": true })))
        }
    })
}

fn lock_pipeline(policy: LockPolicy) -> PipelineConfig {
    let mut pipeline = PipelineConfig::default();
    pipeline.lock.policy = policy;
    pipeline.lock.retry_interval_ms = 10;
    pipeline
}

#[tokio::test]
async fn fail_fast_rejects_concurrent_update_of_the_same_resource() {
    let (entered_tx, mut entered) = mpsc::unbounded_channel();
    let gate = Arc::new(Semaphore::new(0));
    let handlers = HandlerRegistry::new().with(op::APPS_UPDATE, gated(entered_tx, gate.clone()));
    let h = harness(lock_pipeline(LockPolicy::FailFast), handlers, CollectorRegistry::new());

    let first = tokio::spawn(put_app(&h.router, "token-a"));
    entered.recv().await.unwrap();

    let second = send(&h.router, request("PUT", "/v1/apps/web", Some("token-a"))).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(second).await["code"], "LockConflict");

    // Another tenant's resource of the same name is a different lock.
    gate.add_permits(1);
    let other = send(&h.router, request("PUT", "/v1/apps/web", Some("token-b"))).await;
    assert_eq!(other.status(), StatusCode::OK);

    gate.add_permits(1);
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert!(h.locks.is_empty());
}

#[tokio::test]
async fn wait_policy_serializes_concurrent_updates() {
    let (entered_tx, mut entered) = mpsc::unbounded_channel();
    let gate = Arc::new(Semaphore::new(0));
    let handlers = HandlerRegistry::new().with(op::APPS_UPDATE, gated(entered_tx, gate.clone()));
    let h = harness(lock_pipeline(LockPolicy::Wait), handlers, CollectorRegistry::new());

    let first = tokio::spawn(put_app(&h.router, "token-a"));
    entered.recv().await.unwrap();
    let second = tokio::spawn(put_app(&h.router, "token-a"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(entered.try_recv().is_err(), "second handler ran while the lease was held");

    gate.add_permits(2);
    assert_eq!(first.await.unwrap().unwrap().status(), StatusCode::OK);
    assert_eq!(second.await.unwrap().unwrap().status(), StatusCode::OK);
    assert!(entered.try_recv().is_ok());
}

#[tokio::test]
async fn handler_panic_reports_internal_and_frees_the_lease() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handler = handler_fn(move |_request| {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            assert!(call > 0, "handler exploded");
            Ok(Payload::json(json!({ "updated": true })))
        }
    });
    let handlers = HandlerRegistry::new().with(op::APPS_UPDATE, handler);
    let h = harness(lock_pipeline(LockPolicy::FailFast), handlers, CollectorRegistry::new());

    let response = send(&h.router, request("PUT", "/v1/apps/web", Some("token-a"))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["code"], "Internal");

    // The release is spawned from the guard's drop.
    for _ in 0..100 {
        if h.locks.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(h.locks.is_empty());

    let retry = send(&h.router, request("PUT", "/v1/apps/web", Some("token-a"))).await;
    assert_eq!(retry.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Routing and transport
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_is_public() {
    let h = harness(PipelineConfig::default(), HandlerRegistry::new(), CollectorRegistry::new());
    let response = send(&h.router, request("GET", "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["state"], "starting");
}

#[tokio::test]
async fn unknown_and_unregistered_routes_are_not_found() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handlers = HandlerRegistry::new().with(op::CONFIGS_GET, counting(&calls));
    let h = harness(PipelineConfig::default(), handlers, CollectorRegistry::new());

    let unknown = send(&h.router, request("GET", "/v1/nothing", Some("token-a"))).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(unknown).await["code"], "NotFound");

    let unregistered = send(&h.router, request("GET", "/v1/secrets", Some("token-a"))).await;
    assert_eq!(unregistered.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_method_on_known_path_is_method_not_allowed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handlers = HandlerRegistry::new().with(op::CONFIGS_GET, counting(&calls));
    let h = harness(PipelineConfig::default(), handlers, CollectorRegistry::new());

    let response = send(&h.router, request("PATCH", "/v1/configs/db", Some("token-a"))).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json_body(response).await["code"], "MethodNotAllowed");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn client_request_id_is_echoed_in_header_and_envelope() {
    let h = harness(PipelineConfig::default(), HandlerRegistry::new(), CollectorRegistry::new());
    let request = Request::builder()
        .uri("/v1/nothing")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();

    let response = send(&h.router, request).await;
    assert_eq!(response.headers()["x-request-id"], "req-123");
    assert_eq!(json_body(response).await["requestId"], "req-123");
}

#[tokio::test]
async fn generated_request_id_matches_the_envelope() {
    let h = harness(PipelineConfig::default(), HandlerRegistry::new(), CollectorRegistry::new());
    let response = send(&h.router, request("GET", "/v1/nothing", None)).await;
    let header = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(!header.is_empty());
    assert_eq!(json_body(response).await["requestId"], header.as_str());
}
