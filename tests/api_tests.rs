//! HTTP trigger layer driven through the router without a socket.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use distributor::api::{create_router, AppState};
use distributor::reconcile::Reconciler;
use distributor::store::{BatchSize, CatalogGraph, FailureKind, MemoryStore, Operation};

fn catalog() -> CatalogGraph {
    let mut graph = CatalogGraph::new();
    graph
        .add_business("B1")
        .add_offering("O1")
        .link("O1", "B1")
        .disallow("B2", "G1")
        .offer_product("O3", "P3")
        .classify("P3", "G2")
        .disallow("B3", "G1")
        .offer_product("O4", "P4")
        .classify("P4", "G1")
        .link("O4", "B3");
    graph
}

fn router(store: &Arc<MemoryStore>) -> Router {
    let reconciler = Reconciler::new(store.clone(), BatchSize::DEFAULT);
    create_router(AppState::new(reconciler))
}

async fn call(router: Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let store = Arc::new(MemoryStore::default());
    let (status, body) = call(router(&store), Method::GET, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_root_is_plain_text() {
    let store = Arc::new(MemoryStore::default());
    let (status, body) = call(router(&store), Method::GET, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_distribute_runs_all_phases() {
    let store = Arc::new(MemoryStore::new(catalog()));
    let (status, body) = call(router(&store), Method::POST, "/distribute").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let phases = body["report"]["phases"].as_array().unwrap();
    let names: Vec<&str> = phases.iter().map(|p| p["phase"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        ["cleanup-unconstrained", "fill-constrained", "trim-constrained"]
    );

    let graph = store.snapshot().await;
    assert!(!graph.has_link("O1", "B1"));
    assert!(graph.has_link("O3", "B2"));
    assert!(!graph.has_link("O4", "B3"));
}

#[tokio::test]
async fn test_named_endpoints_run_single_phase() {
    let store = Arc::new(MemoryStore::new(catalog()));

    let (status, body) = call(
        router(&store),
        Method::POST,
        "/clean-suppliers-without-constraints",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["phase"], "cleanup-unconstrained");
    assert_eq!(body["report"]["pairs_changed"], 1);
    // other phases untouched
    assert!(store.snapshot().await.has_link("O4", "B3"));

    let (_, body) = call(router(&store), Method::POST, "/add-suppliers").await;
    assert_eq!(body["report"]["phase"], "fill-constrained");
    assert!(store.snapshot().await.has_link("O3", "B2"));

    let (_, body) = call(router(&store), Method::POST, "/remove-suppliers").await;
    assert_eq!(body["report"]["phase"], "trim-constrained");
    assert!(!store.snapshot().await.has_link("O4", "B3"));
}

#[tokio::test]
async fn test_phase_by_name() {
    let store = Arc::new(MemoryStore::new(catalog()));
    let (status, body) = call(router(&store), Method::POST, "/phases/trim-constrained").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["rounds"], 1);
    assert!(!store.snapshot().await.has_link("O4", "B3"));
}

#[tokio::test]
async fn test_unknown_phase_is_not_found() {
    let store = Arc::new(MemoryStore::new(catalog()));
    let (status, body) = call(router(&store), Method::POST, "/phases/everything").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "404");
    assert!(store.mutations().await.is_empty());
}

#[tokio::test]
async fn test_store_failure_is_reported_with_phase() {
    let store = Arc::new(MemoryStore::new(catalog()));
    store
        .fail_after(Operation::Mutate, 0, FailureKind::Unavailable)
        .await;

    let (status, body) = call(router(&store), Method::POST, "/distribute").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "500");
    assert_eq!(body["phase"], "cleanup-unconstrained");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("cleanup-unconstrained"));
    assert!(store.snapshot().await.has_link("O1", "B1"));
}

#[tokio::test]
async fn test_status_is_read_only() {
    let store = Arc::new(MemoryStore::new(catalog()));
    let before = store.snapshot().await;

    let (status, body) = call(router(&store), Method::GET, "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["cleanup_unconstrained"], true);
    assert_eq!(body["report"]["fill_constrained"], true);
    assert_eq!(body["report"]["trim_constrained"], true);
    assert_eq!(store.snapshot().await, before);
}

#[tokio::test]
async fn test_trigger_requires_post() {
    let store = Arc::new(MemoryStore::new(catalog()));
    let (status, _) = call(router(&store), Method::GET, "/distribute").await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(store.mutations().await.is_empty());
}
