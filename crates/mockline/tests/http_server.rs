//! End-to-end tests through the real hyper server.

use mockline::admin_api::{HttpServer, ServerState};
use mockline::predicate::{PatternCompiler, RegexCache};
use mockline::store::InMemoryStubStore;
use mockline::{MatchIndex, SyncCoordinator};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

async fn spawn_server() -> (String, Arc<SyncCoordinator>) {
    let index = Arc::new(MatchIndex::new(PatternCompiler::new(Arc::new(
        RegexCache::new(),
    ))));
    let coordinator = Arc::new(SyncCoordinator::new(
        Arc::new(InMemoryStubStore::new()),
        index,
    ));
    coordinator.start().unwrap();

    let state = Arc::new(ServerState::new(Arc::clone(&coordinator)));
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = HttpServer::bind(addr, state).await.unwrap();
    let base = format!("http://{}", server.local_addr().unwrap());
    tokio::spawn(server.run());
    (base, coordinator)
}

async fn create(client: &reqwest::Client, base: &str, stub: Value) -> Value {
    let resp = client
        .post(format!("{base}/admin/stubs"))
        .json(&stub)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn test_create_then_serve() {
    let (base, _c) = spawn_server().await;
    let client = reqwest::Client::new();

    let created = create(
        &client,
        &base,
        json!({
            "name": "list users",
            "method": "GET",
            "url": "/api/users",
            "responseDefinition": {"users": ["alice"]}
        }),
    )
    .await;
    assert!(created["id"].is_number());
    assert!(created["uuid"].is_string());

    let resp = client
        .get(format!("{base}/api/users?page=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json;charset=UTF-8"
    );
    assert_eq!(
        resp.headers().get("x-mockline-stub").unwrap().to_str().unwrap(),
        created["uuid"].as_str().unwrap()
    );
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"users": ["alice"]}));
}

#[tokio::test]
async fn test_no_match_is_structured_404() {
    let (base, _c) = spawn_server().await;
    let resp = reqwest::get(format!("{base}/unknown/path")).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "No matching stub");
    assert_eq!(body["path"], "/unknown/path");
    assert_eq!(body["method"], "GET");
}

#[tokio::test]
async fn test_body_and_header_predicates() {
    let (base, _c) = spawn_server().await;
    let client = reqwest::Client::new();

    create(
        &client,
        &base,
        json!({
            "name": "errors",
            "method": "POST",
            "url": "/logs",
            "priority": 1,
            "requestHeadersPattern": {"X-Source": {"equalTo": "app"}},
            "requestBodyPattern": "{\"contains\": \"ERROR\"}",
            "responseDefinition": "{\"kind\": \"error\"}"
        }),
    )
    .await;
    create(
        &client,
        &base,
        json!({
            "name": "fallback",
            "method": "ANY",
            "url": "/logs",
            "priority": 5,
            "responseDefinition": "{\"kind\": \"other\"}"
        }),
    )
    .await;

    let resp = client
        .post(format!("{base}/logs"))
        .header("x-source", "app")
        .body("ERROR: failed")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "error");

    let resp = client
        .post(format!("{base}/logs"))
        .header("x-source", "app")
        .body("INFO: ok")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "other");

    let resp = client.delete(format!("{base}/logs")).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "other");
}

#[tokio::test]
async fn test_toggle_update_delete() {
    let (base, _c) = spawn_server().await;
    let client = reqwest::Client::new();

    let created = create(
        &client,
        &base,
        json!({
            "name": "user",
            "method": "GET",
            "url": "/api/users/{id}",
            "urlMatchType": "PATH_TEMPLATE",
            "responseDefinition": "{\"id\": 1}"
        }),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    assert_eq!(
        reqwest::get(format!("{base}/api/users/42")).await.unwrap().status(),
        200
    );

    let toggled: Value = client
        .post(format!("{base}/admin/stubs/{id}/toggle"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(toggled["enabled"], false);
    assert_eq!(
        reqwest::get(format!("{base}/api/users/42")).await.unwrap().status(),
        404
    );

    let updated = client
        .put(format!("{base}/admin/stubs/{id}"))
        .json(&json!({
            "name": "user v2",
            "method": "GET",
            "url": "/api/v2/users/{id}",
            "urlMatchType": "PATH_TEMPLATE",
            "responseDefinition": "{\"id\": 2}"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), 200);
    let updated: Value = updated.json().await.unwrap();
    assert_eq!(updated["uuid"], created["uuid"]);
    assert_eq!(
        reqwest::get(format!("{base}/api/v2/users/7")).await.unwrap().status(),
        200
    );

    let resp = client
        .delete(format!("{base}/admin/stubs/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(
        reqwest::get(format!("{base}/api/v2/users/7")).await.unwrap().status(),
        404
    );

    let resp = reqwest::get(format!("{base}/admin/stubs/{id}")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_validation_error_is_400() {
    let (base, _c) = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/admin/stubs"))
        .json(&json!({"name": "", "method": "GET", "url": "/x", "responseDefinition": "{}"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["errors"][0]["code"], "400");

    let resp = client
        .post(format!("{base}/admin/stubs"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_batch_search_and_statistics() {
    let (base, _c) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/admin/stubs/batch"))
        .json(&json!([
            {"name": "Orders list", "method": "GET", "url": "/orders", "responseDefinition": "[]"},
            {"name": "Orders dup", "method": "GET", "url": "/orders", "responseDefinition": "[]"},
            {"name": "Payments", "method": "POST", "url": "/payments", "enabled": false, "responseDefinition": "{}"}
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(created.len(), 2);

    let found: Vec<Value> = reqwest::get(format!("{base}/admin/stubs/search?keyword=orders"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], "Orders list");

    let stats: Value = reqwest::get(format!("{base}/admin/stubs/statistics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        stats,
        json!({"totalStubs": 2, "enabledStubs": 1, "disabledStubs": 1})
    );

    let all: Vec<Value> = reqwest::get(format!("{base}/admin/stubs"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let reload: Value = client
        .post(format!("{base}/admin/stubs/reload"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reload["activeStubs"], 1);
}

#[tokio::test]
async fn test_health_endpoints() {
    let (base, coordinator) = spawn_server().await;

    let health: Value = reqwest::get(format!("{base}/admin/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "UP");
    assert_eq!(health["running"], true);

    let ping = reqwest::get(format!("{base}/admin/health/ping"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(ping, "pong");

    let metrics = reqwest::get(format!("{base}/admin/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("mockline_"));

    coordinator.stop();
    let resp = reqwest::get(format!("{base}/anything")).await.unwrap();
    assert_eq!(resp.status(), 503);
    let resp = reqwest::Client::new()
        .post(format!("{base}/admin/stubs"))
        .json(&json!({"name": "x", "method": "GET", "url": "/x", "responseDefinition": "{}"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn test_unknown_admin_routes() {
    let (base, _c) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = reqwest::get(format!("{base}/admin/nothing")).await.unwrap();
    assert_eq!(resp.status(), 404);

    let resp = reqwest::get(format!("{base}/admin/stubs/abc")).await.unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .patch(format!("{base}/admin/stubs"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);
}
