//! Stub management handlers.

use crate::admin_api::types::{
    collect_body, engine_error_response, error_response, json_response, query_param,
    run_blocking, ReloadResponse,
};
use crate::coordinator::SyncCoordinator;
use crate::stub::StubRule;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

async fn read_json<T: DeserializeOwned>(
    req: Request<Incoming>,
) -> Result<T, Response<Full<Bytes>>> {
    let body = collect_body(req)
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, &e))?;
    serde_json::from_slice(&body).map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, &format!("Invalid stub JSON: {e}"))
    })
}

/// GET /admin/stubs - List all stubs
pub fn handle_list(coordinator: Arc<SyncCoordinator>) -> Response<Full<Bytes>> {
    match coordinator.list() {
        Ok(stubs) => json_response(StatusCode::OK, &stubs),
        Err(e) => engine_error_response(&e),
    }
}

/// POST /admin/stubs - Create a stub
pub async fn handle_create(
    req: Request<Incoming>,
    coordinator: Arc<SyncCoordinator>,
) -> Response<Full<Bytes>> {
    let rule: StubRule = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    run_blocking(move || match coordinator.create(rule) {
        Ok(saved) => json_response(StatusCode::CREATED, &saved),
        Err(e) => engine_error_response(&e),
    })
    .await
}

/// POST /admin/stubs/batch - Create several stubs, skipping duplicates
pub async fn handle_create_batch(
    req: Request<Incoming>,
    coordinator: Arc<SyncCoordinator>,
) -> Response<Full<Bytes>> {
    let rules: Vec<StubRule> = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    run_blocking(move || match coordinator.create_batch(rules) {
        Ok(created) => json_response(StatusCode::CREATED, &created),
        Err(e) => engine_error_response(&e),
    })
    .await
}

/// GET /admin/stubs/:id
pub fn handle_get(id: i64, coordinator: Arc<SyncCoordinator>) -> Response<Full<Bytes>> {
    match coordinator.get(id) {
        Ok(stub) => json_response(StatusCode::OK, &stub),
        Err(e) => engine_error_response(&e),
    }
}

/// PUT /admin/stubs/:id
pub async fn handle_update(
    id: i64,
    req: Request<Incoming>,
    coordinator: Arc<SyncCoordinator>,
) -> Response<Full<Bytes>> {
    let rule: StubRule = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    run_blocking(move || match coordinator.update(id, rule) {
        Ok(saved) => json_response(StatusCode::OK, &saved),
        Err(e) => engine_error_response(&e),
    })
    .await
}

/// DELETE /admin/stubs/:id
pub fn handle_delete(id: i64, coordinator: Arc<SyncCoordinator>) -> Response<Full<Bytes>> {
    match coordinator.delete(id) {
        Ok(()) => Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(Full::new(Bytes::new()))
            .unwrap_or_else(|_| Response::new(Full::new(Bytes::new()))),
        Err(e) => engine_error_response(&e),
    }
}

/// POST /admin/stubs/:id/toggle
pub fn handle_toggle(id: i64, coordinator: Arc<SyncCoordinator>) -> Response<Full<Bytes>> {
    match coordinator.toggle(id) {
        Ok(stub) => json_response(StatusCode::OK, &stub),
        Err(e) => engine_error_response(&e),
    }
}

/// GET /admin/stubs/search?keyword=
pub fn handle_search(
    query: Option<&str>,
    coordinator: Arc<SyncCoordinator>,
) -> Response<Full<Bytes>> {
    let keyword = query_param(query, "keyword").unwrap_or_default();
    match coordinator.search(&keyword) {
        Ok(stubs) => json_response(StatusCode::OK, &stubs),
        Err(e) => engine_error_response(&e),
    }
}

/// GET /admin/stubs/statistics
pub fn handle_statistics(coordinator: Arc<SyncCoordinator>) -> Response<Full<Bytes>> {
    match coordinator.statistics() {
        Ok(stats) => json_response(StatusCode::OK, &stats),
        Err(e) => engine_error_response(&e),
    }
}

/// POST /admin/stubs/reload - Rebuild the match index from storage
pub fn handle_reload(coordinator: Arc<SyncCoordinator>) -> Response<Full<Bytes>> {
    match coordinator.reload_all() {
        Ok(active_stubs) => json_response(StatusCode::OK, &ReloadResponse { active_stubs }),
        Err(e) => engine_error_response(&e),
    }
}
