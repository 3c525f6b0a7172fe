//! System handlers: health and metrics.

use crate::admin_api::types::*;
use crate::coordinator::SyncCoordinator;
use crate::metrics::collect_metrics;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;

/// GET /admin/health - Engine health
pub fn handle_health(coordinator: Arc<SyncCoordinator>) -> Response<Full<Bytes>> {
    let running = coordinator.is_running();
    let body = HealthResponse {
        status: if running { "UP" } else { "DOWN" },
        running,
        active_stubs: coordinator.index().len(),
        regex_cache_size: coordinator.index().compiler().regex_cache().len(),
    };
    let status = if running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &body)
}

/// GET /admin/health/ping - Liveness probe
pub fn handle_ping() -> Response<Full<Bytes>> {
    build_response_with_headers(StatusCode::OK, [("Content-Type", "text/plain")], "pong")
}

/// GET /admin/metrics - Prometheus metrics
pub fn handle_metrics() -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        collect_metrics(),
    )
}
