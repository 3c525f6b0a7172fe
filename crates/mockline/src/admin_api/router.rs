//! Route dispatch logic.
//!
//! `/admin/**` goes to the management API; every other path is live traffic
//! for the stub dispatcher.

use crate::admin_api::handlers::{stubs, system, traffic};
use crate::admin_api::server::ServerState;
use crate::admin_api::types::{error_response, not_found, run_blocking};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::debug;

const ADMIN_PREFIX: &str = "/admin";

/// Parsed route below `/admin/stubs`
#[derive(Debug, PartialEq)]
enum StubRoute {
    /// GET/POST /admin/stubs
    Collection,
    /// POST /admin/stubs/batch
    Batch,
    /// GET /admin/stubs/search
    Search,
    /// GET /admin/stubs/statistics
    Statistics,
    /// POST /admin/stubs/reload
    Reload,
    /// GET/PUT/DELETE /admin/stubs/:id
    ById(i64),
    /// POST /admin/stubs/:id/toggle
    Toggle(i64),
}

impl StubRoute {
    /// Parse route from path segments after `/admin/stubs`
    fn parse(segments: &[&str]) -> Option<Self> {
        match segments {
            [] => Some(StubRoute::Collection),
            ["batch"] => Some(StubRoute::Batch),
            ["search"] => Some(StubRoute::Search),
            ["statistics"] => Some(StubRoute::Statistics),
            ["reload"] => Some(StubRoute::Reload),
            [id] => id.parse().ok().map(StubRoute::ById),
            [id, "toggle"] => id.parse().ok().map(StubRoute::Toggle),
            _ => None,
        }
    }
}

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let path = req.uri().path().to_string();

    if !is_admin_path(&path) {
        return Ok(traffic::handle_dispatch(req, Arc::clone(&state.dispatcher)).await);
    }

    let method = req.method().clone();
    let query = req.uri().query().map(|s| s.to_string());
    debug!("Admin API: {} {}", method, path);

    Ok(route_admin(&method, &path, query.as_deref(), req, state).await)
}

fn is_admin_path(path: &str) -> bool {
    path == ADMIN_PREFIX || path.starts_with("/admin/")
}

async fn route_admin(
    method: &Method,
    path: &str,
    query: Option<&str>,
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Response<Full<Bytes>> {
    let coordinator = Arc::clone(&state.coordinator);

    match (method, path) {
        (&Method::GET, "/admin/health") => return system::handle_health(coordinator),
        (&Method::GET, "/admin/health/ping") => return system::handle_ping(),
        (&Method::GET, "/admin/metrics") => return system::handle_metrics(),
        _ => {}
    }

    let Some(rest) = path
        .strip_prefix("/admin/stubs")
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
    else {
        return not_found();
    };
    let segments: Vec<&str> = rest
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let Some(route) = StubRoute::parse(&segments) else {
        return match segments.first() {
            Some(id) if segments.len() <= 2 && id.parse::<i64>().is_err() => {
                error_response(StatusCode::BAD_REQUEST, &format!("Invalid stub id: {id}"))
            }
            _ => not_found(),
        };
    };

    // Handlers that touch the store run on the blocking pool.
    match (method, route) {
        (&Method::GET, StubRoute::Collection) => {
            run_blocking(move || stubs::handle_list(coordinator)).await
        }
        (&Method::POST, StubRoute::Collection) => stubs::handle_create(req, coordinator).await,
        (&Method::POST, StubRoute::Batch) => stubs::handle_create_batch(req, coordinator).await,
        (&Method::GET, StubRoute::Search) => {
            let query = query.map(str::to_string);
            run_blocking(move || stubs::handle_search(query.as_deref(), coordinator)).await
        }
        (&Method::GET, StubRoute::Statistics) => {
            run_blocking(move || stubs::handle_statistics(coordinator)).await
        }
        (&Method::POST, StubRoute::Reload) => {
            run_blocking(move || stubs::handle_reload(coordinator)).await
        }
        (&Method::GET, StubRoute::ById(id)) => {
            run_blocking(move || stubs::handle_get(id, coordinator)).await
        }
        (&Method::PUT, StubRoute::ById(id)) => stubs::handle_update(id, req, coordinator).await,
        (&Method::DELETE, StubRoute::ById(id)) => {
            run_blocking(move || stubs::handle_delete(id, coordinator)).await
        }
        (&Method::POST, StubRoute::Toggle(id)) => {
            run_blocking(move || stubs::handle_toggle(id, coordinator)).await
        }
        _ => error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
    }
}
