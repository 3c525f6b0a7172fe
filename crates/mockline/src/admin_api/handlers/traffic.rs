//! Live traffic handler: everything outside `/admin`.

use crate::admin_api::types::{collect_body, dispatch_response, error_response};
use crate::dispatcher::RequestDispatcher;
use crate::request::MatchRequest;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;

/// Match an inbound request against the stub index.
pub async fn handle_dispatch(
    req: Request<Incoming>,
    dispatcher: Arc<RequestDispatcher>,
) -> Response<Full<Bytes>> {
    let url = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let mut request = MatchRequest::new(req.method().as_str(), &url);
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request.add_header(name.as_str(), value);
        }
    }

    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    let request = request.with_body(String::from_utf8_lossy(&body).into_owned());

    dispatch_response(dispatcher.dispatch(&request))
}
