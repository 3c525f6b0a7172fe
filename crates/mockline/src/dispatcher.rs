//! Per-request entry point for live traffic.
//!
//! ```text
//! NOT_READY ──(engine running)──► MATCHING ──► MATCHED | NO_MATCH
//!                                     └──────► ERROR
//! ```
//!
//! The dispatcher never returns an error to its caller. Every outcome,
//! including a failure inside matching or response synthesis, is turned into
//! a [`DispatchResponse`].

use crate::coordinator::SyncCoordinator;
use crate::metrics;
use crate::predicate::CompiledMatcher;
use crate::request::MatchRequest;
use chrono::Utc;
use serde_json::json;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

pub const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Response header carrying the matched stub's external key.
pub const STUB_KEY_HEADER: &str = "x-mockline-stub";

/// Terminal state of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Matched,
    NoMatch,
    NotReady,
    Error,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Matched => "matched",
            DispatchOutcome::NoMatch => "no_match",
            DispatchOutcome::NotReady => "not_ready",
            DispatchOutcome::Error => "error",
        }
    }
}

/// Transport-neutral response produced by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub outcome: DispatchOutcome,
}

impl DispatchResponse {
    fn json(status: u16, outcome: DispatchOutcome, body: String) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string())],
            body,
            outcome,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct RequestDispatcher {
    coordinator: Arc<SyncCoordinator>,
    /// Makes the next matching attempt panic.
    #[cfg(test)]
    fail_next: std::sync::atomic::AtomicBool,
}

impl RequestDispatcher {
    pub fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        Self {
            coordinator,
            #[cfg(test)]
            fail_next: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn dispatch(&self, request: &MatchRequest) -> DispatchResponse {
        let start = Instant::now();

        let response = if !self.coordinator.is_running() {
            not_ready()
        } else {
            catch_unwind(AssertUnwindSafe(|| self.match_and_respond(request)))
                .unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    error!(
                        "Dispatch of {} {} failed: {}",
                        request.method(),
                        request.path(),
                        message
                    );
                    internal_error(&message)
                })
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::record_request(request.method(), response.outcome.as_str(), elapsed_ms);
        debug!(
            "{} {} -> {} ({:.3} ms)",
            request.method(),
            request.path(),
            response.outcome.as_str(),
            elapsed_ms
        );
        response
    }

    fn match_and_respond(&self, request: &MatchRequest) -> DispatchResponse {
        #[cfg(test)]
        if self
            .fail_next
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            panic!("matcher exploded");
        }

        match self.coordinator.index().lookup(request) {
            Some(matcher) => matched(&matcher),
            None => no_match(request),
        }
    }
}

fn matched(matcher: &CompiledMatcher) -> DispatchResponse {
    let rule = matcher.rule();
    let body = if rule.response_definition.trim().is_empty() {
        json!({
            "message": format!("Mocked response for {}", rule.name),
            "stubName": rule.name,
            "timestamp": Utc::now().to_rfc3339(),
        })
        .to_string()
    } else {
        rule.response_definition.clone()
    };

    let mut response = DispatchResponse::json(200, DispatchOutcome::Matched, body);
    response
        .headers
        .push((STUB_KEY_HEADER.to_string(), matcher.key().to_string()));
    response
}

fn no_match(request: &MatchRequest) -> DispatchResponse {
    let body = json!({
        "error": "No matching stub",
        "status": 404,
        "message": "No stub matching the request was found",
        "method": request.method(),
        "path": request.path(),
    });
    DispatchResponse::json(404, DispatchOutcome::NoMatch, body.to_string())
}

fn not_ready() -> DispatchResponse {
    let body = json!({
        "error": "Service unavailable",
        "status": 503,
        "message": "Stub server is not running",
    });
    DispatchResponse::json(503, DispatchOutcome::NotReady, body.to_string())
}

fn internal_error(message: &str) -> DispatchResponse {
    let body = json!({
        "error": "Internal server error",
        "message": message,
    });
    DispatchResponse::json(500, DispatchOutcome::Error, body.to_string())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}
