//! HTTP surface for mockline.
//!
//! One listener serves two kinds of traffic:
//! - `/admin/**`: stub management REST API, health and metrics endpoints
//! - everything else: matched against the stub index by the dispatcher

mod handlers;
mod router;
mod server;
mod types;

pub use server::{HttpServer, ServerState};
