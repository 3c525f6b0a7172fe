//! HTTP server.

use crate::admin_api::router::route_request;
use crate::coordinator::SyncCoordinator;
use crate::dispatcher::RequestDispatcher;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Shared state handed to every connection.
pub struct ServerState {
    pub coordinator: Arc<SyncCoordinator>,
    pub dispatcher: Arc<RequestDispatcher>,
}

impl ServerState {
    pub fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        let dispatcher = Arc::new(RequestDispatcher::new(Arc::clone(&coordinator)));
        Self {
            coordinator,
            dispatcher,
        }
    }
}

/// Stub server: admin API and live traffic on one listener.
pub struct HttpServer {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl HttpServer {
    /// Bind the listener. Port 0 picks a free port, see [`HttpServer::local_addr`].
    pub async fn bind(addr: SocketAddr, state: Arc<ServerState>) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, anyhow::Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        info!("Mockline listening on http://{}", self.local_addr()?);

        loop {
            let (stream, _) = self.listener.accept().await?;
            let io = TokioIo::new(stream);
            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { route_request(req, state).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Connection error: {}", e);
                }
            });
        }
    }
}
