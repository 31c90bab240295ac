//! HTTP server implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::Result;
use crate::limiter::RateLimiter;

use super::routes::router;

/// HTTP server for the quota service.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Create a new HTTP server around a rate limiter.
    pub fn new(addr: SocketAddr, limiter: Arc<RateLimiter>) -> Self {
        Self { addr, limiter }
    }

    /// Start the HTTP server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        let app = router(self.limiter);

        info!(addr = %self.addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await.map_err(|e| {
            error!(error = %e, "HTTP server failed");
            e.into()
        })
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = router(self.limiter);

        info!(addr = %self.addr, "Starting HTTP server with graceful shutdown");

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                e.into()
            })
    }
}
