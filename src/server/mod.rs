//! HTTP surface: MJPEG stream, camera control and status, metrics.

mod config;
mod routes;

pub use config::ServerConfig;
pub use routes::{router, AppState};

use std::future::Future;
use thiserror::Error;

/// Errors that can occur while serving HTTP.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    /// The server failed while running.
    #[error("server error: {0}")]
    Server(String),
}

/// HTTP server for the stream and its control endpoints.
pub struct StreamServer {
    config: ServerConfig,
    state: AppState,
}

impl StreamServer {
    /// Creates a server for `state`.
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Serves until `shutdown` resolves and open connections have finished.
    ///
    /// Open viewer streams only finish once their session is cancelled, so
    /// `shutdown` should stop the camera before resolving.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state);
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;

        tracing::info!(
            addr = %listener.local_addr()?,
            "Stream server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        tracing::info!("Stream server stopped");
        Ok(())
    }
}
