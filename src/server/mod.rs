//! AS2 HTTP endpoint.
//!
//! Routes:
//! - `POST {path}` receives AS2 messages and asynchronous MDNs
//! - `GET /health` liveness
//! - `GET /status` uptime and delivery settings
//!
//! Inbound processing is CPU-bound (CMS, digests) and runs on the
//! blocking pool. Asynchronous MDNs are pushed from a spawned task after
//! the HTTP response has been returned.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use as2::server::{serve, AppState, ServerConfig};
//!
//! let state = AppState::new(ServerConfig::default().with_port(4080), pipeline);
//! serve(Arc::new(state)).await?;
//! ```

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use tokio::net::TcpListener;

pub use config::ServerConfig;
pub use handlers::{create_router, health_check, HealthResponse, StatusResponse};
pub use state::AppState;

use crate::error::{As2Error, Result};

/// Bind the configured address and serve until the listener fails.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.addr;
    let path = state.config.path.clone();
    let router = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| As2Error::Server(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("AS2 endpoint listening on http://{}{}", addr, path);

    axum::serve(listener, router)
        .await
        .map_err(|e| As2Error::Server(format!("Server error: {e}")))
}
