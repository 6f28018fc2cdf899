//! HTTP server lifecycle.
//!
//! Binds a listener, serves the API router on a background task and shuts
//! down gracefully when the state's cancellation token fires.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::services::http_api::{router, ApiState};

/// Handle to a running server.
pub struct ServerHandle {
    cancel_token: CancellationToken,
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(self) {
        log::info!("[server] Stopping server on {}", self.addr);
        self.cancel_token.cancel();
        self.wait().await;
    }

    /// Wait until the server exits on its own token.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            log::error!("[server] Server task failed: {}", e);
        }
    }
}

/// Bind `addr` and start serving on a spawned task.
pub async fn start_server(addr: SocketAddr, state: ApiState) -> Result<ServerHandle, AppError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;
    serve(listener, state)
}

/// Serve on an already bound listener.
pub fn serve(listener: TcpListener, state: ApiState) -> Result<ServerHandle, AppError> {
    let addr = listener
        .local_addr()
        .map_err(|e| AppError::internal(format!("Failed to read listener address: {}", e)))?;
    let cancel_token = state.shutdown.clone();
    let cancel_clone = cancel_token.clone();
    let app = router(state);

    log::info!("[server] Listening on http://{}", addr);

    let task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            cancel_clone.cancelled().await;
        });

        if let Err(e) = server.await {
            log::error!("[server] Server error: {}", e);
        }

        log::info!("[server] Server stopped");
    });

    Ok(ServerHandle {
        cancel_token,
        addr,
        task,
    })
}
