//! HTTP gateway: serving state, route table, handlers and graceful shutdown.

mod connection;
mod context;
mod error;
pub mod handlers;
mod health;
mod router;
mod shutdown;
mod state;

use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

pub use context::AppContext;
pub use error::ApiError;
pub use health::{HealthStatus, SERVICE_NAME};
pub use router::build_router;
pub use shutdown::ShutdownManager;
pub use state::{RequestId, ServingState, REQUEST_ID_HEADER};

use connection::ConnectionCounter;

/// A bound, not yet running, gateway.
///
/// Binding happens before any backend is built so the port is claimed and
/// the health check answers while startup is still in progress.
pub struct GatewayServer {
    addr: SocketAddr,
    listener: TcpListener,
    state: ServingState,
    shutdown: Arc<ShutdownManager>,
}

impl GatewayServer {
    pub async fn bind(bind_addr: &str, state: ServingState) -> io::Result<Self> {
        let addr: SocketAddr = bind_addr.parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid bind address '{}': {}", bind_addr, e),
            )
        })?;
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Gateway bound");

        Ok(Self {
            addr,
            listener,
            state,
            shutdown: Arc::new(ShutdownManager::new()),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn serving_state(&self) -> ServingState {
        self.state.clone()
    }

    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Serve until shutdown is signalled, then drain connections.
    pub async fn run(self) -> io::Result<()> {
        tracing::info!(addr = %self.addr, "Starting gateway");

        let app = self.state.into_router();
        let make_service = ConnectionCounter::new(app.into_make_service(), self.shutdown.clone());

        let shutdown = self.shutdown.clone();
        axum::serve(self.listener, make_service)
            .with_graceful_shutdown(async move {
                shutdown.wait_for_shutdown().await;
            })
            .into_future()
            .await?;

        self.shutdown.wait_for_connections(Duration::from_secs(10)).await;
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

#[derive(Clone)]
pub struct GatewayHandle {
    shutdown: Arc<ShutdownManager>,
}

impl GatewayHandle {
    pub fn shutdown(&self) {
        self.shutdown.signal_shutdown();
    }
}
