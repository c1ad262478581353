//! HTTP server lifecycle.

use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{routes::create_router, state::AppState};

/// The gateway HTTP server
#[derive(Debug)]
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server over fully built state
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Bind the configured address and serve until `shutdown` is cancelled.
    ///
    /// # Errors
    /// Returns error if the address cannot be bound or the accept loop fails
    pub async fn run(self, shutdown: CancellationToken) -> io::Result<()> {
        let host = self.state.config.server.host.clone();
        let port = self.state.config.server.port;
        let listener = TcpListener::bind((host.as_str(), port)).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    ///
    /// After `shutdown` fires, in-flight requests get the configured grace
    /// period to finish; anything still running after that is dropped, which
    /// cancels its provider calls.
    ///
    /// # Errors
    /// Returns error if the accept loop fails
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> io::Result<()> {
        let addr: SocketAddr = listener.local_addr()?;
        let grace = self.state.config.server.shutdown_grace;
        let router = create_router(self.state);

        info!(address = %addr, "Gateway listening");

        let serve = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .into_future();
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => return result,
            () = shutdown.cancelled() => {}
        }

        info!(grace_ms = grace.as_millis() as u64, "Draining in-flight requests");
        match tokio::time::timeout(grace, serve).await {
            Ok(result) => {
                info!("Server stopped");
                result
            }
            Err(_) => {
                warn!("Grace period elapsed with requests still in flight");
                Ok(())
            }
        }
    }
}
