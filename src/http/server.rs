//! Admin HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router for the health, metrics and pool routes
//! - Wire up middleware (tracing, timeout)
//! - Serve on a listener until shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::lifecycle::Readiness;
use crate::observability::{LogLevelHandle, MetricsRegistry};
use crate::pool::PoolRegistry;

/// Upper bound for one admin request, on-demand dispatches included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<PoolRegistry>,
    pub metrics: Arc<MetricsRegistry>,
    pub readiness: Arc<Readiness>,
    /// `None` when logging was set up by someone else (tests).
    pub log_level: Option<LogLevelHandle>,
}

/// HTTP server for the admin surface.
pub struct AdminServer {
    router: Router,
}

impl AdminServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        setup_admin_router(state)
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Admin server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("Admin server stopped");
        Ok(())
    }
}
