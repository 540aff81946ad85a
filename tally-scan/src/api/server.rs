//! HTTP server setup and routing

use crate::controller::ControllerHandle;
use axum::{
    routing::{delete, get, post},
    Router,
};
use sqlx::{Pool, Sqlite};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tally_common::{Error, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Server shutdown notification for long-lived responses
///
/// Triggered once the shutdown future passed to [`serve`] resolves. SSE
/// streams end on it so graceful shutdown does not wait on connected clients.
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Resolves once [`trigger`](Self::trigger) has been called
    pub fn stopped(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // Err means the sender is gone, which is as final as a trigger
            let _ = rx.wait_for(|stopped| *stopped).await;
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub controller: ControllerHandle,
    pub db_pool: Pool<Sqlite>,
    pub shutdown: ShutdownSignal,
}

impl AppContext {
    pub fn new(controller: ControllerHandle, db_pool: Pool<Sqlite>) -> Self {
        Self {
            controller,
            db_pool,
            shutdown: ShutdownSignal::new(),
        }
    }
}

/// Build the presentation API router
pub fn build_router(ctx: AppContext) -> Router {
    use super::{handlers, sse};

    Router::new()
        .route("/health", get(handlers::health))

        // Scanning and the ledger
        .route("/api/scan", post(handlers::submit_scan))
        .route("/api/session", get(handlers::get_session))
        .route("/api/ledger/:index/decrement", post(handlers::decrement_entry))
        .route("/api/ledger/:index", delete(handlers::remove_entry))
        .route("/api/export", post(handlers::export_ledger))
        .route("/api/result/dismiss", post(handlers::dismiss_result))
        .route("/api/intake/pause", post(handlers::pause_intake))
        .route("/api/intake/resume", post(handlers::resume_intake))

        // Watch list and backend configuration
        .route("/api/alerts", get(handlers::get_alerts).put(handlers::put_alerts))
        .route("/api/config", get(handlers::get_config).put(handlers::put_config))
        .route("/api/health/recheck", post(handlers::recheck_health))

        // SSE event stream
        .route("/events", get(sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run<F>(ctx: AppContext, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    serve(listener, ctx, shutdown).await
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let stop = ctx.shutdown.clone();
    let app = build_router(ctx);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            stop.trigger();
        })
        .await
        .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
