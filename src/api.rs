//! HTTP transport: streams pipeline flushes to browsers as server-sent events.

mod handlers;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::pipeline::Pipeline;

pub use handlers::ChatQuery;

/// Shared state of the HTTP server.
#[derive(Clone)]
pub struct ServerState {
    pub pipeline: Pipeline,
    /// Parent of every request's cancellation token
    pub shutdown: CancellationToken,
}

impl ServerState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Builds the relay router.
///
/// - `GET /agent/api/chat?id=..&message=..` streams the reply
/// - `GET /agent` serves a minimal chat page
/// - `GET /` redirects to `/agent`
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(handlers::redirect_to_agent))
        .route("/agent", get(handlers::agent_page))
        .route("/agent/api/chat", get(handlers::handle_chat))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the router on `listener` until `state.shutdown` is cancelled.
///
/// Cancelling the shutdown token also cancels every in-flight pipeline.
pub async fn serve(listener: TcpListener, state: ServerState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    if let Ok(addr) = listener.local_addr() {
        log::info!("relay listening on http://{addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
