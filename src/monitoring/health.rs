//! Liveness HTTP endpoint.
//!
//! Hosting platforms probe `/` and expect a plain 200. `/health` returns
//! the session snapshot as JSON for humans and uptime monitors.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::agent::session::Session;

pub fn router(session: Session) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .with_state(session)
}

/// Serve on an already bound listener until the task is aborted.
pub async fn serve(listener: TcpListener, session: Session) {
    if let Err(e) = axum::serve(listener, router(session)).await {
        warn!(error = %e, "Health server error");
    }
}

/// Spawn the health server on `addr`. A failed bind is logged and the bot
/// keeps running without it. Returns a handle that can be aborted.
pub fn spawn_health_server(session: Session, addr: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => {
                info!(addr = %addr, "Health server listening");
                l
            }
            Err(e) => {
                warn!(error = %e, addr = %addr, "Failed to bind health server, continuing without it");
                return;
            }
        };
        serve(listener, session).await;
    })
}

async fn root_handler() -> &'static str {
    "OK"
}

async fn health_handler(State(session): State<Session>) -> impl IntoResponse {
    Json(session.snapshot().await)
}
