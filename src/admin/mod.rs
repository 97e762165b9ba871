//! Admin API: limiter and replay store operations behind a bearer key.
//!
//! Served on its own listener (`admin.bind_address`) so it never shares a
//! port with admitted traffic.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;
use crate::lifecycle::Shutdown;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/config", get(get_config))
        .route("/admin/rate-limit/inspect", get(inspect_key))
        .route("/admin/rate-limit/reset", post(reset_key))
        .route("/admin/rate-limit/clear", post(clear_limits))
        .route("/admin/replay/stats", get(replay_stats))
        .route("/admin/replay/clear", post(replay_clear))
        .route("/admin/replay/sweep", post(replay_sweep))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve_admin(
    state: AppState,
    listener: TcpListener,
    shutdown: Shutdown,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown.signalled())
        .await
}
