//! HTTP surface: one embedded page plus a small JSON API per session.

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use ecg_session::Handlers;
use std::{net::SocketAddr, sync::Arc};

mod error;
mod handlers;

#[derive(Clone)]
pub struct AppState {
    handlers: Arc<Handlers>,
}

impl AppState {
    pub fn new(handlers: Handlers) -> Self {
        Self {
            handlers: Arc::new(handlers),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/sessions", post(handlers::create_session))
        .route("/api/sessions/:id", axum::routing::delete(handlers::delete_session))
        .route("/api/sessions/:id/close", post(handlers::delete_session))
        .route("/api/sessions/:id/generate", post(handlers::generate))
        .route("/api/sessions/:id/select", post(handlers::select))
        .route("/api/sessions/:id/download/:kind", get(handlers::download))
        .with_state(state)
}

/// Serve until Ctrl-C, then destroy every session and the scratch root.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    let store = Arc::clone(state.handlers.store());
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tokio::task::spawn_blocking(move || store.shutdown())
        .await
        .context("shutdown task failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
