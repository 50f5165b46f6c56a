//! Read-only HTTP/JSON view over the shared snapshot.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::system::smi::SmiSource;
use crate::system::snapshot::SnapshotStore;

pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod health;

/// Shared by every request. Handlers only ever read the store.
#[derive(Clone)]
pub struct AppState {
    pub store: SnapshotStore,
    /// Used by the health check's availability probe.
    pub smi: Arc<dyn SmiSource>,
    pub test_mode: bool,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/", get(dashboard::index))
        .route("/api/gpu-data", get(handlers::snapshot))
        .route("/api/v1/gpu", get(handlers::snapshot))
        .route("/api/v1/gpu/{index}", get(handlers::gpu_by_index))
        .route("/api/v1/processes", get(handlers::processes))
        .route("/api/v1/health", get(health::health))
        .layer(cors)
        .with_state(state)
}

pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
