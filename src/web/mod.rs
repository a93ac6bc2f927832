use axum::{http::Method, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::db::store::CheckStore;
use crate::server::feed_hub::FeedHub;
use crate::server::monitor_loop::MonitorLoop;
use crate::web::handlers::websocket_handler;
use crate::web::routes::monitor_routes;

pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<MonitorLoop>,
    pub store: Arc<dyn CheckStore>,
    pub feed_hub: FeedHub,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(
    monitor: Arc<MonitorLoop>,
    store: Arc<dyn CheckStore>,
    feed_hub: FeedHub,
) -> Router {
    let app_state = Arc::new(AppState {
        monitor,
        store,
        feed_hub,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .merge(monitor_routes::create_monitor_router())
        .route("/ws", get(websocket_handler::websocket_handler))
        .with_state(app_state)
        .layer(cors)
}
