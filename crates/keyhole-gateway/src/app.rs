use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    bulk_create_url_handler, create_url_handler, health_handler, history_handler,
    metrics_handler, redirect_handler,
};
use crate::metrics::track_metrics;
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/v1/urls", post(create_url_handler))
            .route("/v1/urls/bulk", post(bulk_create_url_handler))
            .route("/v1/urls/history", get(history_handler))
            .route("/v1/metrics", get(metrics_handler))
            .route("/{short_code}", get(redirect_handler))
            .route_layer(middleware::from_fn(track_metrics))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }
}
