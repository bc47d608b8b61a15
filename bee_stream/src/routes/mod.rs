mod admin;
mod health;
mod metrics;
mod video_ws;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/ws/video", get(video_ws::video_ws))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
}

pub fn admin_routes() -> Router<SharedState> {
    Router::new().route("/admin/reload", post(admin::reload_model))
}
