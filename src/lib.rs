pub mod config;
pub mod db;
pub mod error;
pub mod realtime;
pub mod startup;
pub mod tally;
pub mod votes;

use crate::startup::AppState;
use axum::{
    Json, Router,
    extract::Extension,
    http::{
        StatusCode,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn app(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(votes::register))
        .route("/vote", post(votes::cast_vote))
        .route(
            "/calculate_results/:event_id",
            post(votes::trigger_calculation),
        )
        .route("/results/:event_id", get(votes::get_results))
        .route("/results/:event_id/stream", get(realtime::results_sse))
        .route("/ws", get(realtime::ws_handler))
        .layer(Extension(app_state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    axum::http::Method::POST,
                    axum::http::Method::GET,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([CONTENT_TYPE, ACCEPT]),
        )
        .layer(TraceLayer::new_for_http())
        .fallback(handler_404)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}
