//! HTTP surface: router, request context and handlers.

pub mod actions;
pub mod context;
pub mod handlers;
pub mod response;

use axum::http::Method;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use context::{AppState, RequestContext};
pub use response::{ApiError, FieldError, JsonBody};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/posts", post(handlers::create_post))
        .route("/api/v1/posts/{number}/status", put(handlers::set_response))
        .route(
            "/api/v1/posts/{number}/comments",
            post(handlers::post_comment),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ideaboard"
    }))
}
