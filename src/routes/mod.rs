//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - problem layer endpoints under `/api/v1/problems/:slug/...`
/// - session grading and history under `/api/v1/sessions`
/// - per-user completed and saved problems under `/api/v1/users/:uid`
/// - interviewer chat at `/api/v1/chat`
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Catalog and layered problem data
        .route("/api/v1/problems", get(http::http_list_problems))
        .route("/api/v1/problems/:slug", get(http::http_get_problem))
        .route(
            "/api/v1/problems/:slug/preview",
            get(http::http_get_preview).post(http::http_post_preview),
        )
        .route(
            "/api/v1/problems/:slug/practice",
            get(http::http_get_practice).post(http::http_post_practice),
        )
        .route(
            "/api/v1/problems/:slug/feedback",
            get(http::http_get_feedback).post(http::http_post_feedback),
        )
        // Sessions
        .route("/api/v1/sessions/feedback", post(http::http_post_session_feedback))
        .route("/api/v1/sessions/:id", get(http::http_get_session))
        .route("/api/v1/users/:uid/sessions", get(http::http_list_user_sessions))
        .route("/api/v1/users/:uid/problems", get(http::http_list_user_problems))
        // Saved problems
        .route("/api/v1/users/:uid/saved", get(http::http_list_saved_problems))
        .route(
            "/api/v1/users/:uid/saved/:slug",
            put(http::http_put_saved_problem).delete(http::http_delete_saved_problem),
        )
        .route("/api/v1/chat", post(http::http_post_chat))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
