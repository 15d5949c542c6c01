use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::web::{handlers, logging_middleware::request_logging_middleware, state::AppState};

/// Base64 adds a third on top of the workbook itself.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/version", get(handlers::version))
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/messages", post(handlers::send_message))
        .route("/sessions/{id}/upload", post(handlers::upload_workbook))
        .route("/sample-file", get(handlers::sample_file))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state);

    Router::new()
        .route("/", get(handlers::index))
        .nest("/api/v0", api_routes)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
}
