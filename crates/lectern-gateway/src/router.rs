use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    ask_handler, chapter_handler, chapters_handler, health_handler, upload_handler,
};
use crate::server::AppState;
use crate::session::{SessionCookie, session_middleware};

/// Build the application router.
///
/// Everything except `/health` runs behind the session cookie middleware.
/// Request bodies are capped at `max_upload_bytes`.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cookie = SessionCookie::new(state.cookie_name.clone());

    let session_routes = Router::new()
        .route("/upload", post(upload_handler))
        .route("/chapters", get(chapters_handler))
        .route("/chapter/{index}", get(chapter_handler))
        .route("/ask", post(ask_handler))
        .layer(middleware::from_fn_with_state(cookie, session_middleware))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes));

    Router::new()
        .route("/health", get(health_handler))
        .merge(session_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
