pub mod auth;
pub mod chat;
pub mod health;
pub mod threads;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the `SV_API_TOKEN` bearer-token middleware).
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/v1/health", get(health::health))
        .route("/v1/readiness", get(health::readiness));

    let protected = Router::new()
        // Chat (core runtime)
        .route("/v1/chat", post(chat::chat))
        .route("/v1/chat/stream", post(chat::chat_stream))
        // Threads
        .route("/v1/threads", get(threads::list_threads))
        .route("/v1/threads/:id", get(threads::get_thread))
        .route("/v1/threads/:id/stop", post(threads::stop_thread))
        .route("/v1/threads/:id/transcript", post(threads::send_transcript))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public.merge(protected)
}

/// JSON error body with the given status.
pub(crate) fn error_response(
    status: axum::http::StatusCode,
    message: impl Into<String>,
) -> axum::response::Response {
    use axum::response::IntoResponse;
    (
        status,
        axum::Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}
