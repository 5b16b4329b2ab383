use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// `GET /v1/health`: liveness only.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /v1/readiness`: 200 when at least one LLM provider is registered,
/// 503 otherwise. Scheduling health is reported but never gates readiness
/// since booking degrades to the contact fallback.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let providers = state.llm.list_providers();
    let scheduling = match state.scheduling.health_check().await {
        Ok(status) => serde_json::json!({ "healthy": status.healthy, "checked_at": status.checked_at }),
        Err(e) => serde_json::json!({ "healthy": false, "error": e.to_string() }),
    };

    let ready = !providers.is_empty();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "ready": ready,
            "provider_count": providers.len(),
            "providers": providers,
            "scheduling": scheduling,
            "threads": state.threads.len(),
        })),
    )
}
