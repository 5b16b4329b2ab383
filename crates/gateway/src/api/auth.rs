//! Bearer-token middleware for the protected routes.
//!
//! The token comes from the env var named by `server.api_token_env`
//! (default `SV_API_TOKEN`) and is hashed once at startup. With no token
//! configured every request passes (dev mode).

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

pub async fn require_api_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected_hash) = &state.api_token_hash else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    // Fixed-length digests keep the comparison independent of token length.
    let provided_hash = Sha256::digest(provided.as_bytes());
    if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
        tracing::debug!(path = %req.uri().path(), "rejected request with bad API token");
        return super::error_response(StatusCode::UNAUTHORIZED, "invalid or missing API token");
    }

    next.run(req).await
}
