//! Chat endpoints.
//!
//! - `POST /v1/chat`: runs a turn and returns the complete reply
//! - `POST /v1/chat/stream`: SSE, `token`, `images`, `booking`, then one of
//!   `final`, `stopped` or `error`

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream::Stream;
use serde::Deserialize;

use sv_domain::state::LeadInfo;

use super::error_response;
use crate::runtime::{collect, run_turn, TurnEvent, TurnInput};
use crate::state::AppState;

pub const MAX_MESSAGE_CHARS: usize = 4000;
pub const MAX_THREAD_ID_CHARS: usize = 128;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Continue an existing conversation. A new thread is started if absent.
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Intake-form profile; replaces the stored one when present.
    #[serde(default)]
    pub lead_info: Option<LeadInfo>,
}

impl ChatRequest {
    fn into_input(self, stream: bool) -> Result<TurnInput, String> {
        let message = self.message.trim();
        if message.is_empty() {
            return Err("message must not be empty".into());
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(format!("message exceeds {MAX_MESSAGE_CHARS} characters"));
        }
        let thread_id = match self.thread_id.map(|t| t.trim().to_string()) {
            Some(t) if t.is_empty() => return Err("thread_id must not be empty".into()),
            Some(t) if t.chars().count() > MAX_THREAD_ID_CHARS => {
                return Err(format!("thread_id exceeds {MAX_THREAD_ID_CHARS} characters"))
            }
            Some(t) => t,
            None => uuid::Uuid::new_v4().to_string(),
        };
        Ok(TurnInput {
            thread_id,
            message: message.to_string(),
            lead_info: self.lead_info,
            stream,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat (non-streaming)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(State(state): State<AppState>, Json(body): Json<ChatRequest>) -> Response {
    let input = match body.into_input(false) {
        Ok(input) => input,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    let thread_id = input.thread_id.clone();
    let brand_failure = crate::runtime::failure_message(&state.config.brand);

    let (message_id, rx) = run_turn(state, input);

    match collect(rx).await {
        Some(TurnEvent::Final {
            content,
            images,
            booking,
            ..
        }) => Json(serde_json::json!({
            "thread_id": thread_id,
            "message_id": message_id,
            "content": content,
            "images": images,
            "booking": booking,
            "stopped": false,
        }))
        .into_response(),
        Some(TurnEvent::Stopped { content, .. }) => Json(serde_json::json!({
            "thread_id": thread_id,
            "message_id": message_id,
            "content": content,
            "stopped": true,
        }))
        .into_response(),
        Some(TurnEvent::Error { message, .. }) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
        _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, brand_failure),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat/stream (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat_stream(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Response {
    let input = match body.into_input(true) {
        Ok(input) => input,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    let (_message_id, rx) = run_turn(state, input);

    Sse::new(make_sse_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Dropping the stream closes the receiver; the turn's sink then detaches
/// and the partial reply is committed as a stopped turn.
fn make_sse_stream(
    mut rx: tokio::sync::mpsc::Receiver<TurnEvent>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().event(event.name()).data(data));
            if terminal {
                break;
            }
        }
    }
}
