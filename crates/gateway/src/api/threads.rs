//! Thread endpoints: listing, detail, stop and transcript email.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use sv_domain::message::Message;
use sv_notify::{dispatch, templates};

use super::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// `GET /v1/threads`: most recently updated first.
pub async fn list_threads(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let all = state.threads.list();
    let total = all.len();
    let threads: Vec<_> = all.into_iter().take(query.limit.clamp(1, 500)).collect();
    Json(serde_json::json!({ "threads": threads, "total": total }))
}

/// `GET /v1/threads/:id`: the stored conversation state.
pub async fn get_thread(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.checkpointer.load(&id).await {
        Ok(Some(session)) => Json(serde_json::json!({
            "thread_id": session.thread_id,
            "summary": state.threads.get(&id),
            "running": state.cancel_map.is_running(&id),
            "messages": session.messages,
            "lead_info": session.lead_info,
            "qualification_data": session.qualification_data,
            "lead_score": session.lead_score,
            "questions_asked": session.questions_asked,
            "actions_fired": session.actions_fired,
            "turn_count": session.turn_count,
            "created_at": session.created_at,
            "updated_at": session.updated_at,
        }))
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "thread not found"),
        Err(e) => {
            tracing::error!(thread_id = %id, error = %e, "checkpoint load failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not load thread")
        }
    }
}

/// `POST /v1/threads/:id/stop`: cancel the in-flight turn, if any. The
/// partial reply is committed by the turn itself.
pub async fn stop_thread(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let stopped = state.cancel_map.cancel(&id);
    if stopped {
        tracing::info!(thread_id = %id, "turn stop requested");
    }
    Json(serde_json::json!({ "thread_id": id, "stopped": stopped }))
}

/// `POST /v1/threads/:id/transcript`: email the conversation to the lead.
/// Requires a lead who opted in and left an email address.
pub async fn send_transcript(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let session = match state.checkpointer.load(&id).await {
        Ok(Some(session)) => session,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "thread not found"),
        Err(e) => {
            tracing::error!(thread_id = %id, error = %e, "checkpoint load failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not load thread");
        }
    };
    let Some(lead) = session.lead_info.as_ref() else {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "thread has no lead profile");
    };

    let messages = match &state.transcripts {
        Some(transcripts) => match transcripts.read(&id).await {
            Ok(lines) if !lines.is_empty() => lines
                .into_iter()
                .map(|l| Message {
                    role: l.role,
                    content: l.content,
                })
                .collect(),
            Ok(_) => session.messages.clone(),
            Err(e) => {
                tracing::warn!(thread_id = %id, error = %e, "transcript read failed, using checkpoint");
                session.messages.clone()
            }
        },
        None => session.messages.clone(),
    };

    let Some(email) =
        templates::transcript_email(&state.config.notify, &state.config.brand, lead, &messages)
    else {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "lead has not opted in to transcripts or has no email address",
        );
    };

    tracing::info!(thread_id = %id, messages = messages.len(), "sending transcript");
    let _ = dispatch(state.notifier.clone(), email);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "thread_id": id, "queued": true })),
    )
        .into_response()
}
