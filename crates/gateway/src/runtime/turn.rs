//! One conversational turn, end to end.
//!
//! [`run_turn`] spawns the turn on its own task and hands back a channel
//! of [`TurnEvent`]s. The task serializes on the thread lock, restores the
//! checkpoint, runs the graph, executes action triggers and persists the
//! result. Callers either forward events as SSE or drain them for a single
//! JSON reply.

use std::time::Duration;

use serde::Serialize;
use sv_domain::config::BrandConfig;
use sv_domain::error::Result;
use sv_domain::message::Role;
use sv_domain::state::{new_message_id, BookingInfo, ImageCategory, LeadInfo, SessionState};
use sv_domain::trace::TraceEvent;
use sv_sessions::TranscriptLine;
use tokio::sync::mpsc;
use tracing::Instrument;

use super::actions;
use super::cancel::CancelToken;
use super::graph::{TurnContext, TurnOutcome};
use super::sink::TokenSink;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnEvent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events emitted during a single turn, all keyed by the reply's message id.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Incremental reply text.
    Token { message_id: String, text: String },

    /// Images attached to the reply.
    Images {
        message_id: String,
        urls: Vec<String>,
        image_type: ImageCategory,
        context: Option<String>,
    },

    /// Booking details attached to the reply.
    Booking {
        message_id: String,
        booking: BookingInfo,
    },

    /// The complete reply.
    Final {
        message_id: String,
        thread_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        images: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        booking: Option<BookingInfo>,
    },

    /// The turn was stopped; `content` is what was committed.
    Stopped { message_id: String, content: String },

    /// The turn failed. `message` is safe to show to the user.
    Error { message_id: String, message: String },
}

impl TurnEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::Token { .. } => "token",
            TurnEvent::Images { .. } => "images",
            TurnEvent::Booking { .. } => "booking",
            TurnEvent::Final { .. } => "final",
            TurnEvent::Stopped { .. } => "stopped",
            TurnEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnEvent::Final { .. } | TurnEvent::Stopped { .. } | TurnEvent::Error { .. }
        )
    }
}

/// The on-brand message shown when a turn fails.
pub fn failure_message(brand: &BrandConfig) -> String {
    format!(
        "I'm sorry, something went wrong on my side. Please try again in a moment, or message \
         our team on WhatsApp at {} ({}).",
        brand.contact_number, brand.whatsapp_url
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct TurnInput {
    pub thread_id: String,
    pub message: String,
    /// Intake-form profile. Replaces the stored one when present.
    pub lead_info: Option<LeadInfo>,
    /// Emit `token` events while the reply is produced.
    pub stream: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run_turn
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Start a turn. Returns the reply's message id and the event receiver.
/// The last event is always one of `final`, `stopped` or `error`.
pub fn run_turn(state: AppState, input: TurnInput) -> (String, mpsc::Receiver<TurnEvent>) {
    let sessions = &state.config.sessions;
    let (tx, rx) = mpsc::channel::<TurnEvent>(sessions.stream_buffer.max(1));
    let message_id = new_message_id();
    let emit_timeout = Duration::from_millis(sessions.emit_timeout_ms);

    let span = tracing::info_span!(
        "turn",
        thread_id = %input.thread_id,
        message_id = %message_id,
        "otel.kind" = "SERVER",
    );
    let mid = message_id.clone();
    tokio::spawn(
        async move {
            let thread_id = input.thread_id.clone();

            let _permit = match state.thread_locks.acquire(&thread_id).await {
                Ok(permit) => permit,
                Err(e) => {
                    fail(&state, &tx, &thread_id, &mid, &e.to_string(), emit_timeout).await;
                    return;
                }
            };
            let cancel = state.cancel_map.register(&thread_id);

            let result = run_turn_inner(&state, &input, &tx, &mid, cancel, emit_timeout).await;
            state.cancel_map.remove(&thread_id);

            match result {
                Ok(event) => send(&tx, event, emit_timeout).await,
                Err(e) => fail(&state, &tx, &thread_id, &mid, &e.to_string(), emit_timeout).await,
            }
        }
        .instrument(span),
    );

    (message_id, rx)
}

async fn run_turn_inner(
    state: &AppState,
    input: &TurnInput,
    tx: &mpsc::Sender<TurnEvent>,
    message_id: &str,
    cancel: CancelToken,
    emit_timeout: Duration,
) -> Result<TurnEvent> {
    let thread_id = input.thread_id.as_str();

    let mut session = state
        .checkpointer
        .load(thread_id)
        .await?
        .unwrap_or_else(|| SessionState::new(thread_id));
    if let Some(lead) = &input.lead_info {
        session.lead_info = Some(lead.clone());
    }
    session.begin_turn(&input.message);

    TraceEvent::TurnStarted {
        thread_id: thread_id.into(),
        message_id: message_id.into(),
        turn: session.turn_count,
        streaming: input.stream,
    }
    .emit();

    let sink = input
        .stream
        .then(|| TokenSink::new(tx.clone(), message_id, emit_timeout, cancel.clone()));
    let cx = TurnContext::new(message_id, sink, cancel);

    let outcome = state.graph.run(&mut session, &cx).await?;

    if !outcome.stopped {
        emit_attachments(&session, tx, message_id, emit_timeout).await;
    }
    let _notifications = actions::execute(&state.config, &state.notifier, &mut session, &outcome.actions);

    persist(state, &session, message_id, &outcome).await?;

    tracing::info!(
        terminal = outcome.terminal.map(|n| n.as_str()).unwrap_or("none"),
        stopped = outcome.stopped,
        turn = session.turn_count,
        "turn complete"
    );

    Ok(if outcome.stopped {
        TurnEvent::Stopped {
            message_id: message_id.into(),
            content: outcome.reply,
        }
    } else {
        TurnEvent::Final {
            message_id: message_id.into(),
            thread_id: thread_id.into(),
            content: outcome.reply,
            images: session.image_urls.clone(),
            booking: session.booking_info.clone(),
        }
    })
}

async fn emit_attachments(
    session: &SessionState,
    tx: &mpsc::Sender<TurnEvent>,
    message_id: &str,
    emit_timeout: Duration,
) {
    if let (Some(urls), Some(image_type)) = (&session.image_urls, session.image_type) {
        let event = TurnEvent::Images {
            message_id: message_id.into(),
            urls: urls.clone(),
            image_type,
            context: session.image_context.clone(),
        };
        send(tx, event, emit_timeout).await;
    }
    if let Some(booking) = &session.booking_info {
        let event = TurnEvent::Booking {
            message_id: message_id.into(),
            booking: booking.clone(),
        };
        send(tx, event, emit_timeout).await;
    }
}

/// Checkpoint (fatal on failure), then the thread index and transcript
/// (logged on failure).
async fn persist(
    state: &AppState,
    session: &SessionState,
    message_id: &str,
    outcome: &TurnOutcome,
) -> Result<()> {
    state.checkpointer.save(&session.thread_id, session).await?;

    state.threads.record(session);
    let threads = state.threads.clone();
    match tokio::task::spawn_blocking(move || threads.flush()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "thread index flush failed"),
        Err(e) => tracing::warn!(error = %e, "thread index flush task failed"),
    }

    if let Some(transcripts) = &state.transcripts {
        let mut lines = Vec::new();
        if let Some(user) = session.user_messages().last() {
            lines.push(TranscriptLine::from_message(user, message_id));
        }
        if !outcome.reply.is_empty() {
            if let Some(reply) = session.messages.last().filter(|m| m.role == Role::Assistant) {
                lines.push(TranscriptLine::from_message(reply, message_id));
            }
        }
        if let Err(e) = transcripts.append(&session.thread_id, &lines).await {
            tracing::warn!(error = %e, "transcript append failed");
        }
    }
    Ok(())
}

async fn fail(
    state: &AppState,
    tx: &mpsc::Sender<TurnEvent>,
    thread_id: &str,
    message_id: &str,
    error: &str,
    emit_timeout: Duration,
) {
    tracing::error!(outcome = "fatal", error, "turn failed");
    TraceEvent::TurnFailed {
        thread_id: thread_id.into(),
        message_id: message_id.into(),
        error: error.into(),
    }
    .emit();
    let event = TurnEvent::Error {
        message_id: message_id.into(),
        message: failure_message(&state.config.brand),
    };
    send(tx, event, emit_timeout).await;
}

async fn send(tx: &mpsc::Sender<TurnEvent>, event: TurnEvent, emit_timeout: Duration) {
    let name = event.name();
    match tokio::time::timeout(emit_timeout, tx.send(event)).await {
        Ok(Ok(())) => {}
        _ => tracing::debug!(event = name, "turn event dropped, consumer gone"),
    }
}

/// Collect a turn's events into its final reply, for non-streaming callers.
pub async fn collect(mut rx: mpsc::Receiver<TurnEvent>) -> Option<TurnEvent> {
    while let Some(event) = rx.recv().await {
        if event.is_terminal() {
            return Some(event);
        }
    }
    None
}
