use serde::Serialize;

/// Structured trace events emitted across all concierge crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TurnStarted {
        thread_id: String,
        message_id: String,
        turn: u32,
        streaming: bool,
    },
    NodeCompleted {
        thread_id: String,
        node: String,
        duration_ms: u64,
    },
    RouteDecided {
        thread_id: String,
        route: String,
        document_quality: Option<f32>,
        attempts: u32,
    },
    RetrievalCall {
        endpoint: String,
        status: u16,
        results: usize,
        duration_ms: u64,
    },
    ExternalCall {
        service: String,
        operation: String,
        ok: bool,
        cache_hit: bool,
        duration_ms: u64,
    },
    LlmRequest {
        provider: String,
        model: String,
        node: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    Degraded {
        component: String,
        reason: String,
    },
    QualificationDecision {
        thread_id: String,
        asked: Option<String>,
        strategy: Option<String>,
        risk: Option<String>,
        score: u8,
        progress: f32,
        complete: bool,
    },
    CheckpointSaved {
        thread_id: String,
        messages: usize,
        duration_ms: u64,
    },
    TurnFailed {
        thread_id: String,
        message_id: String,
        error: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sv_event");
    }
}
