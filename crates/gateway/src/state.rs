use std::sync::Arc;

use sv_domain::config::Config;
use sv_notify::Notifier;
use sv_providers::ProviderRegistry;
use sv_scheduling::SchedulingApi;
use sv_sessions::{Checkpointer, ThreadIndex, TranscriptWriter};

use crate::runtime::cancel::CancelMap;
use crate::runtime::graph::Graph;
use crate::runtime::session_lock::ThreadLocks;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services**: config, LLM providers, the conversation graph
/// - **Persistence**: checkpoints, thread index, transcripts
/// - **Integrations**: scheduling and email
/// - **Runtime**: per-thread locks and cancel tokens
/// - **Security**: API token digest
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub llm: Arc<ProviderRegistry>,
    pub graph: Arc<Graph>,

    // ── Persistence ───────────────────────────────────────────────────
    pub checkpointer: Arc<dyn Checkpointer>,
    pub threads: Arc<ThreadIndex>,
    /// `None` when `[sessions].transcripts` is off.
    pub transcripts: Option<Arc<TranscriptWriter>>,

    // ── Integrations ──────────────────────────────────────────────────
    pub scheduling: Arc<dyn SchedulingApi>,
    pub notifier: Arc<dyn Notifier>,

    // ── Runtime ───────────────────────────────────────────────────────
    pub thread_locks: Arc<ThreadLocks>,
    pub cancel_map: Arc<CancelMap>,

    // ── Security ──────────────────────────────────────────────────────
    /// SHA-256 digest of the API bearer token, read once at startup.
    /// `None` means dev mode (no auth).
    pub api_token_hash: Option<Vec<u8>>,
}
