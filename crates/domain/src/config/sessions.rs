use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Thread persistence & streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory for checkpoints, the thread index and transcripts.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
    #[serde(default)]
    pub backend: CheckpointBackend,
    /// Capacity of the per-turn event channel.
    #[serde(default = "d_stream_buffer")]
    pub stream_buffer: usize,
    /// How long a token send may wait on a full channel before the
    /// consumer is treated as gone.
    #[serde(default = "d_emit_timeout_ms")]
    pub emit_timeout_ms: u64,
    /// Write JSONL transcripts next to the checkpoints.
    #[serde(default = "d_true")]
    pub transcripts: bool,
    /// Most recently used checkpoints kept in memory by the file backend.
    #[serde(default = "d_checkpoint_cache_size")]
    pub checkpoint_cache_size: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            backend: CheckpointBackend::default(),
            stream_buffer: d_stream_buffer(),
            emit_timeout_ms: d_emit_timeout_ms(),
            transcripts: true,
            checkpoint_cache_size: d_checkpoint_cache_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    #[default]
    File,
    Memory,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_state_path() -> PathBuf {
    PathBuf::from("./data/threads")
}
fn d_stream_buffer() -> usize {
    64
}
fn d_emit_timeout_ms() -> u64 {
    2_000
}
fn d_checkpoint_cache_size() -> usize {
    256
}
fn d_true() -> bool {
    true
}
