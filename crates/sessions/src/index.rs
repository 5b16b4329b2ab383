//! The thread index: one small summary per thread, persisted as
//! `threads.json` next to the checkpoints. Used for listings so the API
//! never has to open every checkpoint.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sv_domain::error::{Error, Result};
use sv_domain::lead::QualificationTier;
use sv_domain::state::SessionState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub turns: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<QualificationTier>,
}

impl ThreadSummary {
    pub fn from_state(state: &SessionState) -> Self {
        Self {
            thread_id: state.thread_id.clone(),
            created_at: state.created_at,
            updated_at: state.updated_at,
            turns: state.turn_count,
            lead_name: state.first_name().map(str::to_string),
            last_score: state.lead_score.as_ref().map(|s| s.total_score),
            tier: state.lead_score.as_ref().map(|s| s.tier),
        }
    }
}

pub struct ThreadIndex {
    path: Option<PathBuf>,
    threads: RwLock<HashMap<String, ThreadSummary>>,
}

impl ThreadIndex {
    /// Load or create the index at `state_path/threads.json`. An unreadable
    /// index is rebuilt lazily from subsequent turns rather than failing
    /// startup.
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path)?;
        let path = state_path.join("threads.json");
        let threads: HashMap<String, ThreadSummary> = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            match serde_json::from_str(&raw) {
                Ok(threads) => threads,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "thread index unreadable, starting empty");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        tracing::info!(threads = threads.len(), path = %path.display(), "thread index loaded");

        Ok(Self {
            path: Some(path),
            threads: RwLock::new(threads),
        })
    }

    /// An index that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            threads: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, state: &SessionState) {
        self.threads
            .write()
            .insert(state.thread_id.clone(), ThreadSummary::from_state(state));
    }

    pub fn get(&self, thread_id: &str) -> Option<ThreadSummary> {
        self.threads.read().get(thread_id).cloned()
    }

    /// All threads, most recently updated first.
    pub fn list(&self) -> Vec<ThreadSummary> {
        let mut all: Vec<ThreadSummary> = self.threads.read().values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all
    }

    pub fn len(&self) -> usize {
        self.threads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.read().is_empty()
    }

    /// Persist the index. Blocking; callers on the runtime use
    /// `spawn_blocking`.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(&*self.threads.read())?;
        let dir = path
            .parent()
            .ok_or_else(|| Error::Checkpoint("thread index has no parent dir".into()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, &json)?;
        tmp.persist(path)
            .map_err(|e| Error::Checkpoint(format!("writing thread index: {e}")))?;
        Ok(())
    }
}
