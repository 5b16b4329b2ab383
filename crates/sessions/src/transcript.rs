//! Append-only JSONL transcripts.
//!
//! Each thread gets a `<thread>.jsonl` file under the transcript directory.
//! Every user and assistant message of a turn is appended as one JSON line,
//! tagged with the turn's message id.
//!
//! Reads go through an in-memory write-through cache; all file I/O runs on
//! the blocking pool.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sv_domain::error::{Error, Result};
use sv_domain::message::{Message, Role};

use crate::checkpoint::thread_file_stem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl TranscriptLine {
    pub fn from_message(message: &Message, message_id: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            role: message.role,
            content: message.content.clone(),
            message_id: Some(message_id.to_string()),
        }
    }
}

pub struct TranscriptWriter {
    base_dir: PathBuf,
    cache: RwLock<HashMap<String, Vec<TranscriptLine>>>,
}

impl TranscriptWriter {
    pub fn new(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Append lines to a thread's transcript. The cache is only updated
    /// once the disk write succeeds.
    pub async fn append(&self, thread_id: &str, lines: &[TranscriptLine]) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }

        let path = self.path_for(thread_id)?;
        let buf = serialize_lines(lines)?;
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            file.write_all(buf.as_bytes())?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        // Only extend a cached entry; an uncached thread is loaded whole
        // from disk on the next read.
        if let Some(cached) = self.cache.write().get_mut(thread_id) {
            cached.extend(lines.iter().cloned());
        }

        tracing::debug!(thread_id, lines = lines.len(), "transcript appended");
        Ok(())
    }

    pub async fn read(&self, thread_id: &str) -> Result<Vec<TranscriptLine>> {
        if let Some(lines) = self.cache.read().get(thread_id) {
            return Ok(lines.clone());
        }

        let path = self.path_for(thread_id)?;
        let tid = thread_id.to_owned();
        let lines = tokio::task::spawn_blocking(move || read_jsonl_file(&path, &tid))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        self.cache
            .write()
            .insert(thread_id.to_owned(), lines.clone());
        Ok(lines)
    }

    fn path_for(&self, thread_id: &str) -> Result<PathBuf> {
        Ok(self
            .base_dir
            .join(format!("{}.jsonl", thread_file_stem(thread_id)?)))
    }
}

fn serialize_lines(lines: &[TranscriptLine]) -> Result<String> {
    let mut buf = String::new();
    for line in lines {
        buf.push_str(&serde_json::to_string(line)?);
        buf.push('\n');
    }
    Ok(buf)
}

fn read_jsonl_file(path: &Path, thread_id: &str) -> Result<Vec<TranscriptLine>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path)?;
    let mut lines = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TranscriptLine>(line) {
            Ok(tl) => lines.push(tl),
            Err(e) => {
                tracing::warn!(thread_id, error = %e, "skipping malformed transcript line");
            }
        }
    }
    Ok(lines)
}
