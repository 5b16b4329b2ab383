//! Thread checkpointers.
//!
//! A checkpoint is the full [`SessionState`] of one thread, saved after
//! every turn and loaded at the start of the next.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use sv_domain::error::{Error, Result};
use sv_domain::state::SessionState;
use sv_domain::trace::TraceEvent;

#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<SessionState>>;
    async fn save(&self, thread_id: &str, state: &SessionState) -> Result<()>;
}

/// Map a thread id to a safe file stem. Ids made only of ASCII
/// alphanumerics, `-` and `_` are used as-is; anything else is replaced and
/// suffixed with a hash of the original so distinct ids never collide.
pub fn thread_file_stem(thread_id: &str) -> Result<String> {
    if thread_id.is_empty() {
        return Err(Error::Checkpoint("thread id must not be empty".into()));
    }
    let clean = thread_id.len() <= 128
        && thread_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if clean {
        return Ok(thread_id.to_string());
    }

    let mut stem: String = thread_id
        .chars()
        .take(64)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = Sha256::digest(thread_id.as_bytes());
    stem.push('-');
    for byte in &digest[..8] {
        stem.push_str(&format!("{byte:02x}"));
    }
    Ok(stem)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File-backed
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// One JSON document per thread under `dir`, with a write-through cache of
/// the most recently used threads. Writes go to a temp file in the same
/// directory and are renamed into place, so a crash never leaves a
/// half-written checkpoint.
pub struct FileCheckpointer {
    dir: PathBuf,
    cache: RwLock<CheckpointCache>,
}

impl FileCheckpointer {
    pub fn new(dir: &Path) -> Result<Self> {
        Self::with_cache_capacity(dir, DEFAULT_CACHE_CAPACITY)
    }

    /// `capacity` 0 disables the cache; every load reads the file.
    pub fn with_cache_capacity(dir: &Path, capacity: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            cache: RwLock::new(CheckpointCache::new(capacity)),
        })
    }

    /// Number of checkpoints currently held in memory.
    pub fn cached(&self) -> usize {
        self.cache.read().entries.len()
    }

    fn path_for(&self, thread_id: &str) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}.json", thread_file_stem(thread_id)?)))
    }
}

/// Least-recently-used map of thread id to state. Eviction removes the
/// entry with the oldest use stamp.
struct CheckpointCache {
    capacity: usize,
    tick: u64,
    entries: HashMap<String, (u64, SessionState)>,
}

impl CheckpointCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tick: 0,
            entries: HashMap::new(),
        }
    }

    fn get(&mut self, thread_id: &str) -> Option<SessionState> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(thread_id).map(|(used, state)| {
            *used = tick;
            state.clone()
        })
    }

    fn insert(&mut self, thread_id: &str, state: &SessionState) {
        if self.capacity == 0 {
            return;
        }
        self.tick += 1;
        self.entries
            .insert(thread_id.to_string(), (self.tick, state.clone()));
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, (used, _))| *used)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    self.entries.remove(&id);
                }
                None => break,
            }
        }
    }
}

fn read_checkpoint(path: &Path) -> Result<Option<SessionState>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Checkpoint(format!("reading {}: {e}", path.display()))),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| Error::Checkpoint(format!("corrupt checkpoint {}: {e}", path.display())))
}

fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| Error::Checkpoint(format!("creating temp file: {e}")))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| Error::Checkpoint(format!("writing checkpoint: {e}")))?;
    tmp.persist(path)
        .map_err(|e| Error::Checkpoint(format!("renaming checkpoint: {e}")))?;
    Ok(())
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn load(&self, thread_id: &str) -> Result<Option<SessionState>> {
        if let Some(state) = self.cache.write().get(thread_id) {
            return Ok(Some(state));
        }

        let path = self.path_for(thread_id)?;
        let loaded = tokio::task::spawn_blocking(move || read_checkpoint(&path))
            .await
            .map_err(|e| Error::Checkpoint(format!("spawn_blocking join: {e}")))??;

        if let Some(state) = &loaded {
            self.cache.write().insert(thread_id, state);
        }
        Ok(loaded)
    }

    async fn save(&self, thread_id: &str, state: &SessionState) -> Result<()> {
        let start = Instant::now();
        let path = self.path_for(thread_id)?;
        let dir = self.dir.clone();
        let bytes = serde_json::to_vec_pretty(state)?;

        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &bytes))
            .await
            .map_err(|e| Error::Checkpoint(format!("spawn_blocking join: {e}")))??;

        self.cache.write().insert(thread_id, state);

        TraceEvent::CheckpointSaved {
            thread_id: thread_id.to_string(),
            messages: state.messages.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct MemoryCheckpointer {
    threads: RwLock<HashMap<String, SessionState>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.threads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.read().is_empty()
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn load(&self, thread_id: &str) -> Result<Option<SessionState>> {
        Ok(self.threads.read().get(thread_id).cloned())
    }

    async fn save(&self, thread_id: &str, state: &SessionState) -> Result<()> {
        self.threads
            .write()
            .insert(thread_id.to_string(), state.clone());
        Ok(())
    }
}
