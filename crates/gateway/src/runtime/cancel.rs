//! Per-thread cancellation tokens.
//!
//! Each running turn gets a `CancelToken`. Calling `cancel()` on it signals
//! the graph to stop between nodes and the generator to stop mid-stream.
//! A stopped turn still commits whatever text was produced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cancellation token that can be polled or awaited.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Signal cancellation and wake every waiter.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once `cancel()` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the token of the turn currently running on each thread.
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl Default for CancelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelMap {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Create and register a new cancel token for a thread.
    pub fn register(&self, thread_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(thread_id.to_owned(), token.clone());
        token
    }

    /// Cancel the running turn for a thread. Returns true if one was found.
    pub fn cancel(&self, thread_id: &str) -> bool {
        match self.tokens.lock().get(thread_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove the token for a thread (called when a turn completes).
    pub fn remove(&self, thread_id: &str) {
        self.tokens.lock().remove(thread_id);
    }

    pub fn is_running(&self, thread_id: &str) -> bool {
        self.tokens.lock().contains_key(thread_id)
    }
}
