//! Per-thread turn serialization.
//!
//! Only one turn runs per thread at a time. A second message arriving
//! while a turn is in flight waits for the permit instead of merging
//! into the same state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Each thread id maps to a `Semaphore(1)`; holding the permit grants
/// exclusive access for one turn.
pub struct ThreadLocks {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for ThreadLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for the thread's turn permit. The permit releases on drop.
    pub async fn acquire(&self, thread_id: &str) -> Result<OwnedSemaphorePermit, ThreadBusy> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(thread_id.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };

        if let Ok(permit) = sem.clone().try_acquire_owned() {
            return Ok(permit);
        }
        tracing::debug!(thread_id, "turn in progress, waiting for thread lock");
        sem.acquire_owned().await.map_err(|_| ThreadBusy)
    }

    /// Number of tracked threads.
    pub fn thread_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop semaphores nobody holds or waits on.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| sem.available_permits() == 0 || Arc::strong_count(sem) > 1);
    }
}

/// The thread's semaphore was closed while waiting.
#[derive(Debug)]
pub struct ThreadBusy;

impl std::fmt::Display for ThreadBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "thread is busy: a turn is already in progress")
    }
}

impl std::error::Error for ThreadBusy {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_access() {
        let locks = ThreadLocks::new();
        let permit1 = locks.acquire("t1").await.unwrap();
        drop(permit1);
        let permit2 = locks.acquire("t1").await.unwrap();
        drop(permit2);
    }

    #[tokio::test]
    async fn different_threads_run_concurrently() {
        let locks = ThreadLocks::new();
        let p1 = locks.acquire("t1").await.unwrap();
        let p2 = locks.acquire("t2").await.unwrap();
        assert_eq!(locks.thread_count(), 2);
        drop(p1);
        drop(p2);
    }

    #[tokio::test]
    async fn same_thread_waits() {
        let locks = Arc::new(ThreadLocks::new());
        let locks2 = locks.clone();

        let p1 = locks.acquire("t1").await.unwrap();
        let handle = tokio::spawn(async move {
            let _p2 = locks2.acquire("t1").await.unwrap();
            42
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        drop(p1);

        assert_eq!(handle.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let locks = ThreadLocks::new();
        let held = locks.acquire("busy").await.unwrap();
        drop(locks.acquire("idle").await.unwrap());

        locks.prune_idle();
        assert_eq!(locks.thread_count(), 1);
        drop(held);
        locks.prune_idle();
        assert_eq!(locks.thread_count(), 0);
    }
}
