use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use sv_domain::error::{Error, Result};

use crate::{EmailMessage, Notifier};

/// Records every delivered message; optionally fails every send.
#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    attempts: AtomicUsize,
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, msg: EmailMessage) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Notify("smtp relay down".into()));
        }
        self.sent.lock().push(msg);
        Ok(())
    }
}
