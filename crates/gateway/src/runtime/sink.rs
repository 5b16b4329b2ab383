//! Per-turn token sink.
//!
//! Tokens travel over the turn's bounded event channel in generation
//! order. A send that cannot complete within the emit timeout means the
//! consumer is stalled or gone: the sink detaches and trips the turn's
//! cancel token so generation stops promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use super::cancel::CancelToken;
use super::turn::TurnEvent;

pub struct TokenSink {
    tx: mpsc::Sender<TurnEvent>,
    message_id: String,
    emit_timeout: Duration,
    cancel: CancelToken,
    detached: AtomicBool,
}

impl TokenSink {
    pub fn new(
        tx: mpsc::Sender<TurnEvent>,
        message_id: impl Into<String>,
        emit_timeout: Duration,
        cancel: CancelToken,
    ) -> Self {
        Self {
            tx,
            message_id: message_id.into(),
            emit_timeout,
            cancel,
            detached: AtomicBool::new(false),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Push one token. Returns `false` once the consumer is gone.
    pub async fn token(&self, text: &str) -> bool {
        if text.is_empty() {
            return !self.is_detached();
        }
        if self.is_detached() {
            return false;
        }

        let event = TurnEvent::Token {
            message_id: self.message_id.clone(),
            text: text.to_string(),
        };
        match tokio::time::timeout(self.emit_timeout, self.tx.send(event)).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => self.detach("consumer disconnected"),
            Err(_) => self.detach("consumer stalled"),
        }
    }

    /// Push canned text word by word. Concatenating the pushed tokens
    /// reproduces `text` exactly.
    pub async fn words(&self, text: &str) -> bool {
        for word in text.split_inclusive(' ') {
            if !self.token(word).await {
                return false;
            }
        }
        true
    }

    fn detach(&self, reason: &str) -> bool {
        if !self.detached.swap(true, Ordering::AcqRel) {
            tracing::warn!(message_id = %self.message_id, reason, "token sink detached, cancelling turn");
            self.cancel.cancel();
        }
        false
    }
}
