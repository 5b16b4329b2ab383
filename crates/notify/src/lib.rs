//! Outbound email: sales-team alerts and lead transcripts.
//!
//! Sending is best-effort. [`dispatch`] runs the send on its own task and
//! only logs failures, so a slow or broken email API never affects a turn.

pub mod rest;
pub mod templates;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sv_domain::error::Result;
use sv_domain::trace::TraceEvent;

pub use rest::RestEmailNotifier;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub from: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, msg: EmailMessage) -> Result<()>;
}

/// Used when notifications are disabled.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, msg: EmailMessage) -> Result<()> {
        tracing::debug!(subject = %msg.subject, recipients = msg.to.len(), "notifications disabled, dropping email");
        Ok(())
    }
}

/// Fire-and-forget send. Failures are logged as degraded and never
/// propagate to the caller.
pub fn dispatch(notifier: Arc<dyn Notifier>, msg: EmailMessage) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let subject = msg.subject.clone();
        if msg.to.is_empty() {
            tracing::warn!(subject = %subject, "email has no recipients, skipping");
            return;
        }
        match notifier.send(msg).await {
            Ok(()) => tracing::info!(subject = %subject, "email sent"),
            Err(e) => {
                tracing::warn!(outcome = "degraded", subject = %subject, error = %e, "email send failed");
                TraceEvent::Degraded {
                    component: "notify".into(),
                    reason: e.to_string(),
                }
                .emit();
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingNotifier;

    fn msg(to: &[&str]) -> EmailMessage {
        EmailMessage {
            to: to.iter().map(|s| s.to_string()).collect(),
            from: "concierge@example.com".into(),
            subject: "Hot lead".into(),
            html: "<p>hi</p>".into(),
        }
    }

    #[tokio::test]
    async fn dispatch_delivers() {
        let notifier = Arc::new(RecordingNotifier::default());
        dispatch(notifier.clone(), msg(&["sales@example.com"]))
            .await
            .unwrap();
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn dispatch_swallows_failures() {
        let notifier = Arc::new(RecordingNotifier::failing());
        // The task completes normally even though the send failed.
        dispatch(notifier.clone(), msg(&["sales@example.com"]))
            .await
            .unwrap();
        assert_eq!(notifier.attempts(), 1);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn dispatch_skips_empty_recipients() {
        let notifier = Arc::new(RecordingNotifier::default());
        dispatch(notifier.clone(), msg(&[])).await.unwrap();
        assert_eq!(notifier.attempts(), 0);
    }
}
