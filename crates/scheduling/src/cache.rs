//! Read-mostly TTL cache shared by every conversation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use sv_domain::error::Result;
use sv_domain::trace::TraceEvent;

use crate::provider::SchedulingApi;
use crate::types::{EventType, HealthStatus};

struct Entry<T> {
    value: T,
    stored_at: Instant,
}

/// Caches successful health checks and event-type listings for `ttl`.
/// Failures are never cached.
pub struct CachedScheduling<S> {
    inner: S,
    ttl: Duration,
    health: RwLock<Option<Entry<HealthStatus>>>,
    events: RwLock<Option<Entry<Vec<EventType>>>>,
}

impl<S: SchedulingApi> CachedScheduling<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            health: RwLock::new(None),
            events: RwLock::new(None),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop both cached results.
    pub fn invalidate(&self) {
        *self.health.write() = None;
        *self.events.write() = None;
    }

    fn fresh<T: Clone>(&self, slot: &RwLock<Option<Entry<T>>>) -> Option<T> {
        let guard = slot.read();
        guard
            .as_ref()
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| e.value.clone())
    }

    fn record_hit(operation: &str) {
        TraceEvent::ExternalCall {
            service: "scheduling".into(),
            operation: operation.into(),
            ok: true,
            cache_hit: true,
            duration_ms: 0,
        }
        .emit();
    }
}

#[async_trait]
impl<S: SchedulingApi> SchedulingApi for CachedScheduling<S> {
    async fn health_check(&self) -> Result<HealthStatus> {
        if let Some(hit) = self.fresh(&self.health) {
            Self::record_hit("health_check");
            return Ok(hit);
        }
        let status = self.inner.health_check().await?;
        *self.health.write() = Some(Entry {
            value: status.clone(),
            stored_at: Instant::now(),
        });
        Ok(status)
    }

    async fn list_event_types(&self) -> Result<Vec<EventType>> {
        if let Some(hit) = self.fresh(&self.events) {
            Self::record_hit("list_event_types");
            return Ok(hit);
        }
        let events = self.inner.list_event_types().await?;
        *self.events.write() = Some(Entry {
            value: events.clone(),
            stored_at: Instant::now(),
        });
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeScheduling;

    #[tokio::test]
    async fn second_call_within_ttl_is_served_from_cache() {
        let cached = CachedScheduling::new(FakeScheduling::healthy(), Duration::from_secs(300));
        cached.health_check().await.unwrap();
        cached.health_check().await.unwrap();
        cached.list_event_types().await.unwrap();
        cached.list_event_types().await.unwrap();
        assert_eq!(cached.inner().health_calls(), 1);
        assert_eq!(cached.inner().list_calls(), 1);
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches() {
        let cached = CachedScheduling::new(FakeScheduling::healthy(), Duration::ZERO);
        cached.list_event_types().await.unwrap();
        cached.list_event_types().await.unwrap();
        assert_eq!(cached.inner().list_calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cached = CachedScheduling::new(FakeScheduling::healthy(), Duration::from_secs(300));
        cached.health_check().await.unwrap();
        cached.invalidate();
        cached.health_check().await.unwrap();
        assert_eq!(cached.inner().health_calls(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cached = CachedScheduling::new(FakeScheduling::unreachable(), Duration::from_secs(300));
        assert!(cached.health_check().await.is_err());
        assert!(cached.health_check().await.is_err());
        assert_eq!(cached.inner().health_calls(), 2);
    }
}
