//! Scheduling fake with call counters.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use sv_domain::error::{Error, Result};

use crate::provider::SchedulingApi;
use crate::types::{EventType, HealthStatus};

pub struct FakeScheduling {
    pub healthy: bool,
    pub reachable: bool,
    pub events: Vec<EventType>,
    health_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl FakeScheduling {
    pub fn healthy() -> Self {
        Self::with_events(vec![EventType {
            name: "Villa Consultation".into(),
            active: true,
            duration: Some(30),
            description: Some("Private consultation with our sales team".into()),
            scheduling_url: "https://calendly.com/skypearls/villa-consultation".into(),
        }])
    }

    pub fn with_events(events: Vec<EventType>) -> Self {
        Self {
            healthy: true,
            reachable: true,
            events,
            health_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::healthy()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::healthy()
        }
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchedulingApi for FakeScheduling {
    async fn health_check(&self) -> Result<HealthStatus> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if !self.reachable {
            return Err(Error::Timeout("scheduling API timed out".into()));
        }
        Ok(HealthStatus {
            healthy: self.healthy,
            checked_at: Utc::now(),
        })
    }

    async fn list_event_types(&self) -> Result<Vec<EventType>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.reachable {
            return Err(Error::Timeout("scheduling API timed out".into()));
        }
        Ok(self.events.clone())
    }
}
