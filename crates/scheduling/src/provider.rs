use async_trait::async_trait;
use sv_domain::error::Result;

use crate::types::{EventType, HealthStatus};

#[async_trait]
pub trait SchedulingApi: Send + Sync {
    /// Whether the API is reachable and the credentials are accepted.
    /// Transport failures surface as `Err`; callers treat both as unhealthy.
    async fn health_check(&self) -> Result<HealthStatus>;

    async fn list_event_types(&self) -> Result<Vec<EventType>>;
}
