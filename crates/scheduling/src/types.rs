use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub checked_at: DateTime<Utc>,
}

/// A bookable meeting type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventType {
    pub name: String,
    pub active: bool,
    /// Length in minutes.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    pub scheduling_url: String,
}
