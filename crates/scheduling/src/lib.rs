//! Scheduling API integration for consultation bookings.

pub mod cache;
pub mod provider;
pub mod rest;
pub mod select;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use cache::CachedScheduling;
pub use provider::SchedulingApi;
pub use rest::RestSchedulingClient;
pub use select::select_consultation_event;
pub use types::{EventType, HealthStatus};
