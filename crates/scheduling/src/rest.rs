//! Calendly-style REST client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sv_domain::config::SchedulingConfig;
use sv_domain::error::{Error, Result};
use sv_domain::trace::TraceEvent;
use sv_providers::util::from_reqwest;

use crate::provider::SchedulingApi;
use crate::types::{EventType, HealthStatus};

pub struct RestSchedulingClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    /// Owner URI; configured, or learned from the first `users/me` call.
    user_uri: RwLock<Option<String>>,
}

// ── wire types ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct UserEnvelope {
    resource: UserResource,
}

#[derive(Deserialize)]
struct UserResource {
    uri: String,
}

#[derive(Deserialize)]
struct EventTypeCollection {
    #[serde(default)]
    collection: Vec<WireEventType>,
}

#[derive(Deserialize)]
struct WireEventType {
    name: String,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    duration: Option<u32>,
    #[serde(default)]
    description_plain: Option<String>,
    scheduling_url: String,
}

impl From<WireEventType> for EventType {
    fn from(w: WireEventType) -> Self {
        EventType {
            name: w.name,
            active: w.active,
            duration: w.duration,
            description: w.description_plain,
            scheduling_url: w.scheduling_url,
        }
    }
}

impl RestSchedulingClient {
    pub fn new(cfg: &SchedulingConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        let token = std::env::var(&cfg.token_env).ok().filter(|t| !t.is_empty());
        if token.is_none() {
            tracing::warn!(
                env = %cfg.token_env,
                "scheduling token not set; booking requests will use the contact fallback"
            );
        }
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            token,
            user_uri: RwLock::new(cfg.user_uri.clone()),
        })
    }

    async fn get(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| Error::Scheduling("scheduling token not configured".into()))?;

        let start = Instant::now();
        let result = self
            .http
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .bearer_auth(token)
            .send()
            .await;
        let ok = matches!(&result, Ok(r) if r.status().is_success());
        TraceEvent::ExternalCall {
            service: "scheduling".into(),
            operation: operation.into(),
            ok,
            cache_hit: false,
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();

        let resp = result.map_err(from_reqwest)?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Auth(format!("scheduling API rejected token ({status})")));
        }
        if !status.is_success() {
            return Err(Error::Scheduling(format!("{operation} returned {status}")));
        }
        Ok(resp)
    }

    async fn current_user_uri(&self) -> Result<String> {
        let resp = self.get("users_me", "/users/me", &[]).await?;
        let envelope: UserEnvelope = resp
            .json()
            .await
            .map_err(|e| Error::Scheduling(format!("bad users/me body: {e}")))?;
        Ok(envelope.resource.uri)
    }

    async fn user_uri(&self) -> Result<String> {
        let cached = self.user_uri.read().clone();
        if let Some(uri) = cached {
            return Ok(uri);
        }
        let uri = self.current_user_uri().await?;
        *self.user_uri.write() = Some(uri.clone());
        Ok(uri)
    }
}

#[async_trait]
impl SchedulingApi for RestSchedulingClient {
    async fn health_check(&self) -> Result<HealthStatus> {
        let uri = self.current_user_uri().await?;
        self.user_uri.write().get_or_insert(uri);
        Ok(HealthStatus {
            healthy: true,
            checked_at: Utc::now(),
        })
    }

    async fn list_event_types(&self) -> Result<Vec<EventType>> {
        let user = self.user_uri().await?;
        let resp = self
            .get(
                "list_event_types",
                "/event_types",
                &[("user", user.as_str()), ("active", "true")],
            )
            .await?;
        let body: EventTypeCollection = resp
            .json()
            .await
            .map_err(|e| Error::Scheduling(format!("bad event_types body: {e}")))?;
        Ok(body.collection.into_iter().map(EventType::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_event_type_maps_description() {
        let body: EventTypeCollection = serde_json::from_str(
            r#"{"collection":[{"name":"Villa Consultation","active":true,"duration":30,
                "description_plain":"Talk to sales","scheduling_url":"https://calendly.com/x/30min",
                "slug":"30min"}]}"#,
        )
        .unwrap();
        let ev: EventType = body.collection.into_iter().next().unwrap().into();
        assert_eq!(ev.description.as_deref(), Some("Talk to sales"));
        assert_eq!(ev.duration, Some(30));
        assert!(ev.active);
    }

    #[tokio::test]
    async fn missing_token_fails_without_network() {
        let cfg = SchedulingConfig {
            token_env: "SV_TEST_NO_SUCH_SCHEDULING_TOKEN".into(),
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        };
        let client = RestSchedulingClient::new(&cfg).unwrap();
        assert!(matches!(client.health_check().await, Err(Error::Scheduling(_))));
    }
}
