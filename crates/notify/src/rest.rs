use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use sv_domain::config::NotifyConfig;
use sv_domain::error::{Error, Result};
use sv_domain::trace::TraceEvent;
use sv_providers::util::from_reqwest;

use crate::{EmailMessage, Notifier};

/// JSON email API client (`POST {api_url}` with a bearer key).
pub struct RestEmailNotifier {
    http: Client,
    api_url: String,
    api_key: String,
}

impl RestEmailNotifier {
    pub fn new(cfg: &NotifyConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env).map_err(|_| {
            Error::Config(format!(
                "notify.enabled is true but {} is not set",
                cfg.api_key_env
            ))
        })?;
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            http,
            api_url: cfg.api_url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Notifier for RestEmailNotifier {
    async fn send(&self, msg: EmailMessage) -> Result<()> {
        let start = Instant::now();
        let result = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&msg)
            .send()
            .await;

        let outcome = match result {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                Err(Error::Notify(format!("email API returned {status}: {body}")))
            }
            Err(e) => Err(from_reqwest(e)),
        };

        TraceEvent::ExternalCall {
            service: "email".into(),
            operation: "send".into(),
            ok: outcome.is_ok(),
            cache_hit: false,
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();
        outcome
    }
}
