//! REST vector-index client.
//!
//! Embeds the query with the configured embedding model, then calls
//! `POST {base_url}/rest/v1/rpc/{match_function}` with retry and
//! exponential back-off on transient (5xx / timeout) failures.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use sv_domain::config::RetrievalConfig;
use sv_domain::error::{Error, Result};
use sv_domain::state::Document;
use sv_domain::trace::TraceEvent;
use sv_providers::util::from_reqwest;
use sv_providers::Embedder;
use uuid::Uuid;

use crate::provider::KnowledgeRetriever;
use crate::types::{MatchRequest, MatchRow};

#[derive(Clone)]
pub struct VectorIndexClient {
    http: Client,
    rpc_url: String,
    api_key: Option<String>,
    filter: Option<serde_json::Value>,
    embedder: Embedder,
    max_retries: u32,
}

impl VectorIndexClient {
    pub fn new(cfg: &RetrievalConfig, embedder: Embedder) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        let index = &cfg.vector_index;
        let api_key = std::env::var(&index.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %index.api_key_env,
                "vector index key not set; sending unauthenticated requests"
            );
        }

        Ok(Self {
            http,
            rpc_url: format!(
                "{}/rest/v1/rpc/{}",
                index.base_url.trim_end_matches('/'),
                index.match_function
            ),
            api_key,
            filter: index.filter.clone(),
            embedder,
            max_retries: cfg.max_retries,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        let rb = rb.header("X-Request-Id", Uuid::new_v4().to_string());
        match &self.api_key {
            Some(key) => rb.header("apikey", key).bearer_auth(key),
            None => rb,
        }
    }

    /// Send with retry. 5xx and transport errors are retried with
    /// 100ms·2ⁿ back-off; 4xx is returned immediately.
    async fn execute_with_retry(
        &self,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt - 1))).await;
            }

            let start = Instant::now();
            let result = self.decorate(build_request()).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let resp = match result {
                Ok(resp) => resp,
                Err(e) => {
                    TraceEvent::RetrievalCall {
                        endpoint: self.rpc_url.clone(),
                        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                        results: 0,
                        duration_ms,
                    }
                    .emit();
                    last_err = Some(from_reqwest(e));
                    continue;
                }
            };

            let status = resp.status();
            if status.is_success() {
                return Ok(resp);
            }

            TraceEvent::RetrievalCall {
                endpoint: self.rpc_url.clone(),
                status: status.as_u16(),
                results: 0,
                duration_ms,
            }
            .emit();
            let body = resp.text().await.unwrap_or_default();

            if status.is_server_error() {
                last_err = Some(Error::Retrieval(format!(
                    "vector index returned {}: {body}",
                    status.as_u16()
                )));
                continue;
            }
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(Error::Auth(format!(
                    "vector index rejected credentials ({})",
                    status.as_u16()
                )));
            }
            return Err(Error::Retrieval(format!(
                "vector index returned {}: {body}",
                status.as_u16()
            )));
        }

        Err(last_err.unwrap_or_else(|| Error::Retrieval("all retries exhausted".into())))
    }
}

#[async_trait]
impl KnowledgeRetriever for VectorIndexClient {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| Error::Retrieval(format!("query embedding failed: {e}")))?;

        let body = serde_json::to_value(MatchRequest {
            query_embedding: &embedding,
            match_count: k,
            filter: self.filter.as_ref(),
        })?;

        let start = Instant::now();
        let resp = self
            .execute_with_retry(|| self.http.post(&self.rpc_url).json(&body))
            .await?;
        let status = resp.status().as_u16();
        let rows: Vec<MatchRow> = resp
            .json()
            .await
            .map_err(|e| Error::Retrieval(format!("failed to parse match response: {e}")))?;

        TraceEvent::RetrievalCall {
            endpoint: self.rpc_url.clone(),
            status,
            results: rows.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();

        Ok(rows.into_iter().take(k).map(Document::from).collect())
    }
}
