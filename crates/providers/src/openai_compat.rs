//! OpenAI-compatible chat adapter.
//!
//! Covers OpenAI itself, Azure OpenAI, and self-hosted servers that speak
//! the chat completions contract (Ollama, vLLM, LM Studio).

use std::time::Duration;

use serde_json::Value;
use sv_domain::config::{AuthMode, ProviderConfig, ProviderKind};
use sv_domain::error::{Error, Result};
use sv_domain::message::Message;
use sv_domain::stream::{BoxStream, StreamEvent, Usage};

use crate::content::extract_text;
use crate::traits::{
    ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider,
};
use crate::util::{from_reqwest, resolve_api_key};

const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    /// `(header, value)`; `None` for unauthenticated local servers.
    auth: Option<(String, String)>,
    default_model: String,
    client: reqwest::Client,
    /// Azure puts the deployment in the URL and uses an `api-key` header.
    azure_api_version: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn from_config(cfg: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let is_azure = cfg.kind == ProviderKind::AzureOpenai;

        let auth = if cfg.auth.mode == AuthMode::None {
            None
        } else {
            let key = resolve_api_key(&cfg.auth)?;
            let (default_header, default_prefix) = if is_azure {
                ("api-key", "")
            } else {
                ("Authorization", "Bearer ")
            };
            let header = cfg
                .auth
                .header
                .clone()
                .unwrap_or_else(|| default_header.into());
            let prefix = cfg
                .auth
                .prefix
                .clone()
                .unwrap_or_else(|| default_prefix.into());
            Some((header, format!("{prefix}{key}")))
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            auth,
            default_model: cfg
                .default_model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".into()),
            client,
            azure_api_version: is_azure.then(|| {
                cfg.api_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.into())
            }),
        })
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(url);
        match &self.auth {
            Some((header, value)) => builder.header(header.as_str(), value.as_str()),
            None => builder,
        }
    }

    fn endpoint(&self, path: &str, model: &str) -> String {
        match &self.azure_api_version {
            Some(version) => format!(
                "{}/openai/deployments/{model}/{path}?api-version={version}",
                self.base_url
            ),
            None => format!("{}/{path}", self.base_url),
        }
    }

    fn model_for(&self, req: &ChatRequest) -> String {
        req.model.clone().unwrap_or_else(|| self.default_model.clone())
    }

    fn build_chat_body(&self, req: &ChatRequest, model: &str, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();
        let mut body = serde_json::json!({
            "messages": messages,
            "stream": stream,
        });
        if self.azure_api_version.is_none() {
            body["model"] = Value::String(model.to_string());
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if req.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }

    async fn send_json(&self, url: &str, body: &Value) -> Result<reqwest::Response> {
        let resp = self
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), truncate(&text, 500)),
            });
        }
        Ok(resp)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    serde_json::json!({
        "role": msg.role.as_str(),
        "content": msg.content,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(provider: &str, body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: provider.into(),
            message: "no choices in response".into(),
        })?;

    let content = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .map(extract_text)
        .unwrap_or_default();

    Ok(ChatResponse {
        content,
        usage: body.get("usage").and_then(parse_usage),
        model: body
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        finish_reason: choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(String::from),
    })
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

/// Map one SSE `data:` payload to stream events.
fn parse_sse_data(data: &str) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done {
            usage: None,
            finish_reason: Some("stop".into()),
        })];
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let Some(choice) = v
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
    else {
        // Trailing usage-only chunk.
        return match v.get("usage").and_then(parse_usage) {
            Some(usage) => vec![Ok(StreamEvent::Done {
                usage: Some(usage),
                finish_reason: None,
            })],
            None => Vec::new(),
        };
    };

    let mut events = Vec::new();
    if let Some(content) = choice.get("delta").and_then(|d| d.get("content")) {
        let text = extract_text(content);
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Token { text }));
        }
    }
    if let Some(fr) = choice.get("finish_reason").and_then(Value::as_str) {
        events.push(Ok(StreamEvent::Done {
            usage: v.get("usage").and_then(parse_usage),
            finish_reason: Some(fr.to_string()),
        }));
    }
    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let model = self.model_for(req);
        let url = self.endpoint("chat/completions", &model);
        let body = self.build_chat_body(req, &model, false);
        tracing::debug!(provider = %self.id, model = %model, "chat request");

        let resp = self.send_json(&url, &body).await?;
        let json: Value = resp.json().await.map_err(from_reqwest)?;
        parse_chat_response(&self.id, &json)
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let model = self.model_for(req);
        let url = self.endpoint("chat/completions", &model);
        let body = self.build_chat_body(req, &model, true);
        tracing::debug!(provider = %self.id, model = %model, "chat stream request");

        let resp = self.send_json(&url, &body).await?;
        Ok(crate::sse::sse_response_stream(resp, parse_sse_data))
    }

    async fn embeddings(&self, req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        let model = req.model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into());
        let url = self.endpoint("embeddings", &model);
        let body = if self.azure_api_version.is_some() {
            serde_json::json!({ "input": req.input })
        } else {
            serde_json::json!({ "model": model, "input": req.input })
        };

        let resp = self.send_json(&url, &body).await?;
        let json: Value = resp.json().await.map_err(from_reqwest)?;
        let data = json
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Provider {
                provider: self.id.clone(),
                message: "missing 'data' array in embeddings response".into(),
            })?;

        let embeddings = data
            .iter()
            .filter_map(|item| {
                let vector = item.get("embedding")?.as_array()?;
                Some(
                    vector
                        .iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect(),
                )
            })
            .collect();

        Ok(EmbeddingsResponse { embeddings })
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_and_block_content() {
        let plain = json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {"content": "0.85"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        });
        let resp = parse_chat_response("p", &plain).unwrap();
        assert_eq!(resp.content, "0.85");
        assert_eq!(resp.usage.unwrap().total_tokens, 12);

        let blocks = json!({
            "choices": [{"message": {"content": [{"type": "text", "text": "hi"}]}}]
        });
        assert_eq!(parse_chat_response("p", &blocks).unwrap().content, "hi");
    }

    #[test]
    fn missing_choices_is_provider_error() {
        let err = parse_chat_response("p", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }

    #[test]
    fn sse_token_then_finish() {
        let events = parse_sse_data(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#);
        assert!(matches!(&events[0], Ok(StreamEvent::Token { text }) if text == "Hel"));

        let events =
            parse_sse_data(r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":"stop"}]}"#);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], Ok(StreamEvent::Done { .. })));
    }

    #[test]
    fn sse_done_sentinel_and_usage_chunk() {
        assert!(matches!(
            parse_sse_data("[DONE]").as_slice(),
            [Ok(StreamEvent::Done { .. })]
        ));
        let events = parse_sse_data(
            r#"{"choices":[],"usage":{"prompt_tokens":1,"completion_tokens":1,"total_tokens":2}}"#,
        );
        assert!(matches!(
            events.as_slice(),
            [Ok(StreamEvent::Done { usage: Some(_), .. })]
        ));
    }

    #[test]
    fn sse_bad_json_is_error() {
        assert!(matches!(parse_sse_data("{oops").as_slice(), [Err(Error::Json(_))]));
    }

    #[test]
    fn azure_endpoint_layout() {
        let cfg = ProviderConfig {
            id: "azure".into(),
            kind: ProviderKind::AzureOpenai,
            base_url: "https://res.openai.azure.com/".into(),
            auth: sv_domain::config::AuthConfig {
                key: Some("k".into()),
                ..Default::default()
            },
            default_model: Some("gpt4o-deploy".into()),
            api_version: None,
        };
        let p = OpenAiCompatProvider::from_config(&cfg, Duration::from_secs(5)).unwrap();
        assert_eq!(
            p.endpoint("chat/completions", "gpt4o-deploy"),
            "https://res.openai.azure.com/openai/deployments/gpt4o-deploy/chat/completions?api-version=2024-10-21"
        );
        let (header, value) = p.auth.clone().unwrap();
        assert_eq!(header, "api-key");
        assert_eq!(value, "k");
    }
}
