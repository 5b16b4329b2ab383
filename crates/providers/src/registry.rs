//! Provider registry and per-node model bindings.
//!
//! Providers are built once from `[llm.providers]`; each pipeline step then
//! asks for a [`NodeBinding`] that pins the provider, model and sampling
//! settings configured under `[llm.nodes.<role>]`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sv_domain::config::{LlmConfig, LlmStartupPolicy, NodeModels, NodeRole, ProviderKind};
use sv_domain::error::{Error, Result};
use sv_domain::message::Message;
use sv_domain::stream::{BoxStream, StreamEvent};
use sv_domain::trace::TraceEvent;
use tracing::Instrument;

use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::{ChatRequest, EmbeddingsRequest, LlmProvider};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    /// Registration order; the first entry is the fallback provider.
    order: Vec<String>,
    nodes: NodeModels,
    timeout: Duration,
}

impl ProviderRegistry {
    /// Instantiate every configured provider. Providers that fail to
    /// initialize are logged and skipped unless the startup policy demands
    /// at least one.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.default_timeout_ms);
        let mut registry = Self::empty(config.nodes.clone(), timeout);

        for pc in &config.providers {
            let result = match pc.kind {
                ProviderKind::OpenaiCompat | ProviderKind::AzureOpenai => {
                    OpenAiCompatProvider::from_config(pc, timeout)
                        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
            };
            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, kind = ?pc.kind, "registered LLM provider");
                    registry.insert(provider);
                }
                Err(e) => {
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %e,
                        "failed to initialize LLM provider, skipping"
                    );
                }
            }
        }

        if registry.is_empty() {
            if config.startup_policy == LlmStartupPolicy::RequireOne {
                return Err(Error::Config(
                    "no LLM provider initialized and startup_policy = require_one".into(),
                ));
            }
            tracing::warn!("no LLM providers initialized; LLM-backed steps will degrade");
        }

        Ok(registry)
    }

    pub fn empty(nodes: NodeModels, timeout: Duration) -> Self {
        Self {
            providers: HashMap::new(),
            order: Vec::new(),
            nodes,
            timeout,
        }
    }

    /// Build a registry around already-constructed providers.
    pub fn from_providers(providers: Vec<Arc<dyn LlmProvider>>, nodes: NodeModels) -> Self {
        let mut registry = Self::empty(nodes, Duration::from_secs(20));
        for p in providers {
            registry.insert(p);
        }
        registry
    }

    pub fn insert(&mut self, provider: Arc<dyn LlmProvider>) {
        let id = provider.provider_id().to_string();
        if !self.providers.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.providers.insert(id, provider);
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    fn resolve(&self, provider_id: Option<&str>) -> Option<Arc<dyn LlmProvider>> {
        match provider_id {
            Some(id) => self.get(id),
            None => self.order.first().and_then(|id| self.get(id)),
        }
    }

    /// The provider and settings for one pipeline step, or `None` when no
    /// provider is available.
    pub fn for_node(&self, role: NodeRole) -> Option<NodeBinding> {
        let node = self.nodes.get(role);
        let provider = self.resolve(node.provider.as_deref())?;
        Some(NodeBinding {
            role,
            provider,
            model: node.model.clone(),
            temperature: node.temperature.unwrap_or_else(|| role.default_temperature()),
            max_tokens: node.max_tokens,
            timeout: self.timeout,
        })
    }

    pub fn embedder(&self) -> Option<Embedder> {
        let cfg = &self.nodes.embedder;
        let provider = self.resolve(cfg.provider.as_deref())?;
        Some(Embedder {
            provider,
            model: cfg.model.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn list_providers(&self) -> Vec<String> {
        self.order.clone()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Node bindings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider pinned to one pipeline step's model settings.
#[derive(Clone)]
pub struct NodeBinding {
    pub role: NodeRole,
    pub provider: Arc<dyn LlmProvider>,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl NodeBinding {
    pub fn request(&self, messages: Vec<Message>, json_mode: bool) -> ChatRequest {
        ChatRequest {
            messages,
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
            json_mode,
            model: self.model.clone(),
        }
    }

    fn model_label(&self) -> String {
        self.model.clone().unwrap_or_else(|| "default".into())
    }

    /// Run a completion under the binding's deadline and return its text.
    pub async fn complete(&self, messages: Vec<Message>, json_mode: bool) -> Result<String> {
        let req = self.request(messages, json_mode);
        let span = tracing::info_span!(
            "llm.call",
            node = self.role.as_str(),
            provider = self.provider.provider_id(),
            model = %self.model_label(),
        );
        let started = Instant::now();

        let resp = tokio::time::timeout(self.timeout, self.provider.chat(&req))
            .instrument(span)
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "{} call exceeded {}ms",
                    self.role.as_str(),
                    self.timeout.as_millis()
                ))
            })??;

        TraceEvent::LlmRequest {
            provider: self.provider.provider_id().to_string(),
            model: resp.model.clone(),
            node: self.role.as_str().into(),
            streaming: false,
            duration_ms: started.elapsed().as_millis() as u64,
            prompt_tokens: resp.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: resp.usage.as_ref().map(|u| u.completion_tokens),
        }
        .emit();

        Ok(resp.content)
    }

    /// Open a token stream. Only establishing the stream is bounded by the
    /// deadline; consumers enforce their own pacing.
    pub async fn stream(
        &self,
        messages: Vec<Message>,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let req = self.request(messages, false);
        let started = Instant::now();
        let stream = tokio::time::timeout(self.timeout, self.provider.chat_stream(&req))
            .await
            .map_err(|_| Error::Timeout(format!("{} stream open timed out", self.role.as_str())))??;

        TraceEvent::LlmRequest {
            provider: self.provider.provider_id().to_string(),
            model: self.model_label(),
            node: self.role.as_str().into(),
            streaming: true,
            duration_ms: started.elapsed().as_millis() as u64,
            prompt_tokens: None,
            completion_tokens: None,
        }
        .emit();

        Ok(stream)
    }
}

/// The embedding model used for retrieval queries.
#[derive(Clone)]
pub struct Embedder {
    pub provider: Arc<dyn LlmProvider>,
    pub model: String,
}

impl Embedder {
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let resp = self
            .provider
            .embeddings(EmbeddingsRequest {
                input: vec![text.to_string()],
                model: Some(self.model.clone()),
            })
            .await?;
        resp.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider {
                provider: self.provider.provider_id().to_string(),
                message: "embeddings response was empty".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use sv_domain::config::NodeModelConfig;

    #[test]
    fn node_falls_back_to_first_provider() {
        let registry = ProviderRegistry::from_providers(
            vec![
                Arc::new(ScriptedProvider::replying("a").named("first")),
                Arc::new(ScriptedProvider::replying("b").named("second")),
            ],
            NodeModels::default(),
        );
        let binding = registry.for_node(NodeRole::Grader).unwrap();
        assert_eq!(binding.provider.provider_id(), "first");
        assert_eq!(binding.temperature, 0.0);
    }

    #[test]
    fn explicit_node_provider_and_temperature() {
        let mut nodes = NodeModels::default();
        nodes.generator = NodeModelConfig {
            provider: Some("second".into()),
            model: Some("big".into()),
            temperature: Some(0.2),
            max_tokens: Some(300),
        };
        let registry = ProviderRegistry::from_providers(
            vec![
                Arc::new(ScriptedProvider::replying("a").named("first")),
                Arc::new(ScriptedProvider::replying("b").named("second")),
            ],
            nodes,
        );
        let binding = registry.for_node(NodeRole::Generator).unwrap();
        assert_eq!(binding.provider.provider_id(), "second");
        let req = binding.request(vec![Message::user("x")], false);
        assert_eq!(req.model.as_deref(), Some("big"));
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(req.max_tokens, Some(300));
    }

    #[test]
    fn empty_registry_has_no_bindings() {
        let registry = ProviderRegistry::from_providers(Vec::new(), NodeModels::default());
        assert!(registry.for_node(NodeRole::Generator).is_none());
        assert!(registry.embedder().is_none());
    }

    #[test]
    fn require_one_policy_fails_without_providers() {
        let cfg = LlmConfig {
            startup_policy: LlmStartupPolicy::RequireOne,
            ..Default::default()
        };
        assert!(ProviderRegistry::from_config(&cfg).is_err());
        assert!(ProviderRegistry::from_config(&LlmConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn complete_returns_text() {
        let registry = ProviderRegistry::from_providers(
            vec![Arc::new(ScriptedProvider::replying("0.9"))],
            NodeModels::default(),
        );
        let binding = registry.for_node(NodeRole::Grader).unwrap();
        let text = binding.complete(vec![Message::user("q")], false).await.unwrap();
        assert_eq!(text, "0.9");
    }

    #[tokio::test]
    async fn stream_tokens_concatenate_to_reply() {
        let registry = ProviderRegistry::from_providers(
            vec![Arc::new(ScriptedProvider::replying("The villas face the sea."))],
            NodeModels::default(),
        );
        let binding = registry.for_node(NodeRole::Generator).unwrap();
        let mut stream = binding.stream(vec![Message::user("q")]).await.unwrap();

        let mut text = String::new();
        let mut done = false;
        while let Some(event) = futures_util::StreamExt::next(&mut stream).await {
            match event.unwrap() {
                StreamEvent::Token { text: t } => text.push_str(&t),
                StreamEvent::Done { .. } => done = true,
                StreamEvent::Error { message } => panic!("{message}"),
            }
        }
        assert!(done);
        assert_eq!(text, "The villas face the sea.");
    }
}
