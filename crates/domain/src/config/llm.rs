use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM providers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub startup_policy: LlmStartupPolicy,
    /// Registered providers. The first one is the fallback for any node
    /// without an explicit `provider`.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub nodes: NodeModels,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: d_timeout_ms(),
            max_retries: d_max_retries(),
            startup_policy: LlmStartupPolicy::default(),
            providers: Vec::new(),
            nodes: NodeModels::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    /// Boot without providers; every LLM-backed step degrades.
    #[default]
    AllowNone,
    RequireOne,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
    /// Azure `api-version` query parameter.
    #[serde(default)]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    OpenaiCompat,
    AzureOpenai,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Header name, defaults to `Authorization`.
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix, defaults to `Bearer `.
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub env: Option<String>,
    /// Plaintext key. Accepted, but a warning is logged.
    #[serde(default)]
    pub key: Option<String>,
    /// Keychain service name.
    #[serde(default)]
    pub service: Option<String>,
    /// Keychain account name.
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    ApiKey,
    Keychain,
    None,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-node model settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pipeline steps that call a chat model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Grader,
    Reformulator,
    Generator,
    Extractor,
    Analyst,
}

impl NodeRole {
    pub const ALL: [NodeRole; 5] = [
        NodeRole::Grader,
        NodeRole::Reformulator,
        NodeRole::Generator,
        NodeRole::Extractor,
        NodeRole::Analyst,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::Grader => "grader",
            NodeRole::Reformulator => "reformulator",
            NodeRole::Generator => "generator",
            NodeRole::Extractor => "extractor",
            NodeRole::Analyst => "analyst",
        }
    }

    /// Scoring and extraction want deterministic output; the generator
    /// gets a conversational temperature.
    pub fn default_temperature(self) -> f32 {
        match self {
            NodeRole::Grader | NodeRole::Extractor | NodeRole::Analyst => 0.0,
            NodeRole::Reformulator => 0.3,
            NodeRole::Generator => 0.7,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeModelConfig {
    /// Provider id; the first registered provider when unset.
    #[serde(default)]
    pub provider: Option<String>,
    /// Model name; the provider's default model when unset.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeModels {
    #[serde(default)]
    pub grader: NodeModelConfig,
    #[serde(default)]
    pub reformulator: NodeModelConfig,
    #[serde(default)]
    pub generator: NodeModelConfig,
    #[serde(default)]
    pub extractor: NodeModelConfig,
    #[serde(default)]
    pub analyst: NodeModelConfig,
    #[serde(default)]
    pub embedder: EmbedderConfig,
}

impl NodeModels {
    pub fn get(&self, role: NodeRole) -> &NodeModelConfig {
        match role {
            NodeRole::Grader => &self.grader,
            NodeRole::Reformulator => &self.reformulator,
            NodeRole::Generator => &self.generator,
            NodeRole::Extractor => &self.extractor,
            NodeRole::Analyst => &self.analyst,
        }
    }

    pub fn get_mut(&mut self, role: NodeRole) -> &mut NodeModelConfig {
        match role {
            NodeRole::Grader => &mut self.grader,
            NodeRole::Reformulator => &mut self.reformulator,
            NodeRole::Generator => &mut self.generator,
            NodeRole::Extractor => &mut self.extractor,
            NodeRole::Analyst => &mut self.analyst,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "d_embedding_model")]
    pub model: String,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: d_embedding_model(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_timeout_ms() -> u64 {
    20_000
}
fn d_max_retries() -> u32 {
    2
}
fn d_embedding_model() -> String {
    "text-embedding-3-small".into()
}
