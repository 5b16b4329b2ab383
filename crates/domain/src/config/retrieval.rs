use serde::{Deserialize, Serialize};

/// Knowledge retrieval and the retrieve/grade/reformulate loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Passages returned per search.
    #[serde(default = "d_k")]
    pub k: usize,
    /// Documents graded strictly above this are good enough to answer from.
    #[serde(default = "d_threshold")]
    pub relevance_threshold: f32,
    /// Total retrievals allowed per turn, counting the first one. Once
    /// reached, a weak grade routes to a best-effort answer instead of
    /// another reformulation.
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// Characters of each weak passage shown to the reformulator.
    #[serde(default = "d_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default)]
    pub vector_index: VectorIndexConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: d_k(),
            relevance_threshold: d_threshold(),
            max_attempts: d_max_attempts(),
            timeout_ms: d_timeout_ms(),
            max_retries: d_max_retries(),
            snippet_chars: d_snippet_chars(),
            vector_index: VectorIndexConfig::default(),
        }
    }
}

/// REST vector index exposing a similarity-match RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// RPC name, called as `POST {base_url}/rest/v1/rpc/{match_function}`.
    #[serde(default = "d_match_function")]
    pub match_function: String,
    #[serde(default = "d_key_env")]
    pub api_key_env: String,
    /// Optional metadata filter passed through to the RPC.
    #[serde(default)]
    pub filter: Option<serde_json::Value>,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            match_function: d_match_function(),
            api_key_env: d_key_env(),
            filter: None,
        }
    }
}

fn d_k() -> usize {
    4
}
fn d_threshold() -> f32 {
    0.7
}
fn d_max_attempts() -> u32 {
    3
}
fn d_timeout_ms() -> u64 {
    10_000
}
fn d_max_retries() -> u32 {
    2
}
fn d_snippet_chars() -> usize {
    200
}
fn d_base_url() -> String {
    "http://localhost:54321".into()
}
fn d_match_function() -> String {
    "match_documents".into()
}
fn d_key_env() -> String {
    "SV_VECTOR_INDEX_KEY".into()
}
