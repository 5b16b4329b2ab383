use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Environment variable holding the bearer token for the chat and
    /// thread endpoints. When unset, the API is open (a warning is logged).
    #[serde(default = "d_api_token_env")]
    pub api_token_env: String,
    /// Maximum number of in-flight requests across the whole server.
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Per-IP token bucket. `None` disables rate limiting.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors: CorsConfig::default(),
            api_token_env: d_api_token_env(),
            max_concurrent_requests: d_max_concurrent(),
            rate_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u64,
    pub burst_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. A trailing `:*` matches any port on that host.
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_port() -> u16 {
    8787
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}
fn d_api_token_env() -> String {
    "SV_API_TOKEN".into()
}
fn d_max_concurrent() -> usize {
    256
}
