use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the personal access token.
    #[serde(default = "d_token_env")]
    pub token_env: String,
    /// Owner URI used to scope the event-type listing. Resolved from the
    /// `users/me` endpoint when unset.
    #[serde(default)]
    pub user_uri: Option<String>,
    #[serde(default = "d_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            token_env: d_token_env(),
            user_uri: None,
            cache_ttl_secs: d_cache_ttl(),
            timeout_ms: d_timeout_ms(),
        }
    }
}

fn d_base_url() -> String {
    "https://api.calendly.com".into()
}
fn d_token_env() -> String {
    "SV_SCHEDULING_TOKEN".into()
}
fn d_cache_ttl() -> u64 {
    300
}
fn d_timeout_ms() -> u64 {
    5_000
}
