use serde::{Deserialize, Serialize};

/// Outbound email (team alerts and lead transcripts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_api_url")]
    pub api_url: String,
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_from")]
    pub from: String,
    /// Sales team addresses alerted about hot leads.
    #[serde(default)]
    pub team_recipients: Vec<String>,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: d_api_url(),
            api_key_env: d_api_key_env(),
            from: d_from(),
            team_recipients: Vec::new(),
            timeout_ms: d_timeout_ms(),
        }
    }
}

fn d_api_url() -> String {
    "https://api.resend.com/emails".into()
}
fn d_api_key_env() -> String {
    "SV_EMAIL_API_KEY".into()
}
fn d_from() -> String {
    "Skypearls Villas <concierge@skypearlsvillas.com>".into()
}
fn d_timeout_ms() -> u64 {
    10_000
}
