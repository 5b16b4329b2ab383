mod brand;
mod llm;
mod notify;
mod observability;
mod qualification;
mod retrieval;
mod scheduling;
mod server;
mod sessions;

pub use brand::*;
pub use llm::*;
pub use notify::*;
pub use observability::*;
pub use qualification::*;
pub use retrieval::*;
pub use scheduling::*;
pub use server::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub qualification: QualificationConfig,
    #[serde(default)]
    pub brand: BrandConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Config {
    /// Apply `SV_*` environment overrides on top of the parsed file.
    pub fn apply_env_overrides(&mut self) -> Vec<ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Unparseable values are
    /// reported and leave the file value in place.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Vec<ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut issues = Vec::new();

        fn parsed<T: std::str::FromStr>(
            key: &str,
            raw: Option<String>,
            issues: &mut Vec<ConfigError>,
        ) -> Option<T> {
            let raw = raw?;
            match raw.trim().parse::<T>() {
                Ok(v) => Some(v),
                Err(_) => {
                    issues.push(ConfigError {
                        severity: ConfigSeverity::Warning,
                        field: key.into(),
                        message: format!("ignoring unparseable value {raw:?}"),
                    });
                    None
                }
            }
        }

        if let Some(k) = parsed("SV_RETRIEVAL_K", lookup("SV_RETRIEVAL_K"), &mut issues) {
            self.retrieval.k = k;
        }
        if let Some(t) = parsed(
            "SV_RELEVANCE_THRESHOLD",
            lookup("SV_RELEVANCE_THRESHOLD"),
            &mut issues,
        ) {
            self.retrieval.relevance_threshold = t;
        }
        if let Some(n) = parsed(
            "SV_RETRIEVAL_MAX_ATTEMPTS",
            lookup("SV_RETRIEVAL_MAX_ATTEMPTS"),
            &mut issues,
        ) {
            self.retrieval.max_attempts = n;
        }
        if let Some(model) = lookup("SV_GENERATOR_MODEL").filter(|m| !m.trim().is_empty()) {
            self.llm.nodes.generator.model = Some(model.trim().to_string());
        }
        if let Some(t) = parsed(
            "SV_GENERATOR_TEMPERATURE",
            lookup("SV_GENERATOR_TEMPERATURE"),
            &mut issues,
        ) {
            self.llm.nodes.generator.temperature = Some(t);
        }
        if let Some(ttl) = parsed(
            "SV_SCHEDULING_CACHE_TTL_SECS",
            lookup("SV_SCHEDULING_CACHE_TTL_SECS"),
            &mut issues,
        ) {
            self.scheduling.cache_ttl_secs = ttl;
        }
        if let Some(path) = lookup("SV_STATE_PATH").filter(|p| !p.trim().is_empty()) {
            self.sessions.state_path = path.trim().into();
        }

        issues
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return every issue found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.cors.allowed_origins.iter().any(|o| o == "*") {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins",
            ));
        }

        if self.llm.providers.is_empty() {
            errors.push(ConfigError::warning(
                "llm.providers",
                "no LLM providers configured; answers will use fallback templates",
            ));
        }
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].id"),
                    "provider id must not be empty",
                ));
            }
            if provider.base_url.is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].base_url"),
                    "provider base_url must not be empty",
                ));
            }
        }
        for role in NodeRole::ALL {
            let node = self.llm.nodes.get(role);
            if let Some(id) = &node.provider {
                if !self.llm.providers.iter().any(|p| &p.id == id) {
                    errors.push(ConfigError::error(
                        format!("llm.nodes.{}.provider", role.as_str()),
                        format!("unknown provider \"{id}\""),
                    ));
                }
            }
            if let Some(t) = node.temperature {
                if !(0.0..=2.0).contains(&t) {
                    errors.push(ConfigError::error(
                        format!("llm.nodes.{}.temperature", role.as_str()),
                        "temperature must be within 0.0..=2.0",
                    ));
                }
            }
        }

        if self.retrieval.k == 0 {
            errors.push(ConfigError::error("retrieval.k", "k must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.retrieval.relevance_threshold) {
            errors.push(ConfigError::error(
                "retrieval.relevance_threshold",
                "threshold must be within 0.0..=1.0",
            ));
        }
        if self.retrieval.max_attempts == 0 {
            errors.push(ConfigError::error(
                "retrieval.max_attempts",
                "at least one retrieval attempt is required",
            ));
        }
        if self.retrieval.vector_index.base_url.is_empty() {
            errors.push(ConfigError::error(
                "retrieval.vector_index.base_url",
                "base_url must not be empty",
            ));
        }

        if self.scheduling.cache_ttl_secs == 0 {
            errors.push(ConfigError::warning(
                "scheduling.cache_ttl_secs",
                "0 disables caching; every booking turn calls the scheduling API twice",
            ));
        }

        if self.notify.enabled && self.notify.team_recipients.is_empty() {
            errors.push(ConfigError::warning(
                "notify.team_recipients",
                "notifications enabled but no team recipients configured",
            ));
        }

        if self.sessions.stream_buffer == 0 {
            errors.push(ConfigError::error(
                "sessions.stream_buffer",
                "stream buffer must be at least 1",
            ));
        }

        let q = &self.qualification;
        if !(q.share_contact_score <= q.suggest_booking_score
            && q.suggest_booking_score <= q.notify_team_score)
        {
            errors.push(ConfigError::warning(
                "qualification",
                "action thresholds are expected to satisfy share_contact <= suggest_booking <= notify_team",
            ));
        }
        if q.notify_team_score > 100 || q.decision_stage_score > 100 {
            errors.push(ConfigError::error(
                "qualification",
                "score thresholds must be within 0..=100",
            ));
        }
        if !(0.0..=1.0).contains(&q.completion_threshold) {
            errors.push(ConfigError::error(
                "qualification.completion_threshold",
                "completion threshold must be within 0.0..=1.0",
            ));
        }

        if self.brand.name.trim().is_empty() {
            errors.push(ConfigError::error("brand.name", "brand name must not be empty"));
        }
        if self.brand.contact_number.trim().is_empty() {
            errors.push(ConfigError::error(
                "brand.contact_number",
                "contact number must not be empty",
            ));
        }
        if self.brand.images.location.urls.is_empty() {
            errors.push(ConfigError::warning(
                "brand.images.location.urls",
                "no location images configured",
            ));
        }

        errors
    }
}
