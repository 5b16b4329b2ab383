use serde::{Deserialize, Serialize};

/// OpenTelemetry export settings. With no `otlp_endpoint` only the JSON
/// log output is installed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// OTLP gRPC endpoint, e.g. `http://localhost:4317`.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "d_service_name")]
    pub service_name: String,
    /// Ratio-based trace sampling, `0.0..=1.0`.
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    #[serde(default = "d_log_filter")]
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
            log_filter: d_log_filter(),
        }
    }
}

fn d_service_name() -> String {
    "skypearls-concierge".into()
}
fn d_sample_rate() -> f64 {
    1.0
}
fn d_log_filter() -> String {
    "info,sv_gateway=debug".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_export() {
        let cfg: ObservabilityConfig = toml::from_str("").unwrap();
        assert!(cfg.otlp_endpoint.is_none());
        assert_eq!(cfg.service_name, "skypearls-concierge");
        assert_eq!(cfg.log_filter, "info,sv_gateway=debug");
    }

    #[test]
    fn parses_endpoint_and_rate() {
        let cfg: ObservabilityConfig = toml::from_str(
            r#"
            otlp_endpoint = "http://otel:4317"
            sample_rate = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(cfg.otlp_endpoint.as_deref(), Some("http://otel:4317"));
        assert!((cfg.sample_rate - 0.25).abs() < f64::EPSILON);
    }
}
