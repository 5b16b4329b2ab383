use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig as _;

use sv_domain::config::{Config, CorsConfig, ObservabilityConfig};
use sv_gateway::api;
use sv_gateway::bootstrap;
use sv_gateway::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            let (config, _config_path) = sv_gateway::cli::load_config()?;
            let tracer_provider = init_tracing(&config.observability);
            run_server(Arc::new(config), tracer_provider).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = sv_gateway::cli::load_config()?;
            if !sv_gateway::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = sv_gateway::cli::load_config()?;
            sv_gateway::cli::config::show(&config)
        }
        Some(Command::Run { message, thread, json }) => {
            init_cli_tracing();
            let (config, _) = sv_gateway::cli::load_config()?;
            sv_gateway::cli::run::run(Arc::new(config), message, thread, json).await
        }
        Some(Command::Chat { thread }) => {
            init_cli_tracing();
            let (config, _) = sv_gateway::cli::load_config()?;
            sv_gateway::cli::chat::chat(Arc::new(config), thread).await
        }
        Some(Command::Version) => {
            println!("skypearls {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// JSON tracing for `serve`, plus an OTLP export layer when
/// `observability.otlp_endpoint` is set. The returned provider is shut down
/// on exit so pending spans are flushed.
fn init_tracing(obs: &ObservabilityConfig) -> Option<opentelemetry_sdk::trace::SdkTracerProvider> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&obs.log_filter));

    let tracer_provider = obs
        .otlp_endpoint
        .as_deref()
        .and_then(|endpoint| otlp_tracer_provider(obs, endpoint));
    let otel_layer = tracer_provider
        .as_ref()
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer("skypearls")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .with(otel_layer)
        .init();

    tracer_provider
}

fn otlp_tracer_provider(
    obs: &ObservabilityConfig,
    endpoint: &str,
) -> Option<opentelemetry_sdk::trace::SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build();
    let exporter = match exporter {
        Ok(exporter) => exporter,
        Err(e) => {
            // The subscriber is not installed yet.
            eprintln!("WARNING: OTLP exporter for {endpoint} unavailable ({e}); spans stay local");
            return None;
        }
    };

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(obs.service_name.clone())
        .build();

    Some(
        opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(
                obs.sample_rate,
            ))
            .with_resource(resource)
            .build(),
    )
}

/// Compact stderr-only tracing for `run` and `chat`, `warn` by default so
/// logs never interleave with the streamed reply.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run_server(
    config: Arc<Config>,
    tracer_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
) -> anyhow::Result<()> {
    tracing::info!(brand = %config.brand.name, "skypearls starting");

    // ── Build shared state & spawn background loops ──────────────────
    let state = bootstrap::build_app_state(config.clone()).await?;
    bootstrap::spawn_background_tasks(&state);

    // ── CORS layer (config-aware) ────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);

    // ── Concurrency limit (backpressure protection) ────────────────
    let max_concurrent = config.server.max_concurrent_requests.max(1);
    tracing::info!(max_concurrent, "concurrency limit set");

    // ── Rate-limit layer (per-IP token bucket via governor) ─────────
    let governor_layer = config.server.rate_limit.as_ref().and_then(|rl| {
        use tower_governor::governor::GovernorConfigBuilder;
        use tower_governor::GovernorLayer;

        let Some(gov_config) = GovernorConfigBuilder::default()
            .per_second(rl.requests_per_second)
            .burst_size(rl.burst_size)
            .finish()
        else {
            tracing::warn!("rate_limit: requests_per_second and burst_size must be > 0; rate limiting disabled");
            return None;
        };

        tracing::info!(
            requests_per_second = rl.requests_per_second,
            burst_size = rl.burst_size,
            "per-IP rate limiting enabled"
        );
        Some(GovernorLayer {
            config: Arc::new(gov_config),
        })
    });
    if governor_layer.is_none() {
        tracing::info!("per-IP rate limiting disabled");
    }

    // ── Router ───────────────────────────────────────────────────────
    let router = api::router(state.clone())
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent));
    let app = match governor_layer {
        Some(gov) => router.layer(gov).with_state(state.clone()),
        None => router.with_state(state.clone()),
    };

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "skypearls listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("axum server error")?;

    // ── Post-shutdown flush ─────────────────────────────────────────
    tracing::info!("server stopped, flushing thread index...");

    let threads = state.threads.clone();
    match tokio::task::spawn_blocking(move || threads.flush()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "thread index flush on shutdown failed"),
        Err(e) => tracing::warn!(error = %e, "thread index flush task failed"),
    }

    if let Some(provider) = tracer_provider {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = ?e, "OpenTelemetry tracer provider shutdown failed");
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for SIGINT only");
                let _ = ctrl_c.await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may end in `:*` to match any port on that host. A lone `"*"`
/// allows every origin.
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\": all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            let origin_str = origin.to_str().unwrap_or("");
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
