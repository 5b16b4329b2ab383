//! AppState construction and background-task spawning.
//!
//! `serve`, `run` and `chat` share [`build_app_state`] so every entry point
//! boots the same runtime.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sha2::{Digest, Sha256};

use sv_domain::config::{CheckpointBackend, Config, ConfigSeverity};
use sv_knowledge::{DisabledRetriever, KnowledgeRetriever, VectorIndexClient};
use sv_notify::{NoopNotifier, Notifier, RestEmailNotifier};
use sv_providers::ProviderRegistry;
use sv_scheduling::{CachedScheduling, RestSchedulingClient, SchedulingApi};
use sv_sessions::{Checkpointer, FileCheckpointer, MemoryCheckpointer, ThreadIndex, TranscriptWriter};

use crate::runtime::cancel::CancelMap;
use crate::runtime::graph::Graph;
use crate::runtime::session_lock::ThreadLocks;
use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }

    // ── LLM providers ────────────────────────────────────────────────
    let llm = Arc::new(
        ProviderRegistry::from_config(&config.llm).context("initializing LLM providers")?,
    );
    tracing::info!(providers = ?llm.list_providers(), "LLM providers ready");

    // ── Knowledge retrieval ──────────────────────────────────────────
    let retriever: Arc<dyn KnowledgeRetriever> = match llm.embedder() {
        Some(embedder) => Arc::new(
            VectorIndexClient::new(&config.retrieval, embedder)
                .context("initializing vector index client")?,
        ),
        None => {
            tracing::warn!("no embedding provider configured; every turn will fail at retrieval");
            Arc::new(DisabledRetriever::new("no embedding provider configured"))
        }
    };

    // ── Scheduling (shared TTL cache) ────────────────────────────────
    let scheduling: Arc<dyn SchedulingApi> = Arc::new(CachedScheduling::new(
        RestSchedulingClient::new(&config.scheduling).context("initializing scheduling client")?,
        Duration::from_secs(config.scheduling.cache_ttl_secs),
    ));

    // ── Notifications ────────────────────────────────────────────────
    let notifier: Arc<dyn Notifier> = if config.notify.enabled {
        Arc::new(RestEmailNotifier::new(&config.notify).context("initializing email notifier")?)
    } else {
        tracing::info!("email notifications disabled");
        Arc::new(NoopNotifier)
    };

    // ── Persistence ──────────────────────────────────────────────────
    let state_path = &config.sessions.state_path;
    let checkpointer: Arc<dyn Checkpointer> = match config.sessions.backend {
        CheckpointBackend::File => Arc::new(
            FileCheckpointer::with_cache_capacity(
                &state_path.join("checkpoints"),
                config.sessions.checkpoint_cache_size,
            )
                .context("initializing checkpoint store")?,
        ),
        CheckpointBackend::Memory => {
            tracing::warn!("in-memory checkpoints: conversations are lost on restart");
            Arc::new(MemoryCheckpointer::new())
        }
    };
    let threads = Arc::new(match config.sessions.backend {
        CheckpointBackend::File => {
            ThreadIndex::new(state_path).context("loading thread index")?
        }
        CheckpointBackend::Memory => ThreadIndex::in_memory(),
    });
    let transcripts = if config.sessions.transcripts {
        Some(Arc::new(
            TranscriptWriter::new(&state_path.join("transcripts"))
                .context("initializing transcript writer")?,
        ))
    } else {
        None
    };
    tracing::info!(path = %state_path.display(), backend = ?config.sessions.backend, "session persistence ready");

    // ── Graph ────────────────────────────────────────────────────────
    let graph = Arc::new(Graph::new(
        config.clone(),
        &llm,
        retriever,
        scheduling.clone(),
    ));

    // ── API token (read once, hash for constant-time comparison) ────
    let api_token_hash = {
        let env_var = &config.server.api_token_env;
        match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::info!(source = %format!("env:{env_var}"), "API bearer-token auth enabled");
                Some(Sha256::digest(token.as_bytes()).to_vec())
            }
            None => {
                tracing::warn!("API bearer-token auth DISABLED: set the {env_var} env var");
                None
            }
        }
    };

    Ok(AppState {
        config,
        llm,
        graph,
        checkpointer,
        threads,
        transcripts,
        scheduling,
        notifier,
        thread_locks: Arc::new(ThreadLocks::new()),
        cancel_map: Arc::new(CancelMap::new()),
        api_token_hash,
    })
}

/// Spawn the long-running background tasks (thread-index flush, lock
/// pruning). Call after [`build_app_state`] for long-lived processes.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Periodic thread index flush ─────────────────────────────────
    {
        let threads = state.threads.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                let threads = threads.clone();
                match tokio::task::spawn_blocking(move || threads.flush()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "thread index flush failed"),
                    Err(e) => tracing::warn!(error = %e, "thread index flush task failed"),
                }
            }
        });
    }

    // ── Periodic thread lock pruning ────────────────────────────────
    {
        let thread_locks = state.thread_locks.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                thread_locks.prune_idle();
            }
        });
    }
}
