#![allow(dead_code)]

use std::sync::Arc;

use sv_domain::config::{CheckpointBackend, Config};
use sv_domain::message::Role;
use sv_gateway::runtime::cancel::CancelMap;
use sv_gateway::runtime::graph::Graph;
use sv_gateway::runtime::session_lock::ThreadLocks;
use sv_gateway::runtime::{collect, run_turn, TurnEvent, TurnInput};
use sv_gateway::state::AppState;
use sv_knowledge::testing::StaticRetriever;
use sv_knowledge::KnowledgeRetriever;
use sv_notify::testing::RecordingNotifier;
use sv_notify::Notifier;
use sv_providers::testing::ScriptedProvider;
use sv_providers::traits::{ChatRequest, LlmProvider};
use sv_providers::ProviderRegistry;
use sv_scheduling::testing::FakeScheduling;
use sv_scheduling::SchedulingApi;
use sv_sessions::{MemoryCheckpointer, ThreadIndex};

pub const ANSWER: &str = "Each villa has three bedrooms and a private plunge pool.";

/// Which pipeline step a scripted request came from.
pub fn step(req: &ChatRequest) -> &'static str {
    let system = req
        .messages
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .unwrap_or("");
    if system.contains("judge how well") {
        "grader"
    } else if system.contains("rewrite questions") {
        "reformulator"
    } else if system.contains("sales concierge") {
        "generator"
    } else {
        "other"
    }
}

/// A provider that grades every passage as relevant and answers with
/// [`ANSWER`].
pub fn answering_provider() -> ScriptedProvider {
    ScriptedProvider::with(|req| {
        Ok(match step(req) {
            "grader" => "0.9".into(),
            "reformulator" => "villa floor plan bedrooms".into(),
            _ => ANSWER.into(),
        })
    })
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.qualification.enabled = false;
    config.sessions.backend = CheckpointBackend::Memory;
    config
}

pub struct Harness {
    pub state: AppState,
    pub llm: Arc<ScriptedProvider>,
    pub retriever: Arc<StaticRetriever>,
    pub scheduling: Arc<FakeScheduling>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(llm: ScriptedProvider, retriever: StaticRetriever) -> Self {
        Self::build(test_config(), llm, retriever, FakeScheduling::healthy())
    }

    pub fn build(
        config: Config,
        llm: ScriptedProvider,
        retriever: StaticRetriever,
        scheduling: FakeScheduling,
    ) -> Self {
        let config = Arc::new(config);
        let llm = Arc::new(llm);
        let retriever = Arc::new(retriever);
        let scheduling = Arc::new(scheduling);
        let notifier = Arc::new(RecordingNotifier::default());

        let state = app_state(
            config,
            llm.clone(),
            retriever.clone(),
            scheduling.clone(),
            notifier.clone(),
        );

        Self {
            state,
            llm,
            retriever,
            scheduling,
            notifier,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        use sha2::{Digest, Sha256};
        self.state.api_token_hash = Some(Sha256::digest(token.as_bytes()).to_vec());
        self
    }

    /// Run a turn and return every event it emitted.
    pub async fn events(&self, thread_id: &str, message: &str, stream: bool) -> Vec<TurnEvent> {
        let (_, mut rx) = run_turn(self.state.clone(), input(thread_id, message, stream));
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    /// Run a non-streaming turn and return its terminal event.
    pub async fn reply(&self, thread_id: &str, message: &str) -> TurnEvent {
        let (_, rx) = run_turn(self.state.clone(), input(thread_id, message, false));
        collect(rx).await.expect("turn produced no terminal event")
    }
}

/// Wire an [`AppState`] around in-process fakes with in-memory persistence.
pub fn app_state(
    config: Arc<Config>,
    provider: Arc<dyn LlmProvider>,
    retriever: Arc<dyn KnowledgeRetriever>,
    scheduling: Arc<dyn SchedulingApi>,
    notifier: Arc<dyn Notifier>,
) -> AppState {
    let registry = Arc::new(ProviderRegistry::from_providers(
        vec![provider],
        config.llm.nodes.clone(),
    ));
    let graph = Arc::new(Graph::new(
        config.clone(),
        &registry,
        retriever,
        scheduling.clone(),
    ));
    AppState {
        config,
        llm: registry,
        graph,
        checkpointer: Arc::new(MemoryCheckpointer::new()),
        threads: Arc::new(ThreadIndex::in_memory()),
        transcripts: None,
        scheduling,
        notifier,
        thread_locks: Arc::new(ThreadLocks::new()),
        cancel_map: Arc::new(CancelMap::new()),
        api_token_hash: None,
    }
}

pub fn input(thread_id: &str, message: &str, stream: bool) -> TurnInput {
    TurnInput {
        thread_id: thread_id.into(),
        message: message.into(),
        lead_info: None,
        stream,
    }
}

pub fn content(event: &TurnEvent) -> &str {
    match event {
        TurnEvent::Final { content, .. } | TurnEvent::Stopped { content, .. } => content,
        TurnEvent::Error { message, .. } => message,
        other => panic!("not a terminal event: {other:?}"),
    }
}

pub fn tokens(events: &[TurnEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::Token { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
