//! The conversation graph.
//!
//! Fixed topology, executed once per user message:
//!
//! ```text
//! retrieve -> grade -> [route] -> reformulate -> retrieve   (bounded cycle)
//!                              -> greeting | booking | image | generate
//!                                                              -> qualify
//! ```
//!
//! Exactly one terminal responder runs per turn. Each node returns a
//! [`StateUpdate`] that is merged into the running state; nodes never
//! mutate the state directly. Node errors abort the turn and are never
//! retried here.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sv_domain::config::{Config, NodeRole};
use sv_domain::error::Result;
use sv_domain::lead::{ActionTrigger, LeadScore, QualificationData, QualificationField};
use sv_domain::message::Message;
use sv_domain::state::{BookingInfo, Document, ImageCategory, SessionState};
use sv_domain::trace::TraceEvent;
use sv_knowledge::KnowledgeRetriever;
use sv_providers::{NodeBinding, ProviderRegistry};
use sv_qualification::QualificationEngine;
use sv_scheduling::SchedulingApi;
use tracing::Instrument;

use super::cancel::CancelToken;
use super::nodes;
use super::router;
use super::sink::TokenSink;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Node and route identifiers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Retrieve,
    Grade,
    Reformulate,
    Greeting,
    Booking,
    Image,
    Generate,
    Qualify,
}

impl NodeId {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeId::Retrieve => "retrieve",
            NodeId::Grade => "grade",
            NodeId::Reformulate => "reformulate",
            NodeId::Greeting => "greeting",
            NodeId::Booking => "booking",
            NodeId::Image => "image",
            NodeId::Generate => "generate",
            NodeId::Qualify => "qualify",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeId::Greeting | NodeId::Booking | NodeId::Image | NodeId::Generate
        )
    }
}

/// Outcome of the conditional edge after `grade`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Greeting,
    Booking,
    Image,
    Generate,
    Reformulate,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Greeting => "greeting",
            Route::Booking => "booking",
            Route::Image => "image",
            Route::Generate => "generate",
            Route::Reformulate => "reformulate",
        }
    }

    pub fn next(self) -> NodeId {
        match self {
            Route::Greeting => NodeId::Greeting,
            Route::Booking => NodeId::Booking,
            Route::Image => NodeId::Image,
            Route::Generate => NodeId::Generate,
            Route::Reformulate => NodeId::Reformulate,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State updates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A node's contribution to the running state. `None` leaves a field as
/// it is; list fields are appended.
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub question: Option<String>,
    pub documents: Option<Vec<Document>>,
    pub document_quality: Option<f32>,
    pub is_greeting: Option<bool>,
    pub is_booking_intent: Option<bool>,
    pub show_images: Option<bool>,
    pub retrieval_attempts: Option<u32>,
    pub last_retrieval: Option<DateTime<Utc>>,
    pub pending_reply: Option<String>,
    pub booking_info: Option<BookingInfo>,
    pub image_urls: Option<Vec<String>>,
    pub image_type: Option<ImageCategory>,
    pub image_context: Option<String>,
    pub qualification_data: Option<QualificationData>,
    pub lead_score: Option<LeadScore>,
    pub questions_asked: Vec<QualificationField>,
    pub actions_fired: Vec<ActionTrigger>,
}

impl StateUpdate {
    /// A terminal responder's reply.
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            pending_reply: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn apply(self, state: &mut SessionState) {
        state.messages.extend(self.messages);

        if let Some(documents) = self.documents {
            state.documents = Some(documents);
        }
        if let Some(quality) = self.document_quality {
            state.document_quality = Some(quality);
        }
        if let Some(flag) = self.is_greeting {
            state.is_greeting = Some(flag);
        }
        if let Some(flag) = self.is_booking_intent {
            state.is_booking_intent = Some(flag);
        }
        if let Some(flag) = self.show_images {
            state.show_images = Some(flag);
        }
        if let Some(at) = self.last_retrieval {
            state.last_retrieval = Some(at);
        }
        if let Some(reply) = self.pending_reply {
            state.pending_reply = Some(reply);
        }
        if let Some(booking) = self.booking_info {
            state.booking_info = Some(booking);
        }
        if let Some(urls) = self.image_urls {
            state.image_urls = Some(urls);
        }
        if let Some(kind) = self.image_type {
            state.image_type = Some(kind);
        }
        if let Some(context) = self.image_context {
            state.image_context = Some(context);
        }
        if let Some(score) = self.lead_score {
            state.lead_score = Some(score);
        }
        if let Some(question) = self.question {
            state.question = question;
        }
        if let Some(attempts) = self.retrieval_attempts {
            state.retrieval_attempts = attempts;
        }
        if let Some(data) = self.qualification_data {
            state.qualification_data.merge(&data);
        }
        for field in self.questions_asked {
            state.mark_asked(field);
        }
        for action in self.actions_fired {
            if !state.actions_fired.contains(&action) {
                state.actions_fired.push(action);
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn context & outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-turn side channels passed explicitly to every node.
pub struct TurnContext {
    pub message_id: String,
    pub sink: Option<TokenSink>,
    pub cancel: CancelToken,
}

impl TurnContext {
    pub fn new(message_id: impl Into<String>, sink: Option<TokenSink>, cancel: CancelToken) -> Self {
        Self {
            message_id: message_id.into(),
            sink,
            cancel,
        }
    }

    /// A context that never streams and is never cancelled.
    pub fn detached(message_id: impl Into<String>) -> Self {
        Self::new(message_id, None, CancelToken::new())
    }

    pub fn is_streaming(&self) -> bool {
        self.sink.is_some()
    }

    pub async fn emit_token(&self, text: &str) {
        if let Some(sink) = &self.sink {
            sink.token(text).await;
        }
    }

    /// Stream canned text word by word.
    pub async fn emit_words(&self, text: &str) {
        if let Some(sink) = &self.sink {
            sink.words(text).await;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// The responder that ran, or `None` when the turn was stopped first.
    pub terminal: Option<NodeId>,
    /// Triggers that still need a side effect outside the graph.
    pub actions: Vec<ActionTrigger>,
    pub stopped: bool,
    pub reply: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Graph
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Graph {
    pub(crate) config: Arc<Config>,
    pub(crate) retriever: Arc<dyn KnowledgeRetriever>,
    pub(crate) scheduling: Arc<dyn SchedulingApi>,
    pub(crate) grader: Option<NodeBinding>,
    pub(crate) reformulator: Option<NodeBinding>,
    pub(crate) generator: Option<NodeBinding>,
    pub(crate) qualification: QualificationEngine,
}

impl Graph {
    pub fn new(
        config: Arc<Config>,
        llm: &ProviderRegistry,
        retriever: Arc<dyn KnowledgeRetriever>,
        scheduling: Arc<dyn SchedulingApi>,
    ) -> Self {
        Self {
            grader: llm.for_node(NodeRole::Grader),
            reformulator: llm.for_node(NodeRole::Reformulator),
            generator: llm.for_node(NodeRole::Generator),
            qualification: QualificationEngine::from_registry(llm, &config.qualification),
            config,
            retriever,
            scheduling,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one turn over `state`, which must already hold the user's
    /// message (see [`SessionState::begin_turn`]).
    pub async fn run(&self, state: &mut SessionState, cx: &TurnContext) -> Result<TurnOutcome> {
        let threshold = self.config.retrieval.relevance_threshold;
        let max_attempts = self.config.retrieval.max_attempts.max(1);

        let mut node = NodeId::Retrieve;
        let terminal = loop {
            if cx.cancel.is_cancelled() {
                break None;
            }

            let update = self.execute(node, state, cx).await?;
            update.apply(state);

            node = match node {
                NodeId::Retrieve => NodeId::Grade,
                NodeId::Reformulate => NodeId::Retrieve,
                NodeId::Grade => {
                    let route = router::route(state, threshold, max_attempts);
                    TraceEvent::RouteDecided {
                        thread_id: state.thread_id.clone(),
                        route: route.as_str().into(),
                        document_quality: state.document_quality,
                        attempts: state.retrieval_attempts,
                    }
                    .emit();
                    route.next()
                }
                NodeId::Qualify => break None,
                terminal => break Some(terminal),
            };
        };

        let stopped = cx.cancel.is_cancelled();
        let mut actions = Vec::new();
        match terminal {
            Some(terminal) if !stopped => {
                let started = Instant::now();
                let (update, pending) = nodes::qualify::run(self, state, cx, terminal)
                    .instrument(tracing::info_span!("node", name = NodeId::Qualify.as_str()))
                    .await;
                update.apply(state);
                actions = pending;
                Self::completed(state, NodeId::Qualify, started);
            }
            _ => {
                // Keep whatever was produced before the stop.
                if let Some(partial) = state.pending_reply.clone().filter(|r| !r.is_empty()) {
                    state.messages.push(Message::assistant(partial));
                }
            }
        }

        Ok(TurnOutcome {
            terminal,
            actions,
            stopped,
            reply: state.pending_reply.clone().unwrap_or_default(),
        })
    }

    async fn execute(
        &self,
        node: NodeId,
        state: &SessionState,
        cx: &TurnContext,
    ) -> Result<StateUpdate> {
        let started = Instant::now();
        let span = tracing::info_span!("node", name = node.as_str());
        let update = async {
            match node {
                NodeId::Retrieve => nodes::retrieve::run(self, state).await,
                NodeId::Grade => Ok(nodes::grade::run(self, state).await),
                NodeId::Reformulate => Ok(nodes::reformulate::run(self, state).await),
                NodeId::Greeting => Ok(nodes::greeting::run(self, state, cx).await),
                NodeId::Booking => Ok(nodes::booking::run(self, state, cx).await),
                NodeId::Image => Ok(nodes::image::run(self, state, cx).await),
                NodeId::Generate => Ok(nodes::generate::run(self, state, cx).await),
                NodeId::Qualify => Ok(StateUpdate::default()),
            }
        }
        .instrument(span)
        .await?;

        Self::completed(state, node, started);
        Ok(update)
    }

    fn completed(state: &SessionState, node: NodeId, started: Instant) {
        TraceEvent::NodeCompleted {
            thread_id: state.thread_id.clone(),
            node: node.as_str().into(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
    }
}
