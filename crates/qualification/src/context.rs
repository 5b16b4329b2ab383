//! Conversation context analysis.
//!
//! Turns the raw message history into the signals the opportunity detector
//! and strategy selector work from: buying stage, sentiment, engagement,
//! question fatigue, topic focus and an overall readiness score.

use serde::{Deserialize, Serialize};
use sv_domain::message::{Message, Role};
use sv_domain::state::SessionState;
use sv_domain::text::count_matches;
use sv_domain::trace::TraceEvent;
use sv_providers::NodeBinding;


// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Buying stage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyingStage {
    Awareness,
    Interest,
    Consideration,
    Intent,
    Evaluation,
    Decision,
}

impl BuyingStage {
    pub const ALL: &'static [BuyingStage] = &[
        BuyingStage::Awareness,
        BuyingStage::Interest,
        BuyingStage::Consideration,
        BuyingStage::Intent,
        BuyingStage::Evaluation,
        BuyingStage::Decision,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuyingStage::Awareness => "awareness",
            BuyingStage::Interest => "interest",
            BuyingStage::Consideration => "consideration",
            BuyingStage::Intent => "intent",
            BuyingStage::Evaluation => "evaluation",
            BuyingStage::Decision => "decision",
        }
    }

    /// Position in the funnel scaled to 0..=1.
    pub fn progress(self) -> f32 {
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        idx as f32 / (Self::ALL.len() - 1) as f32
    }

    fn indicators(self) -> &'static [&'static str] {
        match self {
            BuyingStage::Awareness => &[
                "what is", "tell me about", "where is", "learn", "info", "information", "curious",
            ],
            BuyingStage::Interest => &[
                "interested", "amenities", "features", "pool", "view", "beach", "design", "photos",
                "pictures",
            ],
            BuyingStage::Consideration => &[
                "price", "cost", "how much", "compare", "options", "bedroom", "size", "sqm",
                "difference",
            ],
            BuyingStage::Intent => &[
                "want to buy", "looking to buy", "planning to", "purchase", "available", "reserve",
                "interested in buying",
            ],
            BuyingStage::Evaluation => &[
                "payment", "financing", "installment", "roi", "rental yield", "return", "contract",
                "title", "turnover",
            ],
            BuyingStage::Decision => &[
                "ready to", "book a", "schedule", "viewing", "site visit", "reservation fee",
                "deposit", "sign",
            ],
        }
    }
}

/// Pick the stage whose indicators best match the user's recent messages.
/// Longer conversations lean toward later stages; ties go to the later stage.
pub fn detect_stage(user_messages: &[&str]) -> BuyingStage {
    let recent: Vec<&str> = user_messages.iter().rev().take(4).copied().collect();
    let text = recent.join(" ");
    let count = user_messages.len();

    let mut best = BuyingStage::Awareness;
    let mut best_score = 0.0_f32;
    for stage in BuyingStage::ALL {
        let mut score = count_matches(&text, stage.indicators()) as f32;
        if score > 0.0 {
            score += length_bias(*stage, count);
        }
        if score >= best_score && score > 0.0 {
            best = *stage;
            best_score = score;
        }
    }

    if best_score == 0.0 && count >= 3 {
        BuyingStage::Interest
    } else {
        best
    }
}

fn length_bias(stage: BuyingStage, user_message_count: usize) -> f32 {
    match (stage, user_message_count) {
        (BuyingStage::Awareness, n) if n >= 4 => -0.5,
        (BuyingStage::Consideration | BuyingStage::Intent | BuyingStage::Evaluation, n)
            if n >= 4 =>
        {
            0.5
        }
        (BuyingStage::Decision, n) if n >= 6 => 0.5,
        _ => 0.0,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Topics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Location,
    Pricing,
    Investment,
    Amenities,
    Construction,
    Lifestyle,
    Financing,
    Legal,
}

impl Topic {
    pub const ALL: &'static [Topic] = &[
        Topic::Location,
        Topic::Pricing,
        Topic::Investment,
        Topic::Amenities,
        Topic::Construction,
        Topic::Lifestyle,
        Topic::Financing,
        Topic::Legal,
    ];

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Topic::Location => &["location", "where", "siargao", "beach", "airport", "map", "nearby"],
            Topic::Pricing => &["price", "cost", "how much", "php", "million", "expensive", "budget"],
            Topic::Investment => &["invest", "investment", "roi", "rental", "income", "yield", "airbnb"],
            Topic::Amenities => &["pool", "amenities", "gym", "parking", "garden", "kitchen", "wifi"],
            Topic::Construction => &["construction", "built", "completion", "turnover", "materials", "progress"],
            Topic::Lifestyle => &["surf", "family", "retire", "relax", "community", "lifestyle", "island life"],
            Topic::Financing => &["financing", "loan", "bank", "installment", "payment", "mortgage"],
            Topic::Legal => &["title", "foreigner", "legal", "contract", "ownership", "lease", "tax"],
        }
    }
}

/// Relevance of each topic to `text`, in 0..=1. Only topics that appear
/// are returned, strongest first.
pub fn topic_relevance(text: &str) -> Vec<(Topic, f32)> {
    let mut scored: Vec<(Topic, f32)> = Topic::ALL
        .iter()
        .filter_map(|t| {
            let hits = count_matches(text, t.keywords());
            (hits > 0).then(|| (*t, (hits as f32 / 3.0).min(1.0)))
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sentiment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// LLM-scored affect of the conversation; every component in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentVector {
    pub sentiment: f32,
    pub receptiveness: f32,
    pub urgency: f32,
    pub trust: f32,
}

impl SentimentVector {
    pub fn neutral() -> Self {
        Self {
            sentiment: 0.5,
            receptiveness: 0.5,
            urgency: 0.5,
            trust: 0.5,
        }
    }

    /// Parse the analyst's JSON reply. Missing components stay neutral.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(json_object(raw)?).ok()?;
        let obj = value.as_object()?;
        let get = |k: &str| {
            obj.get(k)
                .and_then(|v| v.as_f64())
                .map(|v| (v as f32).clamp(0.0, 1.0))
                .unwrap_or(0.5)
        };
        Some(Self {
            sentiment: get("sentiment"),
            receptiveness: get("receptiveness"),
            urgency: get("urgency"),
            trust: get("trust"),
        })
    }
}

impl Default for SentimentVector {
    fn default() -> Self {
        Self::neutral()
    }
}

/// The outermost `{ ... }` span of a model reply, tolerating code fences
/// and surrounding prose.
pub(crate) fn json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engagement and fatigue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 0.4 × message length + 0.3 × response rate + 0.3 × questions asked by
/// the user, each normalized to 0..=1.
pub fn engagement_level(messages: &[Message]) -> f32 {
    let users: Vec<&Message> = messages.iter().filter(|m| m.role == Role::User).collect();
    if users.is_empty() {
        return 0.0;
    }
    let assistants = messages.iter().filter(|m| m.role == Role::Assistant).count();

    let avg_len =
        users.iter().map(|m| m.content.chars().count()).sum::<usize>() as f32 / users.len() as f32;
    let length = (avg_len / 100.0).min(1.0);
    let response_rate = (users.len() as f32 / assistants.max(1) as f32).min(1.0);
    let questions = users.iter().filter(|m| m.content.contains('?')).count();
    let curiosity = (questions as f32 / 3.0).min(1.0);

    (0.4 * length + 0.3 * response_rate + 0.3 * curiosity).clamp(0.0, 1.0)
}

/// How tired the user is likely to be of profiling questions: the share of
/// turns that carried a question plus a penalty for a question asked in
/// the last one or two turns.
pub fn question_fatigue(questions_asked: usize, turn_count: u32, last_question_turn: Option<u32>) -> f32 {
    let ratio = (questions_asked as f32 / turn_count.max(1) as f32).min(1.0);
    let recency = match last_question_turn.map(|t| turn_count.saturating_sub(t)) {
        Some(0) | Some(1) => 0.5,
        Some(2) => 0.25,
        _ => 0.0,
    };
    (0.5 * ratio + recency).clamp(0.0, 1.0)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Analyzer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationContext {
    pub stage: BuyingStage,
    pub sentiment: SentimentVector,
    pub engagement: f32,
    pub fatigue: f32,
    pub topics: Vec<(Topic, f32)>,
    pub readiness: f32,
    /// Concatenated recent user messages, for trigger matching.
    #[serde(skip)]
    pub recent_user_text: String,
    /// The user's latest message ends in a question.
    pub user_asked_question: bool,
}

impl ConversationContext {
    pub fn top_topic(&self) -> Option<Topic> {
        self.topics.first().map(|(t, _)| *t)
    }
}

/// Weighted readiness: stage 0.25, engagement 0.25, receptiveness 0.2,
/// trust 0.15, freshness (1 - fatigue) 0.15.
pub fn readiness(stage: BuyingStage, engagement: f32, sentiment: &SentimentVector, fatigue: f32) -> f32 {
    (0.25 * stage.progress()
        + 0.25 * engagement
        + 0.2 * sentiment.receptiveness
        + 0.15 * sentiment.trust
        + 0.15 * (1.0 - fatigue))
        .clamp(0.0, 1.0)
}

const SENTIMENT_PROMPT: &str = "You rate a prospective villa buyer's messages. \
Reply with only a JSON object with numeric fields between 0 and 1: \
\"sentiment\" (negative to positive), \"receptiveness\" (to questions), \
\"urgency\", and \"trust\".";

pub struct ContextAnalyzer {
    analyst: Option<NodeBinding>,
}

impl ContextAnalyzer {
    pub fn new(analyst: Option<NodeBinding>) -> Self {
        Self { analyst }
    }

    pub async fn analyze(&self, state: &SessionState) -> ConversationContext {
        let sentiment = self.score_sentiment(&state.messages).await;
        analyze_with(state, sentiment)
    }

    async fn score_sentiment(&self, messages: &[Message]) -> SentimentVector {
        let Some(analyst) = &self.analyst else {
            return SentimentVector::neutral();
        };
        let recent: Vec<String> = messages
            .iter()
            .filter(|m| m.role == Role::User)
            .rev()
            .take(5)
            .map(|m| format!("- {}", m.content))
            .collect();
        if recent.is_empty() {
            return SentimentVector::neutral();
        }

        let prompt = vec![
            Message::system(SENTIMENT_PROMPT),
            Message::user(recent.into_iter().rev().collect::<Vec<_>>().join("\n")),
        ];
        match analyst.complete(prompt, true).await {
            Ok(raw) => SentimentVector::parse(&raw).unwrap_or_else(|| {
                degraded("unparseable sentiment reply");
                SentimentVector::neutral()
            }),
            Err(e) => {
                degraded(&e.to_string());
                SentimentVector::neutral()
            }
        }
    }
}

fn degraded(reason: &str) {
    tracing::warn!(outcome = "degraded", reason, "sentiment analysis fell back to neutral");
    TraceEvent::Degraded {
        component: "sentiment".into(),
        reason: reason.into(),
    }
    .emit();
}

/// Build the context from a state and an already-scored sentiment vector.
pub fn analyze_with(state: &SessionState, sentiment: SentimentVector) -> ConversationContext {
    let user_texts: Vec<&str> = state.user_messages().map(|m| m.content.as_str()).collect();
    let stage = detect_stage(&user_texts);
    let engagement = engagement_level(&state.messages);
    let fatigue = question_fatigue(
        state.questions_asked.len(),
        state.turn_count,
        state.last_question_turn,
    );
    let recent_user_text = user_texts
        .iter()
        .rev()
        .take(3)
        .rev()
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    let topics = topic_relevance(&recent_user_text);
    let user_asked_question = user_texts
        .last()
        .map(|t| t.trim_end().ends_with('?'))
        .unwrap_or(false);

    ConversationContext {
        stage,
        sentiment,
        engagement,
        fatigue,
        readiness: readiness(stage, engagement, &sentiment, fatigue),
        topics,
        recent_user_text,
        user_asked_question,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_from_indicators() {
        assert_eq!(detect_stage(&["Tell me about the villas"]), BuyingStage::Awareness);
        assert_eq!(detect_stage(&["How much does a 2 bedroom cost?"]), BuyingStage::Consideration);
        assert_eq!(
            detect_stage(&["What are the payment terms and financing?"]),
            BuyingStage::Evaluation
        );
        assert_eq!(
            detect_stage(&["We are ready to pay the reservation fee"]),
            BuyingStage::Decision
        );
        assert_eq!(detect_stage(&[]), BuyingStage::Awareness);
    }

    #[test]
    fn long_conversations_without_signals_are_interest() {
        assert_eq!(detect_stage(&["ok", "sure", "nice"]), BuyingStage::Interest);
    }

    #[test]
    fn topics_ranked() {
        let topics = topic_relevance("What is the price in PHP and is there a pool?");
        assert_eq!(topics[0].0, Topic::Pricing);
        assert!(topics.iter().any(|(t, _)| *t == Topic::Amenities));
        assert!(topic_relevance("hmm").is_empty());
    }

    #[test]
    fn sentiment_parse_tolerates_fences_and_clamps() {
        let v = SentimentVector::parse("```json\n{\"sentiment\": 0.9, \"trust\": 1.7}\n```").unwrap();
        assert_eq!(v.sentiment, 0.9);
        assert_eq!(v.trust, 1.0);
        assert_eq!(v.receptiveness, 0.5);
        assert!(SentimentVector::parse("no json here").is_none());
    }

    #[test]
    fn engagement_components() {
        assert_eq!(engagement_level(&[]), 0.0);
        let long = "x".repeat(150);
        let msgs = vec![
            Message::user(format!("{long}?")),
            Message::assistant("a"),
            Message::user("why?"),
            Message::assistant("b"),
            Message::user("how?"),
        ];
        // length: avg > 50 chars; rate capped at 1; questions 3/3
        let e = engagement_level(&msgs);
        assert!(e > 0.6 && e <= 1.0, "{e}");
    }

    #[test]
    fn fatigue_rises_with_recent_questions() {
        assert_eq!(question_fatigue(0, 5, None), 0.0);
        let fresh = question_fatigue(1, 6, Some(2));
        let recent = question_fatigue(1, 6, Some(5));
        assert!(recent > fresh);
        assert!(question_fatigue(8, 4, Some(4)) <= 1.0);
    }

    #[test]
    fn readiness_bounds() {
        let neutral = SentimentVector::neutral();
        let low = readiness(BuyingStage::Awareness, 0.0, &neutral, 1.0);
        let high = readiness(BuyingStage::Decision, 1.0, &neutral, 0.0);
        assert!(low < high);
        assert!((0.0..=1.0).contains(&low) && (0.0..=1.0).contains(&high));
    }

    #[tokio::test]
    async fn analyzer_without_provider_is_neutral() {
        let mut state = SessionState::new("t");
        state.begin_turn("Is there a pool?");
        let ctx = ContextAnalyzer::new(None).analyze(&state).await;
        assert_eq!(ctx.sentiment, SentimentVector::neutral());
        assert!(ctx.user_asked_question);
        assert_eq!(ctx.top_topic(), Some(Topic::Amenities));
    }
}
