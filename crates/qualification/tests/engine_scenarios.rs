use std::sync::Arc;

use sv_domain::config::{NodeModels, NodeRole, QualificationConfig};
use sv_domain::lead::{
    ActionTrigger, BudgetRange, PurchaseIntent, QualificationData, QualificationField,
    QualificationTier,
};
use sv_domain::message::Message;
use sv_domain::state::SessionState;
use sv_providers::testing::ScriptedProvider;
use sv_providers::{LlmProvider, ProviderRegistry};
use sv_qualification::QualificationEngine;

fn engine_with(provider: ScriptedProvider) -> QualificationEngine {
    let registry = ProviderRegistry::from_providers(
        vec![Arc::new(provider) as Arc<dyn LlmProvider>],
        NodeModels::default(),
    );
    assert!(registry.for_node(NodeRole::Extractor).is_some());
    QualificationEngine::from_registry(&registry, &QualificationConfig::default())
}

fn is_extraction(messages: &[Message]) -> bool {
    messages
        .first()
        .map(|m| m.content.starts_with("Extract"))
        .unwrap_or(false)
}

#[tokio::test]
async fn extracted_hot_lead_completes_and_unlocks_actions() {
    let provider = ScriptedProvider::with(|req| {
        if is_extraction(&req.messages) {
            Ok(r#"{"purchase_intent":"investment","timeline":"immediate",
                "budget_range":"above_35m","decision_authority":"sole_decision",
                "payment_preference":"cash"}"#
                .into())
        } else {
            Ok(r#"{"sentiment":0.8,"receptiveness":0.8,"urgency":0.9,"trust":0.7}"#.into())
        }
    });
    let engine = engine_with(provider);

    let mut state = SessionState::new("hot");
    state.begin_turn("I'm investing, paying cash above 35M, buying right away, and it's my call.");
    let out = engine.evaluate(&state, true).await;

    assert_eq!(out.score.total_score, 100);
    assert_eq!(out.score.tier, QualificationTier::Hot);
    assert!(out.complete);
    assert!(out.question.is_none());
    assert_eq!(
        out.actions,
        vec![
            ActionTrigger::NotifyTeam,
            ActionTrigger::SuggestBooking,
            ActionTrigger::ShareContact
        ]
    );
}

#[tokio::test]
async fn failed_extraction_keeps_known_data() {
    let engine = engine_with(ScriptedProvider::failing());
    let mut state = SessionState::new("t");
    state.qualification_data = QualificationData {
        purchase_intent: Some(PurchaseIntent::Residence),
        budget_range: Some(BudgetRange::From15mTo25m),
        ..Default::default()
    };
    state.begin_turn("Tell me about the pool");

    let out = engine.evaluate(&state, true).await;
    assert_eq!(out.data, state.qualification_data);
    assert_eq!(out.score.total_score, 22 + 15);
}

#[tokio::test]
async fn garbage_extraction_reply_is_ignored() {
    let engine = engine_with(ScriptedProvider::replying("I am not sure what you mean"));
    let mut state = SessionState::new("t");
    state.begin_turn("Hello there, what's the price?");
    let out = engine.evaluate(&state, true).await;
    assert!(out.data.is_empty());
    assert_eq!(out.score.total_score, 0);
    assert_eq!(out.score.tier, QualificationTier::Unqualified);
}

#[tokio::test]
async fn questions_are_never_repeated_across_turns() {
    let engine = engine_with(ScriptedProvider::replying("{}"));
    let mut state = SessionState::new("loop");
    let turns = [
        "How much are the villas?",
        "Is there a pool and parking?",
        "When is completion and turnover?",
        "Can foreigners own the title?",
        "We are thinking about financing with a bank",
        "Is Siargao airport close by?",
        "I want to invest for rental income",
        "Could we move soon?",
    ];

    let mut asked = Vec::new();
    for (i, text) in turns.iter().enumerate() {
        state.begin_turn(text);
        let out = engine.evaluate(&state, true).await;
        state.qualification_data = out.data.clone();
        if let Some(q) = out.question {
            assert!(!state.questions_asked.contains(&q.field), "turn {i} repeated {:?}", q.field);
            assert!(!state.qualification_data.has(q.field));
            state.mark_asked(q.field);
            asked.push(q.field);
            state.messages.push(Message::assistant(q.text));
        } else {
            state.messages.push(Message::assistant("Happy to help."));
        }
    }

    assert_eq!(asked.len(), state.questions_asked.len());
    assert!(asked.len() <= QualificationField::ALL.len());
}
