mod common;

use std::sync::Arc;
use std::time::Duration;

use sv_domain::error::{Error, Result};
use sv_domain::message::Role;
use sv_domain::state::LeadInfo;
use sv_domain::stream::{BoxStream, StreamEvent};
use sv_gateway::runtime::{collect, run_turn, TurnEvent, TurnInput};
use sv_knowledge::testing::StaticRetriever;
use sv_notify::testing::RecordingNotifier;
use sv_providers::testing::ScriptedProvider;
use sv_providers::traits::{
    ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider,
};
use sv_scheduling::testing::FakeScheduling;

use common::{answering_provider, content, step, test_config, tokens, Harness, ANSWER};

const VILLA_DOCS: &[&str] = &[
    "Every villa has three bedrooms, two baths and a private plunge pool.",
    "Villas are 15 minutes from Siargao airport.",
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Routing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn greeting_short_circuits_the_grader() {
    let h = Harness::new(answering_provider(), StaticRetriever::new(VILLA_DOCS));

    let reply = h.reply("t-greet", "Hello!").await;

    assert!(matches!(reply, TurnEvent::Final { .. }));
    assert!(content(&reply).contains("Skypearls Villas"));
    assert!(h.llm.requests().iter().all(|r| step(r) != "grader"));
    assert_eq!(h.llm.calls(), 0);
}

#[tokio::test]
async fn relevant_passages_are_answered_directly() {
    let h = Harness::new(answering_provider(), StaticRetriever::new(VILLA_DOCS));

    let reply = h.reply("t-answer", "How many bedrooms do the villas have?").await;

    assert_eq!(content(&reply), ANSWER);
    assert_eq!(h.retriever.calls(), 1);
    let steps: Vec<_> = h.llm.requests().iter().map(step).collect();
    assert_eq!(steps, vec!["grader", "generator"]);
}

#[tokio::test]
async fn reformulation_never_repeats_the_question() {
    // The rewriter echoes whatever it is given.
    let llm = ScriptedProvider::with(|req| {
        let user = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(match step(req) {
            "reformulator" => user
                .strip_prefix("Question: ")
                .and_then(|q| q.lines().next())
                .unwrap_or_default()
                .to_string(),
            _ => ANSWER.into(),
        })
    });
    let h = Harness::new(llm, StaticRetriever::empty());

    h.reply("t-reform", "Is there a gym nearby?").await;

    let queries = h.retriever.queries();
    assert_eq!(queries.len(), 3, "retrieval ceiling is three attempts");
    assert_eq!(queries[0], "Is there a gym nearby?");
    for pair in queries.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
    assert!(queries[1..].iter().all(|q| q != &queries[0]));
}

#[tokio::test]
async fn unanswerable_price_question_gets_fallback_and_contact() {
    let h = Harness::new(answering_provider(), StaticRetriever::empty());
    let input = TurnInput {
        thread_id: "t-price".into(),
        message: "price".into(),
        lead_info: Some(LeadInfo {
            first_name: "Ana".into(),
            email: None,
            phone: None,
            transcript_opt_in: false,
        }),
        stream: false,
    };

    let (_, rx) = run_turn(h.state.clone(), input);
    let reply = collect(rx).await.unwrap();
    let text = content(&reply);

    assert!(matches!(reply, TurnEvent::Final { .. }));
    assert!(text.contains("Ana"));
    assert!(text.contains("Skypearls Villas"));
    assert!(text.contains("+63 917 150 4140"));
    // No passages: the generator model is never asked.
    assert!(h.llm.requests().iter().all(|r| step(r) != "generator"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Booking
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn booking_with_healthy_scheduler_shares_the_link() {
    let h = Harness::new(answering_provider(), StaticRetriever::new(VILLA_DOCS));

    let events = h.events("t-book", "Can I book a viewing next week?", false).await;

    assert!(events.iter().any(|e| matches!(e, TurnEvent::Booking { .. })));
    match events.last().unwrap() {
        TurnEvent::Final { content, booking, .. } => {
            let booking = booking.as_ref().unwrap();
            assert!(!booking.fallback);
            assert!(content.contains("https://calendly.com/skypearls/villa-consultation"));
        }
        other => panic!("expected final, got {other:?}"),
    }
}

#[tokio::test]
async fn booking_degrades_to_contact_details_when_scheduler_is_unhealthy() {
    let h = Harness::build(
        test_config(),
        answering_provider(),
        StaticRetriever::new(VILLA_DOCS),
        FakeScheduling::unhealthy(),
    );

    let reply = h.reply("t-book-down", "I'd like to book a viewing").await;

    match &reply {
        TurnEvent::Final { content, booking, .. } => {
            assert!(booking.as_ref().unwrap().fallback);
            assert!(content.contains("+63 917 150 4140"));
            assert!(!content.contains("calendly.com"));
        }
        other => panic!("expected final, got {other:?}"),
    }
    assert_eq!(h.scheduling.list_calls(), 0);
}

#[tokio::test]
async fn location_request_returns_the_image_set() {
    let h = Harness::new(answering_provider(), StaticRetriever::new(VILLA_DOCS));
    let expected = h.state.config.brand.images.location.urls.clone();

    let events = h.events("t-images", "Where are the villas located?", true).await;
    let streamed_urls = events.iter().find_map(|e| match e {
        TurnEvent::Images { urls, .. } => Some(urls.clone()),
        _ => None,
    });
    assert_eq!(streamed_urls, Some(expected.clone()));

    match events.last().unwrap() {
        TurnEvent::Final { images, content, .. } => {
            assert_eq!(images.as_ref(), Some(&expected));
            assert_eq!(content, &h.state.config.brand.images.location.response);
        }
        other => panic!("expected final, got {other:?}"),
    }
    assert!(h.llm.requests().iter().all(|r| step(r) != "generator"));
}

#[tokio::test]
async fn questions_mentioning_places_or_bookings_are_answered_from_knowledge() {
    let h = Harness::new(answering_provider(), StaticRetriever::new(VILLA_DOCS));

    for (i, question) in [
        "Where is the pool in the villa?",
        "Where is the nearest hospital?",
        "Is the booking fee refundable?",
    ]
    .into_iter()
    .enumerate()
    {
        match h.reply(&format!("t-knowledge-{i}"), question).await {
            TurnEvent::Final { content, images, booking, .. } => {
                assert_eq!(content, ANSWER, "{question}");
                assert!(images.is_none(), "{question}");
                assert!(booking.is_none(), "{question}");
            }
            other => panic!("expected final for {question}, got {other:?}"),
        }
    }
    assert_eq!(h.scheduling.health_calls(), 0);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn streamed_tokens_concatenate_to_the_final_reply() {
    let h = Harness::new(answering_provider(), StaticRetriever::new(VILLA_DOCS));
    let question = "How many bedrooms do the villas have? What does it cost?";

    let events = h.events("t-stream", question, true).await;
    let streamed = tokens(&events);
    let final_event = events.last().unwrap();

    assert!(matches!(final_event, TurnEvent::Final { .. }));
    assert_eq!(streamed, content(final_event));

    let ids: Vec<&str> = events
        .iter()
        .map(|e| match e {
            TurnEvent::Token { message_id, .. } | TurnEvent::Final { message_id, .. } => {
                message_id.as_str()
            }
            _ => "",
        })
        .collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));

    // The same question without streaming yields the same text.
    let plain = h.reply("t-plain", question).await;
    assert_eq!(content(&plain), content(final_event));
}

#[tokio::test]
async fn greeting_streams_word_by_word() {
    let h = Harness::new(answering_provider(), StaticRetriever::new(VILLA_DOCS));

    let events = h.events("t-greet-stream", "hi", true).await;
    let token_count = events
        .iter()
        .filter(|e| matches!(e, TurnEvent::Token { .. }))
        .count();

    assert!(token_count > 1);
    assert_eq!(tokens(&events), content(events.last().unwrap()));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Failure and persistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn retrieval_failure_ends_the_turn_without_saving() {
    let h = Harness::new(answering_provider(), StaticRetriever::failing());

    let reply = h.reply("t-fail", "Tell me about the villas").await;

    match &reply {
        TurnEvent::Error { message, .. } => {
            assert!(message.contains("+63 917 150 4140"));
            assert!(!message.contains("vector index"));
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert!(h.state.checkpointer.load("t-fail").await.unwrap().is_none());
    assert!(h.state.threads.get("t-fail").is_none());
}

#[tokio::test]
async fn generator_failure_uses_the_fallback_reply() {
    let llm = ScriptedProvider::with(|req| match step(req) {
        "grader" => Ok("0.9".into()),
        _ => Err(Error::Http("upstream 503".into())),
    });
    let h = Harness::new(llm, StaticRetriever::new(VILLA_DOCS));

    let reply = h.reply("t-gen-fail", "How big are the villas?").await;

    assert!(matches!(reply, TurnEvent::Final { .. }));
    assert!(content(&reply).contains("Skypearls Villas"));
    assert!(!content(&reply).contains("503"));
}

#[tokio::test]
async fn turns_on_one_thread_are_serialized() {
    let h = Harness::new(answering_provider(), StaticRetriever::new(VILLA_DOCS));

    let (_, first) = run_turn(h.state.clone(), common::input("t-serial", "How many bedrooms?", false));
    let (_, second) = run_turn(h.state.clone(), common::input("t-serial", "Is there a pool?", false));
    let (a, b) = tokio::join!(collect(first), collect(second));
    assert!(matches!(a, Some(TurnEvent::Final { .. })));
    assert!(matches!(b, Some(TurnEvent::Final { .. })));

    let saved = h.state.checkpointer.load("t-serial").await.unwrap().unwrap();
    let roles: Vec<Role> = saved.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(saved.turn_count, 2);
    assert_eq!(h.state.threads.get("t-serial").unwrap().turns, 2);
}

#[tokio::test]
async fn history_survives_across_turns() {
    let h = Harness::new(answering_provider(), StaticRetriever::new(VILLA_DOCS));

    h.reply("t-history", "How many bedrooms?").await;
    h.reply("t-history", "And bathrooms?").await;

    let generator_calls: Vec<ChatRequest> = h
        .llm
        .requests()
        .into_iter()
        .filter(|r| step(r) == "generator")
        .collect();
    let last = generator_calls.last().unwrap();
    assert!(last.messages.iter().any(|m| m.content == "How many bedrooms?"));
    assert!(last.messages.iter().any(|m| m.content == ANSWER));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cancellation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Grades everything as relevant, then streams one token and hangs.
struct HangingProvider;

#[async_trait::async_trait]
impl LlmProvider for HangingProvider {
    async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
        Ok(ChatResponse {
            content: "0.9".into(),
            usage: None,
            model: "hanging".into(),
            finish_reason: Some("stop".into()),
        })
    }

    async fn chat_stream(
        &self,
        _req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        Ok(Box::pin(async_stream::stream! {
            yield Ok::<_, Error>(StreamEvent::Token { text: "Our villas ".into() });
            std::future::pending::<()>().await;
        }))
    }

    async fn embeddings(&self, _req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        Ok(EmbeddingsResponse {
            embeddings: Vec::new(),
        })
    }

    fn provider_id(&self) -> &str {
        "hanging"
    }
}

#[tokio::test]
async fn stop_commits_the_partial_reply() {
    let state = common::app_state(
        Arc::new(test_config()),
        Arc::new(HangingProvider),
        Arc::new(StaticRetriever::new(VILLA_DOCS)),
        Arc::new(FakeScheduling::healthy()),
        Arc::new(RecordingNotifier::default()),
    );

    let (_, mut rx) = run_turn(state.clone(), common::input("t-stop", "Tell me about the villas", true));

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, TurnEvent::Token { .. }));
    assert!(state.cancel_map.cancel("t-stop"));

    let last = tokio::time::timeout(Duration::from_secs(5), collect(rx))
        .await
        .unwrap()
        .unwrap();
    match &last {
        TurnEvent::Stopped { content, .. } => assert_eq!(content, "Our villas "),
        other => panic!("expected stopped, got {other:?}"),
    }

    let saved = state.checkpointer.load("t-stop").await.unwrap().unwrap();
    assert_eq!(saved.last_assistant_message().unwrap().content, "Our villas ");
    assert!(!state.cancel_map.is_running("t-stop"));
}
