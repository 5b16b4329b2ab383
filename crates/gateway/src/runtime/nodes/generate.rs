//! Answer generation.
//!
//! The primary path streams model tokens straight to the sink. Without
//! passages, or when the model fails before producing text, a templated
//! fallback is word-streamed instead. Calls to action are appended (and
//! streamed) after the answer so the emitted tokens always concatenate to
//! the final reply.

use futures_util::StreamExt;
use sv_domain::config::BrandConfig;
use sv_domain::message::Message;
use sv_domain::state::SessionState;
use sv_domain::stream::StreamEvent;
use sv_domain::trace::TraceEvent;

use crate::runtime::graph::{Graph, StateUpdate, TurnContext};
use crate::runtime::intent;

use super::{booking_suggestion, mentions_booking, snippets};

/// Messages of history the generator sees, including the current one.
const HISTORY_WINDOW: usize = 10;

/// Passage length in the generation prompt.
const CONTEXT_CHARS: usize = 2_000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompt & templates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn build_prompt(graph: &Graph, state: &SessionState) -> Vec<Message> {
    let brand = &graph.config.brand;
    let mut system = format!(
        "You are the friendly sales concierge for {name}, a boutique villa development. \
         Answer using only the context below. Keep replies concise, warm and specific. \
         If the context does not cover the question, say so honestly and offer to connect \
         the visitor with the team. Never invent prices, dates or availability.",
        name = brand.name
    );
    if let Some(first_name) = state.first_name() {
        system.push_str(&format!(" The visitor's name is {first_name}."));
    }
    if let Some(docs) = state.documents.as_deref() {
        system.push_str("\n\nContext:\n");
        system.push_str(&snippets(docs, CONTEXT_CHARS));
    }

    let skip = state.messages.len().saturating_sub(HISTORY_WINDOW);
    let mut messages = vec![Message::system(system)];
    messages.extend(state.messages.iter().skip(skip).cloned());
    messages
}

/// The reply used when there is nothing to answer from or the model failed.
pub fn fallback_reply(brand: &BrandConfig, first_name: Option<&str>, first_turn: bool) -> String {
    let b = &brand.name;
    match (first_turn, first_name) {
        (true, Some(name)) => format!(
            "Hi {name}! Thanks for reaching out to {b}. I don't have the details on that in front \
             of me right now, but our team will be happy to help."
        ),
        (true, None) => format!(
            "Thanks for reaching out to {b}! I don't have the details on that in front of me right \
             now, but our team will be happy to help."
        ),
        (false, Some(name)) => format!(
            "Sorry {name}, I couldn't find that in my notes about {b}. Our team can give you an \
             accurate answer."
        ),
        (false, None) => format!(
            "Sorry, I couldn't find that in my notes about {b}. Our team can give you an accurate \
             answer."
        ),
    }
}

/// Contact and booking lines the question calls for that the reply does
/// not already contain.
pub fn calls_to_action(brand: &BrandConfig, question: &str, reply: &str) -> String {
    let mut extra = String::new();
    if intent::wants_contact(question) && !reply.contains(&brand.contact_number) {
        extra.push_str("\n\n");
        extra.push_str(&brand.contact_line());
    }
    if intent::wants_booking_suggestion(question) && !mentions_booking(reply) {
        extra.push_str("\n\n");
        extra.push_str(&booking_suggestion(brand));
    }
    extra
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model calls
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum Draft {
    /// The model finished normally.
    Complete(String),
    /// The model stopped after producing some text.
    Partial(String, String),
    /// Nothing usable was produced.
    Failed(String),
    /// The turn was cancelled mid-stream.
    Cancelled(String),
}

async fn stream_answer(graph: &Graph, state: &SessionState, cx: &TurnContext) -> Draft {
    let Some(model) = &graph.generator else {
        return Draft::Failed("no generator model configured".into());
    };
    let mut stream = match model.stream(build_prompt(graph, state)).await {
        Ok(s) => s,
        Err(e) => return Draft::Failed(e.to_string()),
    };

    let mut text = String::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cx.cancel.cancelled() => return Draft::Cancelled(text),
            next = stream.next() => next,
        };
        match next {
            Some(Ok(StreamEvent::Token { text: token })) => {
                text.push_str(&token);
                cx.emit_token(&token).await;
            }
            Some(Ok(StreamEvent::Done { .. })) | None => break,
            Some(Ok(StreamEvent::Error { message })) => return cut_short(text, message),
            Some(Err(e)) => return cut_short(text, e.to_string()),
        }
    }

    if text.trim().is_empty() {
        Draft::Failed("model returned no text".into())
    } else {
        Draft::Complete(text)
    }
}

fn cut_short(text: String, reason: String) -> Draft {
    if text.trim().is_empty() {
        Draft::Failed(reason)
    } else {
        Draft::Partial(text, reason)
    }
}

async fn complete_answer(graph: &Graph, state: &SessionState) -> Draft {
    let Some(model) = &graph.generator else {
        return Draft::Failed("no generator model configured".into());
    };
    match model.complete(build_prompt(graph, state), false).await {
        Ok(text) if !text.trim().is_empty() => Draft::Complete(text),
        Ok(_) => Draft::Failed("model returned no text".into()),
        Err(e) => Draft::Failed(e.to_string()),
    }
}

fn degraded(reason: &str) {
    tracing::warn!(outcome = "degraded", reason, "generation failed, using fallback reply");
    TraceEvent::Degraded {
        component: "generator".into(),
        reason: reason.into(),
    }
    .emit();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Node
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Never fails: every failure resolves to on-brand text.
pub async fn run(graph: &Graph, state: &SessionState, cx: &TurnContext) -> StateUpdate {
    let brand = &graph.config.brand;

    let draft = if !state.has_documents() {
        Draft::Failed("no passages retrieved".into())
    } else if cx.is_streaming() {
        stream_answer(graph, state, cx).await
    } else {
        complete_answer(graph, state).await
    };

    let mut reply = match draft {
        Draft::Cancelled(partial) => return StateUpdate::reply(partial),
        Draft::Complete(text) => text,
        Draft::Partial(text, reason) => {
            degraded(&reason);
            // The contact line is the only safe way to finish a cut-off answer.
            let mut extra = String::new();
            if !text.contains(&brand.contact_number) {
                extra = format!("\n\n{}", brand.contact_line());
            }
            cx.emit_words(&extra).await;
            text + &extra
        }
        Draft::Failed(reason) => {
            degraded(&reason);
            let fallback = fallback_reply(brand, state.first_name(), state.is_first_turn());
            cx.emit_words(&fallback).await;
            fallback
        }
    };

    let extra = calls_to_action(brand, &state.original_question, &reply);
    if !extra.is_empty() {
        cx.emit_words(&extra).await;
        reply.push_str(&extra);
    }

    StateUpdate::reply(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_variants() {
        let brand = BrandConfig::default();
        let first = fallback_reply(&brand, Some("Ana"), true);
        assert!(first.starts_with("Hi Ana!"));
        assert!(first.contains("Skypearls Villas"));

        let later = fallback_reply(&brand, None, false);
        assert!(later.starts_with("Sorry,"));
        assert!(later.contains("Skypearls Villas"));
    }

    #[test]
    fn price_question_gets_contact_line() {
        let brand = BrandConfig::default();
        let extra = calls_to_action(&brand, "price", "Villas start at a fair price.");
        assert!(extra.contains(&brand.contact_number));
        assert!(!mentions_booking(&extra));
    }

    #[test]
    fn existing_contact_is_not_repeated() {
        let brand = BrandConfig::default();
        let reply = format!("Call us on {}.", brand.contact_number);
        assert!(calls_to_action(&brand, "what's your phone number?", &reply).is_empty());
    }

    #[test]
    fn visit_question_gets_booking_suggestion() {
        let brand = BrandConfig::default();
        let extra = calls_to_action(&brand, "Can I visit next month?", "Yes, visits are welcome.");
        assert!(mentions_booking(&extra));
    }
}
