//! Relevance grading and greeting detection.

use std::sync::OnceLock;

use regex::Regex;
use sv_domain::message::Message;
use sv_domain::state::{SessionState, GREETING_QUALITY};
use sv_domain::trace::TraceEvent;

use crate::runtime::graph::{Graph, StateUpdate};
use crate::runtime::intent;

use super::snippets;

/// Whole-message greetings, compared after lowercasing and trimming
/// punctuation.
const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "hi there",
    "hello there",
    "hey there",
    "how are you",
    "good morning",
    "good afternoon",
    "good evening",
    "greetings",
    "howdy",
    "what's up",
];

const GRADER_PROMPT: &str = "You judge how well retrieved passages answer a question about a \
villa development. Reply with a single number between 0 and 1, where 1 means the passages \
fully answer the question and 0 means they are unrelated. Reply with the number only.";

pub fn is_greeting(text: &str) -> bool {
    let normalized = text
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() && c != '\'')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    GREETINGS.contains(&normalized.as_str())
}

/// First decimal number in a grader reply, clamped to [0, 1].
pub fn parse_score(raw: &str) -> Option<f32> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| Regex::new(r"\d*\.?\d+").expect("score regex is valid"));
    re.find(raw)
        .and_then(|m| m.as_str().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

/// Never fails: every problem grades as 0.
pub async fn run(graph: &Graph, state: &SessionState) -> StateUpdate {
    if is_greeting(&state.question) {
        return StateUpdate {
            is_greeting: Some(true),
            is_booking_intent: Some(false),
            show_images: Some(false),
            document_quality: Some(GREETING_QUALITY),
            ..StateUpdate::default()
        };
    }

    let intent_text = &state.original_question;
    let mut update = StateUpdate {
        is_greeting: Some(false),
        is_booking_intent: Some(intent::is_booking_request(intent_text)),
        show_images: Some(intent::image_request(intent_text).is_some()),
        ..StateUpdate::default()
    };

    let documents = match state.documents.as_deref() {
        Some(docs) if !docs.is_empty() => docs,
        _ => {
            update.document_quality = Some(0.0);
            return update;
        }
    };

    let quality = match &graph.grader {
        Some(grader) => {
            let prompt = format!(
                "Question: {}\n\nPassages:\n{}",
                state.question,
                snippets(documents, graph.config.retrieval.snippet_chars)
            );
            let reply = grader
                .complete(vec![Message::system(GRADER_PROMPT), Message::user(prompt)], false)
                .await;
            match reply.map(|r| (parse_score(&r), r)) {
                Ok((Some(score), _)) => score,
                Ok((None, raw)) => degraded(&format!("unparseable grade {raw:?}")),
                Err(e) => degraded(&e.to_string()),
            }
        }
        None => degraded("no grader model configured"),
    };

    update.document_quality = Some(quality);
    update
}

fn degraded(reason: &str) -> f32 {
    tracing::warn!(outcome = "degraded", reason, "grading failed, scoring 0");
    TraceEvent::Degraded {
        component: "grader".into(),
        reason: reason.into(),
    }
    .emit();
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_patterns_are_exact() {
        assert!(is_greeting("hi"));
        assert!(is_greeting("Hello!"));
        assert!(is_greeting("  How are you?  "));
        assert!(is_greeting("Good   morning."));
        assert!(is_greeting("what's up"));
        assert!(!is_greeting("hi, what does a villa cost?"));
        assert!(!is_greeting("history"));
    }

    #[test]
    fn score_parsing() {
        assert_eq!(parse_score("0.85"), Some(0.85));
        assert_eq!(parse_score("Relevance: .4"), Some(0.4));
        assert_eq!(parse_score("7"), Some(1.0));
        assert_eq!(parse_score("not sure"), None);
    }
}
