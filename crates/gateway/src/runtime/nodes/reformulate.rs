//! Query rewriting after a weak retrieval.

use sv_domain::message::Message;
use sv_domain::state::SessionState;
use sv_domain::trace::TraceEvent;

use crate::runtime::graph::{Graph, StateUpdate};

use super::snippets;

const REFORMULATOR_PROMPT: &str = "You rewrite questions so a semantic search over a villa \
development's knowledge base finds better passages. Keep the user's intent, add likely \
keywords, and reply with the rewritten question only.";

/// Deterministic rewrite used when the model is unavailable or echoes the
/// question back.
pub fn fallback_query(question: &str, brand: &str) -> String {
    format!("Information about {} at {}", question.trim(), brand)
}

fn same_query(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Never fails and never returns the current question unchanged.
pub async fn run(graph: &Graph, state: &SessionState) -> StateUpdate {
    let question = state.question.as_str();
    let brand = graph.config.brand.name.as_str();

    let rewritten = match &graph.reformulator {
        Some(model) => {
            let mut prompt = format!("Question: {question}");
            if let Some(docs) = state.documents.as_deref().filter(|d| !d.is_empty()) {
                prompt.push_str("\n\nThese passages were retrieved but did not answer it:\n");
                prompt.push_str(&snippets(docs, graph.config.retrieval.snippet_chars));
            }
            model
                .complete(vec![Message::system(REFORMULATOR_PROMPT), Message::user(prompt)], false)
                .await
                .map(|r| r.trim().trim_matches('"').trim().to_string())
                .map_err(|e| e.to_string())
                .and_then(|r| {
                    if r.is_empty() {
                        Err("empty rewrite".into())
                    } else if same_query(&r, question) {
                        Err("rewrite repeated the question".into())
                    } else {
                        Ok(r)
                    }
                })
        }
        None => Err("no reformulator model configured".into()),
    };

    let question = match rewritten {
        Ok(q) => q,
        Err(reason) => {
            tracing::warn!(outcome = "degraded", reason = %reason, "reformulation failed, using template");
            TraceEvent::Degraded {
                component: "reformulator".into(),
                reason,
            }
            .emit();
            fallback_query(question, brand)
        }
    };

    tracing::debug!(question = %question, "reformulated query");
    StateUpdate {
        question: Some(question),
        ..StateUpdate::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_differs_from_input() {
        for q in ["price", "", "Information about price at Skypearls Villas"] {
            let rewritten = fallback_query(q, "Skypearls Villas");
            assert_ne!(rewritten, q);
            assert!(rewritten.starts_with("Information about"));
        }
    }

    #[test]
    fn echo_detection_ignores_case_and_whitespace() {
        assert!(same_query(" Pool size? ", "pool size?"));
        assert!(!same_query("pool size", "swimming pool dimensions"));
    }
}
