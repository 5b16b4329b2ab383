//! Post-responder merge: extraction and scoring, at most one profiling
//! question, text calls to action, and the assistant message itself.

use sv_domain::lead::ActionTrigger;
use sv_domain::message::Message;
use sv_domain::state::SessionState;

use crate::runtime::graph::{Graph, NodeId, StateUpdate, TurnContext};

use super::{booking_suggestion, mentions_booking};

/// Returns the state update plus the triggers that need a side effect
/// outside the graph (team notification).
pub async fn run(
    graph: &Graph,
    state: &SessionState,
    cx: &TurnContext,
    terminal: NodeId,
) -> (StateUpdate, Vec<ActionTrigger>) {
    // Greeting, booking and image replies already end in their own call to
    // action; only answers get a profiling question.
    let answered = terminal == NodeId::Generate;
    let outcome = graph.qualification.evaluate(state, answered).await;
    let brand = &graph.config.brand;

    let mut reply = state.pending_reply.clone().unwrap_or_default();
    let mut fired = Vec::new();
    let mut pending = Vec::new();

    for action in outcome
        .actions
        .iter()
        .copied()
        .filter(|a| !state.actions_fired.contains(a))
    {
        let line = match action {
            ActionTrigger::NotifyTeam => {
                pending.push(action);
                continue;
            }
            _ if !answered => continue,
            ActionTrigger::SuggestBooking => {
                (!mentions_booking(&reply)).then(|| booking_suggestion(brand))
            }
            ActionTrigger::ShareContact => {
                (!reply.contains(&brand.contact_number)).then(|| brand.contact_line())
            }
        };
        if let Some(line) = line {
            append(&mut reply, &line, cx).await;
        }
        fired.push(action);
    }

    let mut questions_asked = Vec::new();
    if let Some(question) = &outcome.question {
        append(&mut reply, &question.text, cx).await;
        questions_asked.push(question.field);
    }

    let messages = if reply.is_empty() {
        Vec::new()
    } else {
        vec![Message::assistant(reply.clone())]
    };

    let update = StateUpdate {
        messages,
        pending_reply: Some(reply),
        qualification_data: Some(outcome.data),
        lead_score: Some(outcome.score),
        questions_asked,
        actions_fired: fired,
        ..StateUpdate::default()
    };
    (update, pending)
}

async fn append(reply: &mut String, line: &str, cx: &TurnContext) {
    let chunk = if reply.is_empty() {
        line.to_string()
    } else {
        format!("\n\n{line}")
    };
    cx.emit_words(&chunk).await;
    reply.push_str(&chunk);
}
