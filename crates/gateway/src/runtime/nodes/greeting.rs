use sv_domain::state::SessionState;

use crate::runtime::graph::{Graph, StateUpdate, TurnContext};

/// Canned greeting, chosen deterministically from a small pool.
pub fn compose(brand: &str, first_name: Option<&str>, seed: usize) -> String {
    let pool: [String; 3] = match first_name {
        Some(name) => [
            format!("Hi {name}! Welcome to {brand}. What would you like to know about our villas?"),
            format!("Hello {name}, great to hear from you! I'm here to help with anything about {brand}."),
            format!("Hey {name}! Thanks for stopping by {brand}. Ask me about the villas, pricing or the area."),
        ],
        None => [
            format!("Hi there! Welcome to {brand}. What would you like to know about our villas?"),
            format!("Hello, great to hear from you! I'm here to help with anything about {brand}."),
            format!("Hey! Thanks for stopping by {brand}. Ask me about the villas, pricing or the area."),
        ],
    };
    let [a, b, c] = pool;
    match seed % 3 {
        0 => a,
        1 => b,
        _ => c,
    }
}

pub async fn run(graph: &Graph, state: &SessionState, cx: &TurnContext) -> StateUpdate {
    let reply = compose(&graph.config.brand.name, state.first_name(), state.messages.len());
    cx.emit_words(&reply).await;
    StateUpdate::reply(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personalized_when_name_known() {
        let text = compose("Skypearls Villas", Some("Ana"), 0);
        assert!(text.contains("Ana"));
        assert!(text.contains("Skypearls Villas"));
    }

    #[test]
    fn selection_is_deterministic() {
        assert_eq!(compose("B", None, 4), compose("B", None, 1));
        assert_ne!(compose("B", None, 0), compose("B", None, 1));
    }
}
