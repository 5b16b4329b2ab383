use sv_domain::state::{ImageCategory, SessionState};

use crate::runtime::graph::{Graph, StateUpdate, TurnContext};
use crate::runtime::intent;

/// Answer an image request from the configured image sets.
pub async fn run(graph: &Graph, state: &SessionState, cx: &TurnContext) -> StateUpdate {
    let category = intent::image_request(&state.original_question).unwrap_or(ImageCategory::Location);
    let set = graph.config.brand.images.get(category);

    cx.emit_words(&set.response).await;

    StateUpdate {
        pending_reply: Some(set.response.clone()),
        image_urls: Some(set.urls.clone()),
        image_type: Some(category),
        image_context: Some(set.context.clone()),
        ..StateUpdate::default()
    }
}
