use chrono::Utc;
use sv_domain::error::Result;
use sv_domain::state::SessionState;

use crate::runtime::graph::{Graph, StateUpdate};

/// Fetch the top-k passages for the current question. Failures abort the
/// turn.
pub async fn run(graph: &Graph, state: &SessionState) -> Result<StateUpdate> {
    let k = graph.config.retrieval.k;
    let documents = graph.retriever.search(&state.question, k).await.map_err(|e| {
        tracing::error!(outcome = "fatal", error = %e, query = %state.question, "retrieval failed");
        e
    })?;

    tracing::debug!(results = documents.len(), attempt = state.retrieval_attempts + 1, "retrieved passages");

    Ok(StateUpdate {
        documents: Some(documents),
        retrieval_attempts: Some(state.retrieval_attempts + 1),
        last_retrieval: Some(Utc::now()),
        ..StateUpdate::default()
    })
}
