mod common;

use std::sync::Arc;

use sv_domain::config::Config;
use sv_gateway::bootstrap;
use sv_gateway::runtime::{collect, run_turn, Graph, TurnEvent};
use sv_knowledge::testing::StaticRetriever;
use sv_providers::traits::LlmProvider;
use sv_providers::ProviderRegistry;
use sv_scheduling::testing::FakeScheduling;

use common::{answering_provider, input, ANSWER};

fn file_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.sessions.state_path = dir.to_path_buf();
    config.qualification.enabled = false;
    config
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let mut config = Config::default();
    config.server.port = 0;
    assert!(bootstrap::build_app_state(Arc::new(config)).await.is_err());
}

#[tokio::test]
async fn boots_without_providers_and_fails_turns_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let state = bootstrap::build_app_state(Arc::new(file_config(dir.path())))
        .await
        .unwrap();

    assert!(state.llm.is_empty());
    assert!(state.transcripts.is_some());

    // No embedding provider means retrieval is disabled.
    let (_, rx) = run_turn(state.clone(), input("t-boot", "Tell me about the villas", false));
    assert!(matches!(collect(rx).await, Some(TurnEvent::Error { .. })));
}

#[tokio::test]
async fn file_backend_persists_checkpoint_index_and_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(file_config(dir.path()));
    let mut state = bootstrap::build_app_state(config.clone()).await.unwrap();

    let registry = Arc::new(ProviderRegistry::from_providers(
        vec![Arc::new(answering_provider()) as Arc<dyn LlmProvider>],
        config.llm.nodes.clone(),
    ));
    state.graph = Arc::new(Graph::new(
        config.clone(),
        &registry,
        Arc::new(StaticRetriever::new(&["Three bedrooms per villa."])),
        Arc::new(FakeScheduling::healthy()),
    ));
    state.llm = registry;

    let (_, rx) = run_turn(state.clone(), input("t-file", "How many bedrooms?", false));
    match collect(rx).await {
        Some(TurnEvent::Final { content, .. }) => assert_eq!(content, ANSWER),
        other => panic!("expected final, got {other:?}"),
    }

    assert!(dir.path().join("checkpoints").join("t-file.json").exists());
    assert!(dir.path().join("threads.json").exists());

    let transcripts = state.transcripts.as_ref().unwrap();
    let lines = transcripts.read("t-file").await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].content, "How many bedrooms?");
    assert_eq!(lines[1].content, ANSWER);

    // A restarted process sees the same conversation.
    let restarted = bootstrap::build_app_state(config).await.unwrap();
    let saved = restarted.checkpointer.load("t-file").await.unwrap().unwrap();
    assert_eq!(saved.messages.len(), 2);
    assert_eq!(restarted.threads.get("t-file").unwrap().turns, 1);
}
