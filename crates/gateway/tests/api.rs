mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use sv_gateway::api;
use sv_knowledge::testing::StaticRetriever;

use common::{answering_provider, Harness, ANSWER};

fn app(h: &Harness) -> Router {
    api::router(h.state.clone()).with_state(h.state.clone())
}

fn harness() -> Harness {
    Harness::new(
        answering_provider(),
        StaticRetriever::new(&["Every villa has three bedrooms and a plunge pool."]),
    )
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Health and auth
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn health_is_public() {
    let h = harness().with_token("secret");
    let resp = app(&h).oneshot(get("/v1/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");
}

#[tokio::test]
async fn readiness_reports_providers_and_scheduling() {
    let h = harness();
    let resp = app(&h).oneshot(get("/v1/readiness")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["provider_count"], 1);
    assert_eq!(body["scheduling"]["healthy"], true);
}

#[tokio::test]
async fn protected_routes_require_the_token() {
    let h = harness().with_token("secret");

    let resp = app(&h).oneshot(get("/v1/threads")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/v1/threads")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        app(&h).oneshot(wrong).await.unwrap().status(),
        StatusCode::UNAUTHORIZED
    );

    let right = Request::builder()
        .uri("/v1/threads")
        .header(header::AUTHORIZATION, "Bearer secret")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app(&h).oneshot(right).await.unwrap().status(), StatusCode::OK);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn chat_returns_the_reply_and_thread() {
    let h = harness();
    let resp = app(&h)
        .oneshot(post_json(
            "/v1/chat",
            json!({ "message": "How many bedrooms?", "thread_id": "t-api" }),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["thread_id"], "t-api");
    assert_eq!(body["content"], ANSWER);
    assert_eq!(body["stopped"], false);
}

#[tokio::test]
async fn chat_starts_a_thread_when_none_is_given() {
    let h = harness();
    let resp = app(&h)
        .oneshot(post_json("/v1/chat", json!({ "message": "hello" })))
        .await
        .unwrap();
    let body = body_json(resp).await;
    let thread_id = body["thread_id"].as_str().unwrap();
    assert!(!thread_id.is_empty());
    assert!(h.state.threads.get(thread_id).is_some());
}

#[tokio::test]
async fn chat_rejects_invalid_input() {
    let h = harness();

    let resp = app(&h)
        .oneshot(post_json("/v1/chat", json!({ "message": "   " })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app(&h)
        .oneshot(post_json("/v1/chat", json!({ "message": "x".repeat(4001) })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn turn_failure_returns_generic_message() {
    let h = Harness::new(answering_provider(), StaticRetriever::failing());
    let resp = app(&h)
        .oneshot(post_json("/v1/chat", json!({ "message": "Tell me more" })))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error = body_json(resp).await["error"].as_str().unwrap().to_string();
    assert!(error.contains("Skypearls Villas") || error.contains("+63 917 150 4140"));
    assert!(!error.contains("retrieval"));
}

#[tokio::test]
async fn chat_stream_emits_named_sse_events() {
    let h = harness();
    let resp = app(&h)
        .oneshot(post_json(
            "/v1/chat/stream",
            json!({ "message": "How many bedrooms?", "thread_id": "t-sse" }),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("event: token"));
    assert!(text.contains("event: final"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Threads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn thread_detail_and_listing() {
    let h = harness();
    h.reply("t-detail", "How many bedrooms?").await;

    let resp = app(&h).oneshot(get("/v1/threads/t-detail")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["running"], false);

    let resp = app(&h).oneshot(get("/v1/threads")).await.unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["threads"][0]["thread_id"], "t-detail");
}

#[tokio::test]
async fn unknown_thread_is_404() {
    let h = harness();
    let resp = app(&h).oneshot(get("/v1/threads/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stop_without_a_running_turn() {
    let h = harness();
    let resp = app(&h)
        .oneshot(post_json("/v1/threads/t-idle/stop", json!({})))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["stopped"], false);
}

#[tokio::test]
async fn transcript_needs_an_opted_in_lead() {
    let h = harness();
    h.reply("t-anon", "How many bedrooms?").await;

    let resp = app(&h)
        .oneshot(post_json("/v1/threads/t-anon/transcript", json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(h.notifier.attempts(), 0);
}

#[tokio::test]
async fn transcript_is_emailed_to_the_lead() {
    let h = harness();
    let resp = app(&h)
        .oneshot(post_json(
            "/v1/chat",
            json!({
                "message": "How many bedrooms?",
                "thread_id": "t-lead",
                "lead_info": {
                    "first_name": "Ana",
                    "email": "ana@example.com",
                    "transcript_opt_in": true
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app(&h)
        .oneshot(post_json("/v1/threads/t-lead/transcript", json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    // Dispatch runs on its own task.
    for _ in 0..50 {
        if !h.notifier.sent().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["ana@example.com".to_string()]);
    assert!(sent[0].html.contains("How many bedrooms?"));
}
