//! Scripted in-process provider for tests across the workspace.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use sv_domain::error::{Error, Result};
use sv_domain::stream::{BoxStream, StreamEvent};

use crate::traits::{
    ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider,
};

type Responder = Box<dyn Fn(&ChatRequest) -> Result<String> + Send + Sync>;

/// A deterministic provider driven by a closure. Streams split the reply
/// into whitespace-delimited tokens.
pub struct ScriptedProvider {
    id: String,
    responder: Responder,
    stream_fail_after: Option<usize>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn with<F>(responder: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            id: "scripted".into(),
            responder: Box::new(responder),
            stream_fail_after: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::with(move |_| Ok(text.clone()))
    }

    pub fn failing() -> Self {
        Self::with(|_| Err(Error::Http("connection refused".into())))
    }

    pub fn named(mut self, id: &str) -> Self {
        self.id = id.into();
        self
    }

    /// Emit `n` tokens and then a stream error.
    pub fn fail_stream_after(mut self, n: usize) -> Self {
        self.stream_fail_after = Some(n);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    fn respond(&self, req: &ChatRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(req.clone());
        (self.responder)(req)
    }
}

/// Split text into tokens that concatenate back to the original.
pub fn split_tokens(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(String::from).collect()
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let content = self.respond(req)?;
        Ok(ChatResponse {
            content,
            usage: None,
            model: req.model.clone().unwrap_or_else(|| "scripted".into()),
            finish_reason: Some("stop".into()),
        })
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let text = self.respond(req)?;
        let mut events: Vec<Result<StreamEvent>> = split_tokens(&text)
            .into_iter()
            .map(|text| Ok(StreamEvent::Token { text }))
            .collect();
        match self.stream_fail_after {
            Some(n) => {
                events.truncate(n);
                events.push(Err(Error::Http("stream reset".into())));
            }
            None => events.push(Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            })),
        }
        Ok(Box::pin(async_stream::stream! {
            for event in events {
                yield event;
            }
        }))
    }

    async fn embeddings(&self, req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        Ok(EmbeddingsResponse {
            embeddings: req.input.iter().map(|t| vec![t.len() as f32, 1.0]).collect(),
        })
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
