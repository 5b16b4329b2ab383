use sv_domain::error::Result;
use sv_domain::message::Message;
use sv_domain::stream::{BoxStream, StreamEvent, Usage};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Sampling temperature. `None` lets the provider choose.
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Ask the model for a bare JSON object.
    pub json_mode: bool,
    /// Model override. `None` uses the provider's default model.
    pub model: Option<String>,
}

/// A completed chat response, already normalized to plain text.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingsRequest {
    pub input: Vec<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingsResponse {
    /// One vector per input, in input order.
    pub embeddings: Vec<Vec<f32>>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM backend. Adapters translate between these types and a vendor's
/// wire format; callers only ever see plain text.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;

    /// Stream token events in generation order, terminated by
    /// [`StreamEvent::Done`] or an error.
    async fn chat_stream(&self, req: &ChatRequest)
        -> Result<BoxStream<'static, Result<StreamEvent>>>;

    async fn embeddings(&self, req: EmbeddingsRequest) -> Result<EmbeddingsResponse>;

    fn provider_id(&self) -> &str;
}
