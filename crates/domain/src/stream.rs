use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted during LLM streaming (provider-agnostic).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A text token chunk.
    #[serde(rename = "token")]
    Token { text: String },

    /// Stream is finished.
    #[serde(rename = "done")]
    Done {
        usage: Option<Usage>,
        finish_reason: Option<String>,
    },

    /// An error occurred during streaming.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Token usage for a completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}
