pub mod content;
pub mod openai_compat;
pub mod registry;
pub(crate) mod sse;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;
pub mod util;

pub use content::extract_text;
pub use registry::{Embedder, NodeBinding, ProviderRegistry};
pub use traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};
