use async_trait::async_trait;
use sv_domain::error::{Error, Result};
use sv_domain::state::Document;

/// Similarity search over the knowledge base. Implementations must be
/// idempotent and free of side effects.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    /// Top-`k` passages for `query`, best match first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>>;
}

/// Stand-in used when no embedding provider is configured. Every search
/// fails, which aborts the turn.
pub struct DisabledRetriever {
    reason: String,
}

impl DisabledRetriever {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl KnowledgeRetriever for DisabledRetriever {
    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<Document>> {
        Err(Error::Retrieval(self.reason.clone()))
    }
}
