//! In-process retriever for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use sv_domain::error::{Error, Result};
use sv_domain::state::Document;

use crate::provider::KnowledgeRetriever;

/// Returns a fixed passage list (truncated to `k`), or fails on demand.
pub struct StaticRetriever {
    documents: Vec<Document>,
    fail: bool,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl StaticRetriever {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            documents: texts.iter().map(|t| Document::new(*t)).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(&[])
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::empty()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl KnowledgeRetriever for StaticRetriever {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.to_string());
        if self.fail {
            return Err(Error::Retrieval("vector index unreachable".into()));
        }
        Ok(self.documents.iter().take(k).cloned().collect())
    }
}
