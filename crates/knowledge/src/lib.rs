//! Knowledge retrieval over the villa knowledge base.
//!
//! [`KnowledgeRetriever`] is the seam the conversation graph depends on;
//! [`VectorIndexClient`] is the production implementation that embeds the
//! query and calls a similarity-match RPC on a REST vector index.

pub mod provider;
pub mod rest;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use provider::{DisabledRetriever, KnowledgeRetriever};
pub use rest::VectorIndexClient;
pub use types::{MatchRequest, MatchRow};
