//! Lead qualification: reads the conversation, decides whether a
//! profiling question fits this turn, crafts it, extracts answers from the
//! user's messages and scores the lead.

pub mod context;
pub mod engine;
pub mod extraction;
pub mod opportunity;
pub mod scoring;
pub mod strategy;

pub use context::{BuyingStage, ContextAnalyzer, ConversationContext, SentimentVector, Topic};
pub use engine::{QualificationEngine, QualificationOutcome};
pub use extraction::Extractor;
pub use opportunity::{Approach, Opportunity, OpportunityDetector};
pub use scoring::{calculate_lead_score, eligible_actions, is_complete, qualification_progress};
pub use strategy::{
    EngagementStrategy, QualificationQuestion, RiskAssessment, RiskLevel, StrategySelector,
};
