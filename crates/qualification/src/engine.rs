//! The qualification façade run once per turn after the answer is drafted.

use serde::Serialize;
use sv_domain::config::{NodeRole, QualificationConfig};
use sv_domain::lead::{ActionTrigger, LeadScore, QualificationData};
use sv_domain::state::SessionState;
use sv_domain::trace::TraceEvent;
use sv_providers::{NodeBinding, ProviderRegistry};

use crate::context::{analyze_with, BuyingStage, ContextAnalyzer, SentimentVector};
use crate::extraction::Extractor;
use crate::opportunity::OpportunityDetector;
use crate::scoring::{calculate_lead_score, eligible_actions, is_complete, qualification_progress};
use crate::strategy::{EngagementStrategy, QualificationQuestion, RiskLevel, StrategySelector};

#[derive(Debug, Clone, Serialize)]
pub struct QualificationOutcome {
    /// Existing data merged with anything extracted this turn.
    pub data: QualificationData,
    pub question: Option<QualificationQuestion>,
    pub score: LeadScore,
    pub progress: f32,
    pub complete: bool,
    pub actions: Vec<ActionTrigger>,
    pub stage: BuyingStage,
    pub strategy: Option<EngagementStrategy>,
    pub risk: Option<RiskLevel>,
}

pub struct QualificationEngine {
    config: QualificationConfig,
    analyzer: ContextAnalyzer,
    extractor: Extractor,
    detector: OpportunityDetector,
    selector: StrategySelector,
}

impl QualificationEngine {
    pub fn new(
        config: QualificationConfig,
        analyst: Option<NodeBinding>,
        extractor: Option<NodeBinding>,
    ) -> Self {
        Self {
            analyzer: ContextAnalyzer::new(analyst),
            extractor: Extractor::new(extractor),
            detector: OpportunityDetector::new(config.min_opportunity_score),
            selector: StrategySelector::new(config.risk_veto),
            config,
        }
    }

    pub fn from_registry(registry: &ProviderRegistry, config: &QualificationConfig) -> Self {
        Self::new(
            config.clone(),
            registry.for_node(NodeRole::Analyst),
            registry.for_node(NodeRole::Extractor),
        )
    }

    pub fn config(&self) -> &QualificationConfig {
        &self.config
    }

    /// Extract, score and (when `ask_allowed`) pick at most one question.
    /// Never fails: every model-backed step has a neutral default.
    pub async fn evaluate(&self, state: &SessionState, ask_allowed: bool) -> QualificationOutcome {
        let mut data = state.qualification_data.clone();

        if !self.config.enabled {
            let score = calculate_lead_score(&data);
            return QualificationOutcome {
                progress: qualification_progress(&data),
                data,
                question: None,
                score,
                complete: false,
                actions: Vec::new(),
                stage: BuyingStage::Awareness,
                strategy: None,
                risk: None,
            };
        }

        let latest = state
            .user_messages()
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let extracted = self.extractor.extract(latest).await;
        data.merge(&extracted);

        let score = calculate_lead_score(&data);
        let progress = qualification_progress(&data);

        // Sentiment only matters when a question might be asked.
        let context = if ask_allowed {
            self.analyzer.analyze(state).await
        } else {
            analyze_with(state, SentimentVector::neutral())
        };

        let complete = is_complete(progress, context.stage, &score, &self.config);
        let actions = if complete {
            eligible_actions(&score, &self.config)
        } else {
            Vec::new()
        };

        let mut strategy = None;
        let mut risk = None;
        let mut question = None;
        if ask_allowed && !complete {
            let opportunities = self.detector.detect(&context, &data, &state.questions_asked);
            if let Some(top) = opportunities.first() {
                let decision = self.selector.decide(&context, top, state.first_name());
                strategy = Some(decision.strategy);
                risk = Some(decision.risk.overall);
                question = decision.question;
            }
        }

        TraceEvent::QualificationDecision {
            thread_id: state.thread_id.clone(),
            asked: question.as_ref().map(|q| q.field.as_str().to_string()),
            strategy: strategy.map(|s| s.as_str().to_string()),
            risk: risk.map(|r| r.as_str().to_string()),
            score: score.total_score,
            progress,
            complete,
        }
        .emit();

        QualificationOutcome {
            data,
            question,
            score,
            progress,
            complete,
            actions,
            stage: context.stage,
            strategy,
            risk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sv_domain::lead::{QualificationField, QualificationTier};

    #[tokio::test]
    async fn no_providers_still_scores_and_asks() {
        let engine = QualificationEngine::new(QualificationConfig::default(), None, None);
        let mut state = SessionState::new("t");
        state.begin_turn("How much does a villa cost?");
        let out = engine.evaluate(&state, true).await;
        assert_eq!(out.score.tier, QualificationTier::Unqualified);
        assert!(!out.complete);
        let q = out.question.expect("a question");
        assert_eq!(q.field, QualificationField::BudgetRange);
    }

    #[tokio::test]
    async fn disabled_engine_never_asks() {
        let cfg = QualificationConfig {
            enabled: false,
            ..Default::default()
        };
        let engine = QualificationEngine::new(cfg, None, None);
        let mut state = SessionState::new("t");
        state.begin_turn("How much does a villa cost?");
        let out = engine.evaluate(&state, true).await;
        assert!(out.question.is_none());
    }

    #[tokio::test]
    async fn ask_not_allowed_means_no_question() {
        let engine = QualificationEngine::new(QualificationConfig::default(), None, None);
        let mut state = SessionState::new("t");
        state.begin_turn("How much does a villa cost?");
        assert!(engine.evaluate(&state, false).await.question.is_none());
    }
}
