//! Opportunity detection: which unfilled qualification field, if any, the
//! conversation currently makes natural to ask about.

use serde::Serialize;
use sv_domain::lead::{QualificationData, QualificationField};
use sv_domain::text::first_match;

use crate::context::{BuyingStage, ConversationContext, Topic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    /// Ask outright.
    Direct,
    /// Tie the question to something the user just said.
    Contextual,
    /// Ask sideways, as part of being helpful.
    Indirect,
}

impl Approach {
    pub fn as_str(self) -> &'static str {
        match self {
            Approach::Direct => "direct",
            Approach::Contextual => "contextual",
            Approach::Indirect => "indirect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub field: QualificationField,
    pub score: f32,
    pub approach: Approach,
    /// The user's words that made this field relevant.
    pub trigger: Option<&'static str>,
}

/// How well a field fits the buyer's stage, in 0..=1.
fn stage_fit(field: QualificationField, stage: BuyingStage) -> f32 {
    use BuyingStage::*;
    use QualificationField as F;
    match field {
        F::PurchaseIntent => match stage {
            Awareness | Interest | Consideration => 1.0,
            _ => 0.8,
        },
        F::AreaFamiliarity => match stage {
            Awareness | Interest => 1.0,
            _ => 0.6,
        },
        F::Timeline => match stage {
            Awareness => 0.4,
            _ => 1.0,
        },
        F::BudgetRange => match stage {
            Awareness => 0.2,
            Interest => 0.6,
            _ => 1.0,
        },
        F::PriorPurchases => match stage {
            Awareness | Interest => 0.4,
            _ => 0.8,
        },
        F::Urgency => match stage {
            Awareness | Interest => 0.3,
            Consideration => 0.6,
            _ => 1.0,
        },
        F::DecisionAuthority => match stage {
            Awareness | Interest => 0.2,
            Consideration => 0.5,
            _ => 1.0,
        },
        F::PaymentPreference => match stage {
            Awareness | Interest => 0.2,
            Consideration | Intent => 0.6,
            _ => 1.0,
        },
    }
}

fn trigger_words(field: QualificationField) -> &'static [&'static str] {
    use QualificationField as F;
    match field {
        F::PurchaseIntent => &[
            "invest", "investment", "rental", "rent", "live", "retire", "vacation", "holiday",
            "move",
        ],
        F::Timeline => &["when", "completion", "move in", "timeline", "turnover", "next year", "ready"],
        F::BudgetRange => &["price", "cost", "how much", "budget", "afford", "million", "php"],
        F::PaymentPreference => &["pay", "payment", "financing", "loan", "installment", "bank", "cash"],
        F::DecisionAuthority => &["wife", "husband", "partner", "spouse", "family", "we", "us"],
        F::AreaFamiliarity => &["siargao", "island", "area", "location", "been to", "visited"],
        F::PriorPurchases => &["own", "bought", "portfolio", "another property", "first property"],
        F::Urgency => &["soon", "asap", "quickly", "urgent", "right away", "now"],
    }
}

/// Topics that make a field relevant even without a direct trigger word.
fn related_topics(field: QualificationField) -> &'static [Topic] {
    use QualificationField as F;
    match field {
        F::PurchaseIntent => &[Topic::Investment, Topic::Lifestyle],
        F::Timeline => &[Topic::Construction],
        F::BudgetRange => &[Topic::Pricing],
        F::PaymentPreference => &[Topic::Financing, Topic::Pricing],
        F::DecisionAuthority => &[Topic::Lifestyle],
        F::AreaFamiliarity => &[Topic::Location],
        F::PriorPurchases => &[Topic::Investment, Topic::Legal],
        F::Urgency => &[Topic::Construction],
    }
}

pub struct OpportunityDetector {
    min_score: f32,
}

impl OpportunityDetector {
    pub fn new(min_score: f32) -> Self {
        Self { min_score }
    }

    /// Rank every field that is neither known nor already asked. Score is
    /// 0.4 × stage fit + 0.35 × trigger strength + 0.25 × readiness.
    pub fn detect(
        &self,
        context: &ConversationContext,
        data: &QualificationData,
        asked: &[QualificationField],
    ) -> Vec<Opportunity> {
        let mut found: Vec<Opportunity> = QualificationField::ALL
            .iter()
            .copied()
            .filter(|f| !data.has(*f) && !asked.contains(f))
            .map(|field| {
                let trigger = first_match(&context.recent_user_text, trigger_words(field));
                let topical = context
                    .topics
                    .iter()
                    .any(|(t, _)| related_topics(field).contains(t));
                let trigger_strength = match (trigger, topical) {
                    (Some(_), _) => 1.0,
                    (None, true) => 0.5,
                    (None, false) => 0.0,
                };
                let score = 0.4 * stage_fit(field, context.stage)
                    + 0.35 * trigger_strength
                    + 0.25 * context.readiness;
                let approach = if trigger.is_some() {
                    Approach::Contextual
                } else if context.readiness >= 0.7 {
                    Approach::Direct
                } else {
                    Approach::Indirect
                };
                Opportunity {
                    field,
                    score,
                    approach,
                    trigger,
                }
            })
            .filter(|o| o.score >= self.min_score)
            .collect();

        found.sort_by(|a, b| b.score.total_cmp(&a.score));
        found
    }
}
