//! Strategy selection: turn the best opportunity into one concrete
//! question, or decide that asking this turn is too risky.

use serde::Serialize;
use sv_domain::lead::QualificationField;

use crate::context::{ConversationContext, Topic};
use crate::opportunity::{Approach, Opportunity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementStrategy {
    Aggressive,
    Moderate,
    Conservative,
}

impl EngagementStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            EngagementStrategy::Aggressive => "aggressive",
            EngagementStrategy::Moderate => "moderate",
            EngagementStrategy::Conservative => "conservative",
        }
    }

    pub fn for_context(context: &ConversationContext) -> Self {
        if context.readiness >= 0.7 && context.fatigue < 0.3 {
            EngagementStrategy::Aggressive
        } else if context.readiness >= 0.4 {
            EngagementStrategy::Moderate
        } else {
            EngagementStrategy::Conservative
        }
    }

    fn transition(self) -> &'static str {
        match self {
            EngagementStrategy::Aggressive => "quick question: ",
            EngagementStrategy::Moderate => "if you don't mind me asking, ",
            EngagementStrategy::Conservative => "just so I can help better, ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub fatigue_risk: f32,
    pub disruption_risk: f32,
    pub engagement_loss_risk: f32,
    pub score: f32,
    pub overall: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualificationQuestion {
    pub field: QualificationField,
    pub strategy: EngagementStrategy,
    pub approach: Approach,
    pub hook: Option<&'static str>,
    pub transition: &'static str,
    pub benefit: &'static str,
    /// The full sentence appended to the answer.
    pub text: String,
}

/// What the selector decided for this turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyDecision {
    pub strategy: EngagementStrategy,
    pub risk: RiskAssessment,
    pub question: Option<QualificationQuestion>,
}

fn template(field: QualificationField, strategy: EngagementStrategy) -> &'static str {
    use EngagementStrategy::*;
    use QualificationField as F;
    match (field, strategy) {
        (F::PurchaseIntent, Aggressive) => {
            "are you looking at the villas as an investment, a home, or a vacation place?"
        }
        (F::PurchaseIntent, Moderate) => {
            "are you picturing this more as an investment or as a place for yourself?"
        }
        (F::PurchaseIntent, Conservative) => {
            "what's drawing you to Siargao, is it more investment or lifestyle?"
        }
        (F::Timeline, Aggressive) => "when are you hoping to make a purchase?",
        (F::Timeline, Moderate) => "do you have a timeframe in mind for buying?",
        (F::Timeline, Conservative) => {
            "are you planning something soon, or exploring for later on?"
        }
        (F::BudgetRange, Aggressive) => "what budget range are you working with?",
        (F::BudgetRange, Moderate) => "do you have a budget range in mind?",
        (F::BudgetRange, Conservative) => {
            "would it help if I focused on a particular price range?"
        }
        (F::PaymentPreference, Aggressive) => {
            "are you thinking cash, bank financing, or an installment plan?"
        }
        (F::PaymentPreference, Moderate) => {
            "would you prefer paying in full or spreading it out in installments?"
        }
        (F::PaymentPreference, Conservative) => {
            "would it be useful to hear about our payment options?"
        }
        (F::DecisionAuthority, Aggressive) => {
            "will you be making this decision yourself, or with someone else?"
        }
        (F::DecisionAuthority, Moderate) => {
            "is anyone else involved in choosing the property with you?"
        }
        (F::DecisionAuthority, Conservative) => {
            "are you exploring this on your own or with family?"
        }
        (F::AreaFamiliarity, Aggressive) => "how well do you know Siargao?",
        (F::AreaFamiliarity, Moderate) => "have you spent time in Siargao before?",
        (F::AreaFamiliarity, Conservative) => "is Siargao new to you, or have you visited already?",
        (F::PriorPurchases, Aggressive) => "have you bought property before, here or abroad?",
        (F::PriorPurchases, Moderate) => "would this be your first property purchase?",
        (F::PriorPurchases, Conservative) => "have you owned a vacation property before?",
        (F::Urgency, Aggressive) => "how soon would you like to move forward?",
        (F::Urgency, Moderate) => "is this something you'd like to act on soon?",
        (F::Urgency, Conservative) => {
            "no rush at all, but are you hoping to decide in the near future?"
        }
    }
}

fn benefit(field: QualificationField) -> &'static str {
    use QualificationField as F;
    match field {
        F::PurchaseIntent => "That way I can share the details that matter most to you.",
        F::Timeline => "That helps me tell you which villas will be ready in time.",
        F::BudgetRange => "That way I only show you options that fit.",
        F::PaymentPreference => "I can then walk you through the terms that suit you.",
        F::DecisionAuthority => "I'm happy to include them in anything I send over.",
        F::AreaFamiliarity => "That helps me know how much local context to share.",
        F::PriorPurchases => "That helps me tailor the ownership details.",
        F::Urgency => "That way I can flag current availability for you.",
    }
}

fn hook(topic: Topic) -> &'static str {
    match topic {
        Topic::Location => "since you're asking about the location, ",
        Topic::Pricing => "since pricing came up, ",
        Topic::Investment => "since you mentioned investing, ",
        Topic::Amenities => "while we're on the amenities, ",
        Topic::Construction => "since you asked about construction, ",
        Topic::Lifestyle => "since lifestyle matters to you, ",
        Topic::Financing => "since financing came up, ",
        Topic::Legal => "since you're looking into ownership details, ",
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct StrategySelector {
    risk_veto: f32,
}

impl StrategySelector {
    pub fn new(risk_veto: f32) -> Self {
        Self { risk_veto }
    }

    /// Fatigue carries half the weight; disruption and engagement loss a
    /// quarter each. A single component at 0.85 or above is high risk on
    /// its own.
    pub fn assess_risk(&self, context: &ConversationContext, opportunity: &Opportunity) -> RiskAssessment {
        let fatigue_risk = context.fatigue.clamp(0.0, 1.0);
        let disruption_risk = match opportunity.approach {
            Approach::Contextual => 0.2,
            _ if context.user_asked_question => 0.6,
            _ => 0.4,
        };
        let engagement_loss_risk = (1.0 - context.engagement).clamp(0.0, 1.0);
        let score = 0.5 * fatigue_risk + 0.25 * disruption_risk + 0.25 * engagement_loss_risk;

        let peak = fatigue_risk.max(disruption_risk).max(engagement_loss_risk);
        let overall = if score >= self.risk_veto || peak >= 0.85 {
            RiskLevel::High
        } else if score >= 0.35 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        RiskAssessment {
            fatigue_risk,
            disruption_risk,
            engagement_loss_risk,
            score,
            overall,
        }
    }

    pub fn decide(
        &self,
        context: &ConversationContext,
        opportunity: &Opportunity,
        first_name: Option<&str>,
    ) -> StrategyDecision {
        let strategy = EngagementStrategy::for_context(context);
        let risk = self.assess_risk(context, opportunity);
        let question = (risk.overall != RiskLevel::High)
            .then(|| craft(opportunity, strategy, context.top_topic(), first_name));
        StrategyDecision {
            strategy,
            risk,
            question,
        }
    }
}

fn craft(
    opportunity: &Opportunity,
    strategy: EngagementStrategy,
    topic: Option<Topic>,
    first_name: Option<&str>,
) -> QualificationQuestion {
    let hook = match (opportunity.approach, topic) {
        (Approach::Contextual, Some(t)) => Some(hook(t)),
        _ => None,
    };
    let transition = strategy.transition();
    let body = template(opportunity.field, strategy);

    let lead = match (hook, first_name) {
        (Some(h), _) => h.to_string(),
        (None, Some(name)) => format!("{name}, {transition}"),
        (None, None) => transition.to_string(),
    };
    let benefit = benefit(opportunity.field);
    let text = format!("{} {benefit}", capitalize_first(&format!("{lead}{body}")));

    QualificationQuestion {
        field: opportunity.field,
        strategy,
        approach: opportunity.approach,
        hook,
        transition,
        benefit,
        text,
    }
}
