//! Lead scoring, qualification progress and action eligibility.
//!
//! Scores are recomputed from scratch on every turn. The four core
//! dimensions contribute up to 25 points each, engagement signals add a
//! small bonus, and the total is clamped to 0..=100.

use chrono::Utc;
use sv_domain::config::QualificationConfig;
use sv_domain::lead::{
    ActionTrigger, AreaFamiliarity, BudgetRange, DecisionAuthority, LeadScore, PurchaseIntent,
    QualificationData, QualificationField, QualificationTier, ScoreBreakdown, Timeline, Urgency,
};

use crate::context::BuyingStage;

fn intent_points(v: PurchaseIntent) -> u8 {
    match v {
        PurchaseIntent::Investment => 25,
        PurchaseIntent::Residence => 22,
        PurchaseIntent::VacationHome => 20,
        PurchaseIntent::Exploring => 5,
    }
}

fn timeline_points(v: Timeline) -> u8 {
    match v {
        Timeline::Immediate => 25,
        Timeline::Within3Months => 20,
        Timeline::Within6Months => 15,
        Timeline::WithinYear => 10,
        Timeline::Exploring => 3,
    }
}

fn budget_points(v: BudgetRange) -> u8 {
    match v {
        BudgetRange::Above35m => 25,
        BudgetRange::From25mTo35m => 20,
        BudgetRange::From15mTo25m => 15,
        BudgetRange::Below15m => 8,
    }
}

fn authority_points(v: DecisionAuthority) -> u8 {
    match v {
        DecisionAuthority::SoleDecision => 25,
        DecisionAuthority::JointDecision => 18,
        DecisionAuthority::Influencer => 10,
        DecisionAuthority::Researcher => 5,
    }
}

fn engagement_bonus(data: &QualificationData) -> u8 {
    let prior = match data.prior_purchases {
        Some(true) => 5,
        _ => 0,
    };
    let area = match data.area_familiarity {
        Some(AreaFamiliarity::VeryFamiliar) => 5,
        Some(AreaFamiliarity::SomewhatFamiliar) => 3,
        Some(AreaFamiliarity::NotFamiliar) | None => 0,
    };
    let urgency = match data.urgency {
        Some(Urgency::High) => 5,
        Some(Urgency::Medium) => 2,
        Some(Urgency::Low) | None => 0,
    };
    prior + area + urgency
}

pub fn calculate_lead_score(data: &QualificationData) -> LeadScore {
    let breakdown = ScoreBreakdown {
        intent: data.purchase_intent.map(intent_points).unwrap_or(0),
        timeline: data.timeline.map(timeline_points).unwrap_or(0),
        budget: data.budget_range.map(budget_points).unwrap_or(0),
        authority: data.decision_authority.map(authority_points).unwrap_or(0),
        engagement_bonus: engagement_bonus(data),
    };
    let sum = breakdown.intent as u32
        + breakdown.timeline as u32
        + breakdown.budget as u32
        + breakdown.authority as u32
        + breakdown.engagement_bonus as u32;
    let total_score = sum.min(100) as u8;

    LeadScore {
        total_score,
        breakdown,
        tier: QualificationTier::from_score(total_score),
        calculated_at: Utc::now(),
    }
}

fn field_weight(field: QualificationField) -> f32 {
    match field {
        QualificationField::PurchaseIntent => 0.20,
        QualificationField::Timeline => 0.20,
        QualificationField::BudgetRange => 0.20,
        QualificationField::DecisionAuthority => 0.15,
        QualificationField::PaymentPreference => 0.10,
        QualificationField::AreaFamiliarity => 0.05,
        QualificationField::PriorPurchases => 0.05,
        QualificationField::Urgency => 0.05,
    }
}

/// Weighted share of qualification fields that are filled, in 0..=1.
pub fn qualification_progress(data: &QualificationData) -> f32 {
    let filled: f32 = QualificationField::ALL
        .iter()
        .filter(|f| data.has(**f))
        .map(|f| field_weight(*f))
        .sum();
    filled.clamp(0.0, 1.0)
}

pub fn is_complete(
    progress: f32,
    stage: BuyingStage,
    score: &LeadScore,
    config: &QualificationConfig,
) -> bool {
    // Tolerate float accumulation so 0.8 of weights reads as 0.8.
    progress + 1e-4 >= config.completion_threshold
        || (stage == BuyingStage::Decision && score.total_score >= config.decision_stage_score)
}

/// Actions unlocked by a score, strongest first.
pub fn eligible_actions(score: &LeadScore, config: &QualificationConfig) -> Vec<ActionTrigger> {
    let mut actions = Vec::new();
    if score.total_score >= config.notify_team_score {
        actions.push(ActionTrigger::NotifyTeam);
    }
    if score.total_score >= config.suggest_booking_score {
        actions.push(ActionTrigger::SuggestBooking);
    }
    if score.total_score >= config.share_contact_score {
        actions.push(ActionTrigger::ShareContact);
    }
    actions
}
