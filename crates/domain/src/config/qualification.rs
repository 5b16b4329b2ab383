use serde::{Deserialize, Serialize};

/// Lead qualification thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualificationConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Weighted fill ratio at which qualification is complete.
    #[serde(default = "d_completion")]
    pub completion_threshold: f32,
    /// Score that completes qualification once the lead is in the
    /// decision stage.
    #[serde(default = "d_decision_score")]
    pub decision_stage_score: u8,
    #[serde(default = "d_notify_team")]
    pub notify_team_score: u8,
    #[serde(default = "d_suggest_booking")]
    pub suggest_booking_score: u8,
    #[serde(default = "d_share_contact")]
    pub share_contact_score: u8,
    /// Overall risk at or above which no question is asked.
    #[serde(default = "d_risk_veto")]
    pub risk_veto: f32,
    /// Opportunities scoring below this are dropped.
    #[serde(default = "d_min_opportunity")]
    pub min_opportunity_score: f32,
}

impl Default for QualificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            completion_threshold: d_completion(),
            decision_stage_score: d_decision_score(),
            notify_team_score: d_notify_team(),
            suggest_booking_score: d_suggest_booking(),
            share_contact_score: d_share_contact(),
            risk_veto: d_risk_veto(),
            min_opportunity_score: d_min_opportunity(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_completion() -> f32 {
    0.8
}
fn d_decision_score() -> u8 {
    70
}
fn d_notify_team() -> u8 {
    70
}
fn d_suggest_booking() -> u8 {
    50
}
fn d_share_contact() -> u8 {
    30
}
fn d_risk_veto() -> f32 {
    0.6
}
fn d_min_opportunity() -> f32 {
    0.4
}
