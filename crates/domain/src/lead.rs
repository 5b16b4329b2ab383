//! Lead profile and qualification data model.
//!
//! Every qualification dimension is a closed enum so scoring, templates and
//! trigger tables can be written as exhaustive `match` expressions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declares a closed set of wire values: the enum, its serde names, and
/// `as_str` / `from_wire` helpers sharing one table.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            /// Exact (case-insensitive) match on the wire value.
            pub fn from_wire(s: &str) -> Option<Self> {
                let s = s.trim();
                Self::ALL.iter().copied().find(|v| v.as_str().eq_ignore_ascii_case(s))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// A qualification dimension the engine tries to learn about a lead.
    QualificationField {
        PurchaseIntent => "purchase_intent",
        Timeline => "timeline",
        BudgetRange => "budget_range",
        PaymentPreference => "payment_preference",
        DecisionAuthority => "decision_authority",
        AreaFamiliarity => "area_familiarity",
        PriorPurchases => "prior_purchases",
        Urgency => "urgency",
    }
);

wire_enum!(PurchaseIntent {
    Investment => "investment",
    Residence => "residence",
    VacationHome => "vacation_home",
    Exploring => "exploring",
});

wire_enum!(Timeline {
    Immediate => "immediate",
    Within3Months => "within_3_months",
    Within6Months => "within_6_months",
    WithinYear => "within_year",
    Exploring => "exploring",
});

wire_enum!(
    /// Budget bands in Philippine pesos.
    BudgetRange {
        Below15m => "below_15m",
        From15mTo25m => "15m_25m",
        From25mTo35m => "25m_35m",
        Above35m => "above_35m",
    }
);

wire_enum!(PaymentPreference {
    Cash => "cash",
    Financing => "financing",
    Installment => "installment",
    Undecided => "undecided",
});

wire_enum!(DecisionAuthority {
    SoleDecision => "sole_decision",
    JointDecision => "joint_decision",
    Influencer => "influencer",
    Researcher => "researcher",
});

wire_enum!(AreaFamiliarity {
    VeryFamiliar => "very_familiar",
    SomewhatFamiliar => "somewhat_familiar",
    NotFamiliar => "not_familiar",
});

wire_enum!(Urgency {
    High => "high",
    Medium => "medium",
    Low => "low",
});

wire_enum!(
    /// Follow-up actions unlocked by a lead's score.
    ActionTrigger {
        NotifyTeam => "notify_team",
        SuggestBooking => "suggest_booking",
        ShareContact => "share_contact",
    }
);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Qualification data
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What is known about a lead so far. Fields are filled incrementally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_intent: Option<PurchaseIntent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_range: Option<BudgetRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_preference: Option<PaymentPreference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_authority: Option<DecisionAuthority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_familiarity: Option<AreaFamiliarity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_purchases: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
}

impl QualificationData {
    /// Copy every field present in `other` over `self`. Absent fields in
    /// `other` never clear a known value.
    pub fn merge(&mut self, other: &QualificationData) {
        fn fill<T: Copy>(dst: &mut Option<T>, src: Option<T>) {
            if src.is_some() {
                *dst = src;
            }
        }
        fill(&mut self.purchase_intent, other.purchase_intent);
        fill(&mut self.timeline, other.timeline);
        fill(&mut self.budget_range, other.budget_range);
        fill(&mut self.payment_preference, other.payment_preference);
        fill(&mut self.decision_authority, other.decision_authority);
        fill(&mut self.area_familiarity, other.area_familiarity);
        fill(&mut self.prior_purchases, other.prior_purchases);
        fill(&mut self.urgency, other.urgency);
    }

    pub fn has(&self, field: QualificationField) -> bool {
        match field {
            QualificationField::PurchaseIntent => self.purchase_intent.is_some(),
            QualificationField::Timeline => self.timeline.is_some(),
            QualificationField::BudgetRange => self.budget_range.is_some(),
            QualificationField::PaymentPreference => self.payment_preference.is_some(),
            QualificationField::DecisionAuthority => self.decision_authority.is_some(),
            QualificationField::AreaFamiliarity => self.area_familiarity.is_some(),
            QualificationField::PriorPurchases => self.prior_purchases.is_some(),
            QualificationField::Urgency => self.urgency.is_some(),
        }
    }

    pub fn missing_fields(&self) -> Vec<QualificationField> {
        QualificationField::ALL
            .iter()
            .copied()
            .filter(|f| !self.has(*f))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        QualificationField::ALL.iter().all(|f| !self.has(*f))
    }

    /// Human-readable value for a filled field, used by email templates.
    pub fn display_value(&self, field: QualificationField) -> Option<String> {
        match field {
            QualificationField::PurchaseIntent => self.purchase_intent.map(|v| v.to_string()),
            QualificationField::Timeline => self.timeline.map(|v| v.to_string()),
            QualificationField::BudgetRange => self.budget_range.map(|v| v.to_string()),
            QualificationField::PaymentPreference => {
                self.payment_preference.map(|v| v.to_string())
            }
            QualificationField::DecisionAuthority => {
                self.decision_authority.map(|v| v.to_string())
            }
            QualificationField::AreaFamiliarity => self.area_familiarity.map(|v| v.to_string()),
            QualificationField::PriorPurchases => {
                self.prior_purchases.map(|v| if v { "yes" } else { "no" }.to_string())
            }
            QualificationField::Urgency => self.urgency.map(|v| v.to_string()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lead score
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationTier {
    Unqualified,
    Low,
    Medium,
    High,
    Hot,
}

impl QualificationTier {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=29 => Self::Unqualified,
            30..=49 => Self::Low,
            50..=69 => Self::Medium,
            70..=89 => Self::High,
            _ => Self::Hot,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unqualified => "unqualified",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Hot => "hot",
        }
    }
}

/// Per-dimension contributions to the total score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub intent: u8,
    pub timeline: u8,
    pub budget: u8,
    pub authority: u8,
    pub engagement_bonus: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScore {
    pub total_score: u8,
    pub breakdown: ScoreBreakdown,
    pub tier: QualificationTier,
    pub calculated_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_never_clears_known_values() {
        let mut data = QualificationData {
            purchase_intent: Some(PurchaseIntent::Investment),
            ..Default::default()
        };
        data.merge(&QualificationData {
            timeline: Some(Timeline::Immediate),
            ..Default::default()
        });
        assert_eq!(data.purchase_intent, Some(PurchaseIntent::Investment));
        assert_eq!(data.timeline, Some(Timeline::Immediate));
    }

    #[test]
    fn merge_overwrites_with_newer_value() {
        let mut data = QualificationData {
            budget_range: Some(BudgetRange::Below15m),
            ..Default::default()
        };
        data.merge(&QualificationData {
            budget_range: Some(BudgetRange::Above35m),
            ..Default::default()
        });
        assert_eq!(data.budget_range, Some(BudgetRange::Above35m));
    }

    #[test]
    fn missing_fields_tracks_fill_state() {
        let mut data = QualificationData::default();
        assert!(data.is_empty());
        assert_eq!(data.missing_fields().len(), QualificationField::ALL.len());

        data.prior_purchases = Some(false);
        assert!(data.has(QualificationField::PriorPurchases));
        assert!(!data.missing_fields().contains(&QualificationField::PriorPurchases));
    }

    #[test]
    fn wire_names_roundtrip_through_serde() {
        let json = serde_json::to_string(&BudgetRange::From25mTo35m).unwrap();
        assert_eq!(json, "\"25m_35m\"");
        assert_eq!(Timeline::from_wire("WITHIN_3_MONTHS"), Some(Timeline::Within3Months));
        assert_eq!(Timeline::from_wire("soon"), None);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(QualificationTier::from_score(0), QualificationTier::Unqualified);
        assert_eq!(QualificationTier::from_score(29), QualificationTier::Unqualified);
        assert_eq!(QualificationTier::from_score(30), QualificationTier::Low);
        assert_eq!(QualificationTier::from_score(50), QualificationTier::Medium);
        assert_eq!(QualificationTier::from_score(70), QualificationTier::High);
        assert_eq!(QualificationTier::from_score(89), QualificationTier::High);
        assert_eq!(QualificationTier::from_score(90), QualificationTier::Hot);
        assert_eq!(QualificationTier::from_score(100), QualificationTier::Hot);
    }
}
