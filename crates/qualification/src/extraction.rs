//! Extraction of qualification answers from the user's latest message.

use serde_json::Value;
use sv_domain::lead::{
    AreaFamiliarity, BudgetRange, DecisionAuthority, PaymentPreference, PurchaseIntent,
    QualificationData, QualificationField, Timeline, Urgency,
};
use sv_domain::message::Message;
use sv_domain::trace::TraceEvent;
use sv_providers::NodeBinding;

use crate::context::json_object;

fn allowed_values(field: QualificationField) -> Vec<&'static str> {
    fn names<T: Copy>(all: &[T], f: fn(T) -> &'static str) -> Vec<&'static str> {
        all.iter().map(|v| f(*v)).collect()
    }
    match field {
        QualificationField::PurchaseIntent => names(PurchaseIntent::ALL, PurchaseIntent::as_str),
        QualificationField::Timeline => names(Timeline::ALL, Timeline::as_str),
        QualificationField::BudgetRange => names(BudgetRange::ALL, BudgetRange::as_str),
        QualificationField::PaymentPreference => {
            names(PaymentPreference::ALL, PaymentPreference::as_str)
        }
        QualificationField::DecisionAuthority => {
            names(DecisionAuthority::ALL, DecisionAuthority::as_str)
        }
        QualificationField::AreaFamiliarity => names(AreaFamiliarity::ALL, AreaFamiliarity::as_str),
        QualificationField::PriorPurchases => vec!["true", "false"],
        QualificationField::Urgency => names(Urgency::ALL, Urgency::as_str),
    }
}

/// System prompt listing every field and its permitted values.
pub fn extraction_prompt() -> String {
    let mut prompt = String::from(
        "Extract facts a prospective villa buyer states about themselves. \
Reply with only a JSON object. Include a field only when the message clearly states it, \
using exactly one of the allowed values. Budgets are in Philippine pesos (m = million).\n",
    );
    for field in QualificationField::ALL {
        prompt.push_str(&format!(
            "- {}: {}\n",
            field.as_str(),
            allowed_values(*field).join(" | ")
        ));
    }
    prompt
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse an extraction reply. Unknown fields and values outside the
/// allowed sets are dropped; a reply that is not a JSON object is `None`.
pub fn parse_extraction(raw: &str) -> Option<QualificationData> {
    let value: Value = serde_json::from_str(json_object(raw)?).ok()?;
    let obj = value.as_object()?;
    let text = |k: &str| obj.get(k).and_then(Value::as_str);

    Some(QualificationData {
        purchase_intent: text("purchase_intent").and_then(PurchaseIntent::from_wire),
        timeline: text("timeline").and_then(Timeline::from_wire),
        budget_range: text("budget_range").and_then(BudgetRange::from_wire),
        payment_preference: text("payment_preference").and_then(PaymentPreference::from_wire),
        decision_authority: text("decision_authority").and_then(DecisionAuthority::from_wire),
        area_familiarity: text("area_familiarity").and_then(AreaFamiliarity::from_wire),
        prior_purchases: obj.get("prior_purchases").and_then(as_bool),
        urgency: text("urgency").and_then(Urgency::from_wire),
    })
}

pub struct Extractor {
    extractor: Option<NodeBinding>,
}

impl Extractor {
    pub fn new(extractor: Option<NodeBinding>) -> Self {
        Self { extractor }
    }

    /// Values stated in `message`. Empty on any failure.
    pub async fn extract(&self, message: &str) -> QualificationData {
        let Some(binding) = &self.extractor else {
            return QualificationData::default();
        };
        if message.trim().is_empty() {
            return QualificationData::default();
        }

        let prompt = vec![Message::system(extraction_prompt()), Message::user(message)];
        let reason = match binding.complete(prompt, true).await {
            Ok(raw) => match parse_extraction(&raw) {
                Some(data) => return data,
                None => "unparseable extraction reply".to_string(),
            },
            Err(e) => e.to_string(),
        };

        tracing::warn!(outcome = "degraded", reason = %reason, "qualification extraction skipped");
        TraceEvent::Degraded {
            component: "extraction".into(),
            reason,
        }
        .emit();
        QualificationData::default()
    }
}
