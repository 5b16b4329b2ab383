//! HTML bodies for the two outbound emails.

use sv_domain::config::{BrandConfig, NotifyConfig};
use sv_domain::lead::{LeadScore, QualificationData, QualificationField};
use sv_domain::message::{Message, Role};
use sv_domain::state::LeadInfo;

use crate::EmailMessage;

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn field_label(field: QualificationField) -> &'static str {
    match field {
        QualificationField::PurchaseIntent => "Purchase intent",
        QualificationField::Timeline => "Timeline",
        QualificationField::BudgetRange => "Budget range",
        QualificationField::PaymentPreference => "Payment preference",
        QualificationField::DecisionAuthority => "Decision authority",
        QualificationField::AreaFamiliarity => "Area familiarity",
        QualificationField::PriorPurchases => "Prior purchases",
        QualificationField::Urgency => "Urgency",
    }
}

/// Alert for the sales team when a lead crosses the notify threshold.
pub fn hot_lead_alert(
    notify: &NotifyConfig,
    brand: &BrandConfig,
    thread_id: &str,
    lead: Option<&LeadInfo>,
    score: &LeadScore,
    data: &QualificationData,
) -> EmailMessage {
    let name = lead.map(|l| l.first_name.as_str()).unwrap_or("Anonymous visitor");

    let mut rows = String::new();
    for field in QualificationField::ALL {
        if let Some(value) = data.display_value(*field) {
            rows.push_str(&format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                field_label(*field),
                escape(&value.replace('_', " "))
            ));
        }
    }

    let contact = lead
        .map(|l| {
            let mut parts = Vec::new();
            if let Some(email) = &l.email {
                parts.push(format!("Email: {}", escape(email)));
            }
            if let Some(phone) = &l.phone {
                parts.push(format!("Phone: {}", escape(phone)));
            }
            parts.join("<br>")
        })
        .unwrap_or_default();

    let html = format!(
        "<h2>{brand} lead alert</h2>\
         <p><strong>{name}</strong> scored <strong>{score}/100</strong> ({tier}).</p>\
         <p>{contact}</p>\
         <table>{rows}</table>\
         <p>Thread: <code>{thread}</code></p>",
        brand = escape(&brand.name),
        name = escape(name),
        score = score.total_score,
        tier = score.tier.as_str(),
        thread = escape(thread_id),
    );

    EmailMessage {
        to: notify.team_recipients.clone(),
        from: notify.from.clone(),
        subject: format!(
            "[{}] {} lead: {} ({}/100)",
            brand.name,
            score.tier.as_str(),
            name,
            score.total_score
        ),
        html,
    }
}

/// Conversation transcript for a lead who opted in. `None` when the lead
/// has no email address or did not opt in.
pub fn transcript_email(
    notify: &NotifyConfig,
    brand: &BrandConfig,
    lead: &LeadInfo,
    messages: &[Message],
) -> Option<EmailMessage> {
    if !lead.transcript_opt_in {
        return None;
    }
    let to = lead.email.clone()?;

    let mut body = String::new();
    for m in messages.iter().filter(|m| m.role != Role::System) {
        let speaker = match m.role {
            Role::User => escape(&lead.first_name),
            _ => escape(&brand.name),
        };
        body.push_str(&format!(
            "<p><strong>{speaker}:</strong> {}</p>",
            escape(&m.content).replace('\n', "<br>")
        ));
    }

    Some(EmailMessage {
        to: vec![to],
        from: notify.from.clone(),
        subject: format!("Your conversation with {}", brand.name),
        html: format!(
            "<p>Hi {name},</p><p>Here's a copy of our chat.</p>{body}\
             <p>Questions? Message us on WhatsApp at {number}.</p>",
            name = escape(&lead.first_name),
            number = escape(&brand.contact_number),
        ),
    })
}
