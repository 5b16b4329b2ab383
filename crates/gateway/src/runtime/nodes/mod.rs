//! Graph nodes. Each takes the running state by reference and returns a
//! [`StateUpdate`](super::graph::StateUpdate).

pub mod booking;
pub mod generate;
pub mod grade;
pub mod greeting;
pub mod image;
pub mod qualify;
pub mod reformulate;
pub mod retrieve;

use sv_domain::config::BrandConfig;
use sv_domain::state::Document;

/// Numbered passages, each cut to `max_chars`.
pub(crate) fn snippets(documents: &[Document], max_chars: usize) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let text: String = d.text.chars().take(max_chars).collect();
            format!("[{}] {}", i + 1, text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The consultation suggestion appended to answers and booking-ready leads.
pub(crate) fn booking_suggestion(brand: &BrandConfig) -> String {
    format!(
        "Would you like to book a private consultation or a viewing at {}? Just let me know and I'll share our calendar.",
        brand.name
    )
}

pub(crate) fn mentions_booking(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("consultation") || lower.contains("book a") || lower.contains("viewing")
}
