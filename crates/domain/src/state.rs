use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lead::{ActionTrigger, LeadScore, QualificationData, QualificationField};
use crate::message::{Message, Role};

/// Sentinel `document_quality` meaning "greeting detected, grading skipped".
pub const GREETING_QUALITY: f32 = -1.0;

/// A retrieved knowledge passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// Contact profile captured by the intake form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadInfo {
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub transcript_opt_in: bool,
}

/// Outcome of the booking responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    /// True when the scheduling API was unavailable and only contact
    /// details were offered.
    pub fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageCategory {
    Location,
}

impl ImageCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageCategory::Location => "location",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The aggregate threaded through every node of a turn and persisted per
/// thread between turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub thread_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Current retrieval query. Rewritten by the reformulator.
    #[serde(default)]
    pub question: String,
    /// The user's own words for this turn.
    #[serde(default)]
    pub original_question: String,
    #[serde(default)]
    pub documents: Option<Vec<Document>>,
    #[serde(default)]
    pub document_quality: Option<f32>,
    #[serde(default)]
    pub is_greeting: Option<bool>,
    #[serde(default)]
    pub is_booking_intent: Option<bool>,
    #[serde(default)]
    pub show_images: Option<bool>,
    #[serde(default)]
    pub lead_info: Option<LeadInfo>,
    #[serde(default)]
    pub qualification_data: QualificationData,
    #[serde(default)]
    pub questions_asked: Vec<QualificationField>,
    #[serde(default)]
    pub lead_score: Option<LeadScore>,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
    #[serde(default)]
    pub image_type: Option<ImageCategory>,
    #[serde(default)]
    pub image_context: Option<String>,
    #[serde(default)]
    pub booking_info: Option<BookingInfo>,
    #[serde(default)]
    pub retrieval_attempts: u32,
    #[serde(default)]
    pub last_retrieval: Option<DateTime<Utc>>,
    /// Terminal responder output waiting for the qualification merge.
    #[serde(default)]
    pub pending_reply: Option<String>,
    #[serde(default)]
    pub turn_count: u32,
    #[serde(default)]
    pub last_question_turn: Option<u32>,
    #[serde(default)]
    pub actions_fired: Vec<ActionTrigger>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            question: String::new(),
            original_question: String::new(),
            documents: None,
            document_quality: None,
            is_greeting: None,
            is_booking_intent: None,
            show_images: None,
            lead_info: None,
            qualification_data: QualificationData::default(),
            questions_asked: Vec::new(),
            lead_score: None,
            image_urls: None,
            image_type: None,
            image_context: None,
            booking_info: None,
            retrieval_attempts: 0,
            last_retrieval: None,
            pending_reply: None,
            turn_count: 0,
            last_question_turn: None,
            actions_fired: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Start a new turn: append the user's message and clear every
    /// turn-scoped field so stale routing signals cannot leak forward.
    pub fn begin_turn(&mut self, text: &str) {
        self.messages.push(Message::user(text));
        self.question = text.to_string();
        self.original_question = text.to_string();
        self.documents = None;
        self.document_quality = None;
        self.is_greeting = None;
        self.is_booking_intent = None;
        self.show_images = None;
        self.image_urls = None;
        self.image_type = None;
        self.image_context = None;
        self.booking_info = None;
        self.retrieval_attempts = 0;
        self.pending_reply = None;
        self.turn_count += 1;
        self.updated_at = Utc::now();
    }

    pub fn first_name(&self) -> Option<&str> {
        self.lead_info
            .as_ref()
            .map(|l| l.first_name.trim())
            .filter(|n| !n.is_empty())
    }

    pub fn is_first_turn(&self) -> bool {
        self.turn_count <= 1
    }

    pub fn user_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::User)
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Record a qualification question. Duplicates are ignored.
    pub fn mark_asked(&mut self, field: QualificationField) {
        if !self.questions_asked.contains(&field) {
            self.questions_asked.push(field);
        }
        self.last_question_turn = Some(self.turn_count);
    }

    pub fn has_documents(&self) -> bool {
        self.documents.as_ref().is_some_and(|d| !d.is_empty())
    }
}

pub fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_turn_resets_turn_scoped_fields() {
        let mut state = SessionState::new("t1");
        state.begin_turn("hello");
        state.document_quality = Some(GREETING_QUALITY);
        state.is_greeting = Some(true);
        state.retrieval_attempts = 2;
        state.pending_reply = Some("hi".into());
        state.questions_asked.push(QualificationField::Timeline);

        state.begin_turn("what is the price?");
        assert_eq!(state.turn_count, 2);
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.question, "what is the price?");
        assert!(state.document_quality.is_none());
        assert!(state.is_greeting.is_none());
        assert_eq!(state.retrieval_attempts, 0);
        assert!(state.pending_reply.is_none());
        // Thread-scoped fields survive.
        assert_eq!(state.questions_asked, vec![QualificationField::Timeline]);
    }

    #[test]
    fn mark_asked_is_deduplicated() {
        let mut state = SessionState::new("t1");
        state.begin_turn("hi");
        state.mark_asked(QualificationField::BudgetRange);
        state.mark_asked(QualificationField::BudgetRange);
        assert_eq!(state.questions_asked.len(), 1);
        assert_eq!(state.last_question_turn, Some(1));
    }

    #[test]
    fn first_name_ignores_blank() {
        let mut state = SessionState::new("t1");
        assert!(state.first_name().is_none());
        state.lead_info = Some(LeadInfo {
            first_name: "  ".into(),
            email: None,
            phone: None,
            transcript_opt_in: false,
        });
        assert!(state.first_name().is_none());
        state.lead_info.as_mut().unwrap().first_name = "Ana".into();
        assert_eq!(state.first_name(), Some("Ana"));
    }

    #[test]
    fn deserializes_minimal_document() {
        let json = r#"{"thread_id":"abc","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}"#;
        let state: SessionState = serde_json::from_str(json).unwrap();
        assert_eq!(state.thread_id, "abc");
        assert!(state.messages.is_empty());
        assert!(state.qualification_data.is_empty());
    }
}
