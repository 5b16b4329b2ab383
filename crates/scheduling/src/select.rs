use crate::types::EventType;

/// Words that mark an event type as a sales consultation.
const CONSULTATION_KEYWORDS: &[&str] = &[
    "consultation",
    "villa",
    "property",
    "meeting",
    "call",
    "discovery",
    "intro",
    "chat",
    "discussion",
];

/// The first active event type whose name or description mentions a
/// consultation keyword, else the first active event type.
pub fn select_consultation_event(events: &[EventType]) -> Option<&EventType> {
    let mut active = events.iter().filter(|e| e.active);
    let first_active = active.clone().next();

    active
        .find(|e| {
            let haystack = format!(
                "{} {}",
                e.name.to_lowercase(),
                e.description.as_deref().unwrap_or("").to_lowercase()
            );
            CONSULTATION_KEYWORDS.iter().any(|k| haystack.contains(k))
        })
        .or(first_active)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, active: bool, description: Option<&str>) -> EventType {
        EventType {
            name: name.into(),
            active,
            duration: Some(30),
            description: description.map(String::from),
            scheduling_url: format!("https://calendly.com/skypearls/{}", name.to_lowercase()),
        }
    }

    #[test]
    fn keyword_match_beats_order() {
        let events = vec![
            event("Team Sync", true, None),
            event("Villa Consultation", true, None),
        ];
        assert_eq!(select_consultation_event(&events).unwrap().name, "Villa Consultation");
    }

    #[test]
    fn description_is_searched() {
        let events = vec![
            event("Thirty Minutes", true, None),
            event("Sunset Slot", true, Some("A quick intro with our sales team")),
        ];
        assert_eq!(select_consultation_event(&events).unwrap().name, "Sunset Slot");
    }

    #[test]
    fn inactive_matches_are_skipped() {
        let events = vec![
            event("Villa Consultation", false, None),
            event("Walkthrough", true, None),
        ];
        assert_eq!(select_consultation_event(&events).unwrap().name, "Walkthrough");
    }

    #[test]
    fn nothing_active() {
        let events = vec![event("Villa Consultation", false, None)];
        assert!(select_consultation_event(&events).is_none());
        assert!(select_consultation_event(&[]).is_none());
    }
}
