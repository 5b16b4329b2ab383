//! Consultation booking via the scheduling API, with a contact-only
//! fallback whenever the API cannot produce a link.

use sv_domain::config::BrandConfig;
use sv_domain::state::{BookingInfo, SessionState};
use sv_domain::trace::TraceEvent;
use sv_scheduling::{select_consultation_event, EventType, SchedulingApi};

use crate::runtime::graph::{Graph, StateUpdate, TurnContext};

/// Health check, then the best consultation event type. `Err` carries the
/// reason the fallback is used.
async fn find_event(api: &dyn SchedulingApi) -> Result<EventType, String> {
    let health = api.health_check().await.map_err(|e| e.to_string())?;
    if !health.healthy {
        return Err("scheduling API reported unhealthy".into());
    }
    let events = api.list_event_types().await.map_err(|e| e.to_string())?;
    select_consultation_event(&events)
        .cloned()
        .ok_or_else(|| "no active event type".into())
}

pub fn compose_booking(brand: &BrandConfig, first_name: Option<&str>, event: &EventType) -> String {
    let opener = match first_name {
        Some(name) => format!("Wonderful, {name}!"),
        None => "Wonderful!".to_string(),
    };
    let length = event
        .duration
        .map(|m| format!(" ({m} minutes)"))
        .unwrap_or_default();
    format!(
        "{opener} You can book a {}{length} with our team here: {}\n\n{}\n\n{}",
        event.name,
        event.scheduling_url,
        brand.directions,
        brand.contact_line()
    )
}

pub fn compose_fallback(brand: &BrandConfig, first_name: Option<&str>) -> String {
    let opener = match first_name {
        Some(name) => format!("I'd love to set up a visit for you, {name}!"),
        None => "I'd love to set up a visit for you!".to_string(),
    };
    format!(
        "{opener} Our online calendar isn't available right now, so please message our team on \
         WhatsApp at {} ({}) and we'll arrange a time that suits you.",
        brand.contact_number, brand.whatsapp_url
    )
}

/// Never surfaces an error to the user.
pub async fn run(graph: &Graph, state: &SessionState, cx: &TurnContext) -> StateUpdate {
    let brand = &graph.config.brand;
    let name = state.first_name();

    let (reply, info) = match find_event(graph.scheduling.as_ref()).await {
        Ok(event) => (
            compose_booking(brand, name, &event),
            BookingInfo {
                event_name: Some(event.name.clone()),
                scheduling_url: Some(event.scheduling_url.clone()),
                duration_minutes: event.duration,
                fallback: false,
            },
        ),
        Err(reason) => {
            tracing::warn!(outcome = "degraded", reason = %reason, "booking falling back to contact details");
            TraceEvent::Degraded {
                component: "booking".into(),
                reason,
            }
            .emit();
            (
                compose_fallback(brand, name),
                BookingInfo {
                    event_name: None,
                    scheduling_url: None,
                    duration_minutes: None,
                    fallback: true,
                },
            )
        }
    };

    cx.emit_words(&reply).await;

    StateUpdate {
        pending_reply: Some(reply),
        booking_info: Some(info),
        ..StateUpdate::default()
    }
}
