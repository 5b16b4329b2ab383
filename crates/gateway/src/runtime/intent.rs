//! Keyword intent detection for the routing flags and the generator's
//! calls to action. All matching is on lowercased text.

use sv_domain::state::ImageCategory;
use sv_domain::text::mentions;

/// Phrases that ask to schedule a consultation or viewing. Bare nouns like
/// "booking" are left out: "is the booking fee refundable?" is a question
/// for the knowledge base.
const BOOKING_PHRASES: &[&str] = &[
    "book a call",
    "book a consultation",
    "book a meeting",
    "book a site visit",
    "book a tour",
    "book a viewing",
    "book a visit",
    "book an appointment",
    "schedule a call",
    "schedule a consultation",
    "schedule a meeting",
    "schedule a tour",
    "schedule a viewing",
    "schedule a visit",
    "set up a call",
    "set up a meeting",
    "make an appointment",
    "arrange a viewing",
    "arrange a visit",
    "reserve a slot",
    "calendly",
];

/// Image categories and the requests that ask for them. Only requests for
/// the villas' own location count; "where is the pool?" is not one.
const IMAGE_REQUESTS: &[(ImageCategory, &[&str])] = &[(
    ImageCategory::Location,
    &[
        "where are the villas located",
        "where are the villas",
        "where is the villa located",
        "where is the property located",
        "where is skypearls",
        "where are you located",
        "where is it located",
        "show me the location",
        "show me where",
        "show me the area",
        "photos of the area",
        "pictures of the area",
        "photos of the location",
        "pictures of the location",
        "map of the area",
        "map of the location",
        "location map",
        "directions to the villas",
        "directions to the property",
        "how to get there",
        "how do i get there",
    ],
)];

/// Questions that should end with the direct contact line.
const CONTACT_TRIGGERS: &[&str] = &[
    "price",
    "cost",
    "how much",
    "contact",
    "call",
    "phone",
    "whatsapp",
    "agent",
    "talk to",
    "speak",
    "number",
    "email",
    "reach",
];

/// Questions that should end with a consultation suggestion.
const BOOKING_TRIGGERS: &[&str] = &[
    "visit",
    "viewing",
    "tour",
    "meet",
    "appointment",
    "schedule",
    "buy",
    "purchase",
    "reserve",
];

pub fn is_booking_request(text: &str) -> bool {
    mentions(text, BOOKING_PHRASES)
}

pub fn image_request(text: &str) -> Option<ImageCategory> {
    IMAGE_REQUESTS
        .iter()
        .find(|(_, phrases)| mentions(text, phrases))
        .map(|(category, _)| *category)
}

pub fn wants_contact(text: &str) -> bool {
    mentions(text, CONTACT_TRIGGERS)
}

pub fn wants_booking_suggestion(text: &str) -> bool {
    mentions(text, BOOKING_TRIGGERS)
}
