//! The conditional edge after grading.

use sv_domain::state::SessionState;

use super::graph::Route;

/// Choose the next step from the graded state.
///
/// Priority: greeting, booking intent, image request, then relevance.
/// Quality above `threshold` answers directly; anything else reformulates
/// and retrieves again until `max_attempts` retrievals have run, after
/// which the best available passages are answered from.
pub fn route(state: &SessionState, threshold: f32, max_attempts: u32) -> Route {
    if state.is_greeting == Some(true) {
        return Route::Greeting;
    }
    if state.is_booking_intent == Some(true) {
        return Route::Booking;
    }
    if state.show_images == Some(true) {
        return Route::Image;
    }

    let quality = state.document_quality.unwrap_or(0.0);
    if quality > threshold {
        return Route::Generate;
    }
    if state.retrieval_attempts >= max_attempts {
        tracing::debug!(
            attempts = state.retrieval_attempts,
            quality,
            "retrieval ceiling reached, answering with best effort"
        );
        return Route::Generate;
    }
    Route::Reformulate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graded(greeting: bool, booking: bool, images: bool, quality: f32) -> SessionState {
        let mut state = SessionState::new("t");
        state.begin_turn("question");
        state.is_greeting = Some(greeting);
        state.is_booking_intent = Some(booking);
        state.show_images = Some(images);
        state.document_quality = Some(quality);
        state.retrieval_attempts = 1;
        state
    }

    #[test]
    fn high_quality_generates() {
        assert_eq!(route(&graded(false, false, false, 0.9), 0.7, 3), Route::Generate);
    }

    #[test]
    fn low_quality_reformulates() {
        assert_eq!(route(&graded(false, false, false, 0.4), 0.7, 3), Route::Reformulate);
        // The threshold itself is not good enough.
        assert_eq!(route(&graded(false, false, false, 0.7), 0.7, 3), Route::Reformulate);
    }

    #[test]
    fn priority_order() {
        assert_eq!(route(&graded(true, true, true, -1.0), 0.7, 3), Route::Greeting);
        assert_eq!(route(&graded(false, true, true, 0.1), 0.7, 3), Route::Booking);
        assert_eq!(route(&graded(false, false, true, 0.1), 0.7, 3), Route::Image);
    }

    #[test]
    fn route_ignores_message_content() {
        let a = graded(false, false, false, 0.4);
        let mut b = graded(false, false, false, 0.4);
        b.begin_turn("hello");
        b.is_greeting = Some(false);
        b.is_booking_intent = Some(false);
        b.show_images = Some(false);
        b.document_quality = Some(0.4);
        b.retrieval_attempts = 1;
        assert_eq!(route(&a, 0.7, 3), route(&b, 0.7, 3));
    }

    #[test]
    fn ceiling_forces_generate() {
        let mut state = graded(false, false, false, 0.2);
        state.retrieval_attempts = 3;
        assert_eq!(route(&state, 0.7, 3), Route::Generate);
        state.retrieval_attempts = 2;
        assert_eq!(route(&state, 0.7, 3), Route::Reformulate);
    }
}
