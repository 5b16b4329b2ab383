//! Side effects of action triggers that live outside the graph.

use std::sync::Arc;

use sv_domain::config::Config;
use sv_domain::lead::ActionTrigger;
use sv_domain::state::SessionState;
use sv_notify::{dispatch, templates, Notifier};
use tokio::task::JoinHandle;

/// Run each trigger at most once per thread and record it in
/// `actions_fired`. Returns the spawned notification tasks.
pub fn execute(
    config: &Config,
    notifier: &Arc<dyn Notifier>,
    state: &mut SessionState,
    actions: &[ActionTrigger],
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    for &action in actions {
        if state.actions_fired.contains(&action) {
            continue;
        }
        match action {
            ActionTrigger::NotifyTeam => {
                let Some(score) = state.lead_score.as_ref() else {
                    continue;
                };
                let email = templates::hot_lead_alert(
                    &config.notify,
                    &config.brand,
                    &state.thread_id,
                    state.lead_info.as_ref(),
                    score,
                    &state.qualification_data,
                );
                tracing::info!(
                    thread_id = %state.thread_id,
                    score = score.total_score,
                    "notifying sales team about qualified lead"
                );
                tasks.push(dispatch(notifier.clone(), email));
            }
            // Rendered into the reply by the qualify node.
            ActionTrigger::SuggestBooking | ActionTrigger::ShareContact => {}
        }
        state.actions_fired.push(action);
    }

    tasks
}
