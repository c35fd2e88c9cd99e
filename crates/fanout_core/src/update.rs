use crate::{Effect, Msg, ReportState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: ReportState, msg: Msg) -> (ReportState, Vec<Effect>) {
    let Msg::ResultReceived {
        url,
        payload,
        failure,
    } = msg;

    let succeeded = failure.is_none();
    state.record(succeeded);

    let mut effects = Vec::with_capacity(3);
    if let Some(cause) = failure {
        effects.push(Effect::ReportFailure { url, cause });
    }
    if state.filter().admits(succeeded) {
        effects.push(Effect::Emit(payload));
    }
    if state.show_progress() {
        effects.push(Effect::Progress(state.summary().progress_line()));
    }

    (state, effects)
}
