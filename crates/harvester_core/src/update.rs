use crate::{Effect, HarvestState, Msg, Phase, StepOutcome, StopReason};

/// Pure update function: applies a message to state and returns any effects.
///
/// Effects are returned in execution order. A `Checkpoint` always precedes the
/// `Advance` or `Terminate` that follows a processed step, so the cursor is
/// saved before the loop moves on or stops.
pub fn update(mut state: HarvestState, msg: Msg) -> (HarvestState, Vec<Effect>) {
    let effects = match (state.phase(), msg) {
        (Phase::Terminated(_), _) => Vec::new(),
        (_, Msg::SourceFault) => terminate(&mut state, StopReason::SourceFault),
        (Phase::Init, Msg::Started { cursor }) => {
            state.set_cursor(cursor);
            if cursor == 0 {
                state.set_phase(Phase::ExtractInitial);
                vec![Effect::ExtractInitial]
            } else {
                state.set_phase(Phase::Baseline);
                vec![Effect::MeasureBaseline]
            }
        }
        (Phase::ExtractInitial, Msg::InitialExtracted { visible, .. }) => {
            state.source_recovered();
            state.set_last_visible(visible);
            state.count_step();
            state.set_cursor(1);
            let mut effects = vec![Effect::Checkpoint { cursor: 1 }];
            effects.extend(advance_after(&mut state, 1));
            effects
        }
        (Phase::Baseline, Msg::BaselineMeasured { visible, .. }) => {
            state.source_recovered();
            state.set_last_visible(visible);
            let cursor = state.cursor();
            advance_after(&mut state, cursor)
        }
        (Phase::Advancing { step }, Msg::StepCompleted(outcome)) if outcome.step == step => {
            state.source_recovered();
            let progressed = made_progress(&state, &outcome);
            state.record_progress(progressed);
            state.set_last_visible(outcome.visible);
            finish_step(&mut state, step)
        }
        (Phase::Baseline, Msg::StepUnavailable { .. }) => {
            if state.source_unavailable() >= state.limits().unavailable_limit {
                return with_effects(state, StopReason::SourceUnavailable);
            }
            let cursor = state.cursor();
            advance_after(&mut state, cursor)
        }
        (Phase::ExtractInitial, Msg::StepUnavailable { step: 1 }) => {
            if state.source_unavailable() >= state.limits().unavailable_limit {
                return with_effects(state, StopReason::SourceUnavailable);
            }
            state.record_progress(false);
            finish_step(&mut state, 1)
        }
        (Phase::Advancing { step }, Msg::StepUnavailable { step: failed }) if failed == step => {
            if state.source_unavailable() >= state.limits().unavailable_limit {
                return with_effects(state, StopReason::SourceUnavailable);
            }
            state.record_progress(false);
            finish_step(&mut state, step)
        }
        // Messages that do not belong to the current phase are stale.
        _ => Vec::new(),
    };

    (state, effects)
}

/// A step progressed when the feed grew, something new was persisted, or the
/// "load more" affordance was actioned.
fn made_progress(state: &HarvestState, outcome: &StepOutcome) -> bool {
    outcome.visible > state.last_visible() || outcome.new_records > 0 || outcome.revealed
}

fn finish_step(state: &mut HarvestState, step: u64) -> Vec<Effect> {
    state.count_step();
    state.set_cursor(step);
    let mut effects = vec![Effect::Checkpoint { cursor: step }];
    if state.is_stalled() {
        effects.extend(terminate(state, StopReason::Stalled));
    } else {
        effects.extend(advance_after(state, step));
    }
    effects
}

fn advance_after(state: &mut HarvestState, completed: u64) -> Vec<Effect> {
    if completed >= state.limits().max_steps {
        return terminate(state, StopReason::MaxSteps);
    }
    let step = completed + 1;
    state.set_phase(Phase::Advancing { step });
    vec![Effect::Advance { step }]
}

fn terminate(state: &mut HarvestState, reason: StopReason) -> Vec<Effect> {
    state.set_phase(Phase::Terminated(reason));
    vec![Effect::Terminate { reason }]
}

fn with_effects(mut state: HarvestState, reason: StopReason) -> (HarvestState, Vec<Effect>) {
    let effects = terminate(&mut state, reason);
    (state, effects)
}
