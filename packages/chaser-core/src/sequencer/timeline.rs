//! Layer B: sequencer value construction.
//!
//! Pure functions computing the interpolated feature values for a playhead
//! position. Kept free of sequencer state so the interpolation contract can
//! be tested directly.

use crate::model::{LayerValueMap, PlayheadState, Program, ProgramStep};
use crate::protocol_constants::STEP_DURATION_BASE_MS;
use crate::utils::clamp01;

use super::mix::lerp_layer_maps;

/// Wall-clock length of a step at the given pacing (milliseconds).
///
/// `spm` sets the nominal step length (`60000 / spm`); the step's declared
/// `durationMs` scales it relative to the 500 ms base (500 ⇒ 1×, 1000 ⇒ 2×).
#[must_use]
pub fn step_target_duration_ms(step: &ProgramStep, spm: u16) -> f64 {
    let scale = (step.duration_ms.max(1) as f64) / STEP_DURATION_BASE_MS;
    (60_000.0 / f64::from(spm.max(1))) * scale
}

/// Index of the step faded *from* at the given position.
///
/// Mid-program that is simply the preceding step. At step 0 it is the last
/// step only when the playhead got there by wrapping; a freshly placed
/// playhead fades from step 0 itself so starting a program never flashes the
/// final step.
#[must_use]
pub fn previous_step_index(step_index: usize, step_count: usize, looping: bool, wrapped: bool) -> usize {
    if step_index > 0 {
        step_index - 1
    } else if looping && wrapped && step_count > 0 {
        step_count - 1
    } else {
        step_index
    }
}

/// Computes layer B for the given playhead.
///
/// Linearly interpolates each (fixture, feature) key appearing in either the
/// previous or current step, by `positionMs / fadeMs` (snapping when paused
/// or when the step declares no fade). Blackout zeroes everything, which
/// elides every key.
#[must_use]
pub fn build_sequencer_values(
    program: &Program,
    state: &PlayheadState,
    wrapped: bool,
) -> LayerValueMap {
    if state.is_blackout || program.steps.is_empty() {
        return LayerValueMap::new();
    }

    let len = program.steps.len();
    let index = state.step_index.min(len - 1);
    let current = &program.steps[index];
    let previous = &program.steps[previous_step_index(index, len, state.looping, wrapped)];

    let ratio = if !state.is_playing || current.fade_ms == 0 {
        1.0
    } else {
        clamp01(state.position_ms / current.fade_ms as f64)
    };

    let prev_values: LayerValueMap = previous.channel_values().collect();
    let curr_values: LayerValueMap = current.channel_values().collect();
    lerp_layer_maps(&prev_values, &curr_values, ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeatureKey;

    fn program(json: &str) -> Program {
        serde_json::from_str(json).unwrap()
    }

    fn two_step_fade() -> Program {
        program(
            r#"{
                "id": "p", "name": "P", "environmentId": "e", "spm": 120,
                "steps": [
                    {"id": "s0", "durationMs": 500, "fadeMs": 500, "frames": [
                        {"fixtureId": "fixtureA", "featureId": "featureR", "value": [255, 0, 0]}
                    ]},
                    {"id": "s1", "durationMs": 500, "fadeMs": 500, "frames": [
                        {"fixtureId": "fixtureA", "featureId": "featureR", "value": [0, 0, 255]}
                    ]}
                ]
            }"#,
        )
    }

    fn playhead(step_index: usize, position_ms: f64, is_playing: bool) -> PlayheadState {
        PlayheadState {
            is_playing,
            step_index,
            position_ms,
            ..PlayheadState::default()
        }
    }

    #[test]
    fn target_duration_scales_with_spm_and_step_length() {
        let step: ProgramStep =
            serde_json::from_str(r#"{"id": "s", "durationMs": 500}"#).unwrap();
        assert_eq!(step_target_duration_ms(&step, 120), 500.0);
        assert_eq!(step_target_duration_ms(&step, 1), 60_000.0);
        assert_eq!(step_target_duration_ms(&step, 500), 120.0);

        let double: ProgramStep =
            serde_json::from_str(r#"{"id": "s", "durationMs": 1000}"#).unwrap();
        assert_eq!(step_target_duration_ms(&double, 120), 1000.0);

        // Zero-length steps are floored so the tick loop always terminates.
        let zero: ProgramStep = serde_json::from_str(r#"{"id": "s", "durationMs": 0}"#).unwrap();
        assert!(step_target_duration_ms(&zero, 120) > 0.0);
    }

    #[test]
    fn mid_fade_interpolates_linearly() {
        let p = two_step_fade();
        let values = build_sequencer_values(&p, &playhead(1, 250.0, true), false);
        assert_eq!(
            values[&FeatureKey::new("fixtureA", "featureR")],
            vec![128, 0, 128]
        );
    }

    #[test]
    fn fade_complete_equals_current_step() {
        let p = two_step_fade();
        let values = build_sequencer_values(&p, &playhead(1, 500.0, true), false);
        assert_eq!(
            values[&FeatureKey::new("fixtureA", "featureR")],
            vec![0, 0, 255]
        );
    }

    #[test]
    fn paused_playhead_snaps_to_current_step() {
        let p = two_step_fade();
        let values = build_sequencer_values(&p, &playhead(1, 0.0, false), false);
        assert_eq!(
            values[&FeatureKey::new("fixtureA", "featureR")],
            vec![0, 0, 255]
        );
    }

    #[test]
    fn zero_fade_snaps_immediately() {
        let mut p = two_step_fade();
        p.steps[1].fade_ms = 0;
        let values = build_sequencer_values(&p, &playhead(1, 0.0, true), false);
        assert_eq!(
            values[&FeatureKey::new("fixtureA", "featureR")],
            vec![0, 0, 255]
        );
    }

    #[test]
    fn start_boundary_does_not_wrap_to_last_step() {
        // A freshly started program fades step 0 from itself...
        assert_eq!(previous_step_index(0, 2, true, false), 0);
        // ...but a wrapped playhead fades from the final step.
        assert_eq!(previous_step_index(0, 2, true, true), 1);
        // Without loop there is never a wrap source.
        assert_eq!(previous_step_index(0, 2, false, true), 0);
        assert_eq!(previous_step_index(1, 2, true, false), 0);
    }

    #[test]
    fn wrapped_step_zero_fades_from_last() {
        let p = two_step_fade();
        let values = build_sequencer_values(&p, &playhead(0, 250.0, true), true);
        // Halfway from step 1's blue back to step 0's red.
        assert_eq!(
            values[&FeatureKey::new("fixtureA", "featureR")],
            vec![128, 0, 128]
        );
    }

    #[test]
    fn blackout_elides_everything() {
        let p = two_step_fade();
        let mut state = playhead(1, 250.0, true);
        state.is_blackout = true;
        assert!(build_sequencer_values(&p, &state, false).is_empty());
    }

    #[test]
    fn key_union_fades_absent_side_from_zero() {
        let p = program(
            r#"{
                "id": "p", "name": "P", "environmentId": "e", "spm": 120,
                "steps": [
                    {"id": "s0", "durationMs": 500, "fadeMs": 500, "frames": [
                        {"fixtureId": "a", "featureId": "dim", "value": 200}
                    ]},
                    {"id": "s1", "durationMs": 500, "fadeMs": 500, "frames": [
                        {"fixtureId": "b", "featureId": "dim", "value": 100}
                    ]}
                ]
            }"#,
        );
        let values = build_sequencer_values(&p, &playhead(1, 250.0, true), false);
        // a:dim fades out toward zero, b:dim fades in from zero.
        assert_eq!(values[&FeatureKey::new("a", "dim")], vec![100]);
        assert_eq!(values[&FeatureKey::new("b", "dim")], vec![50]);
    }

    #[test]
    fn empty_program_yields_empty_map() {
        let p = program(
            r#"{"id": "p", "name": "P", "environmentId": "e", "spm": 120, "steps": []}"#,
        );
        assert!(build_sequencer_values(&p, &playhead(0, 0.0, true), false).is_empty());
    }
}
