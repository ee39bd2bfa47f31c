use motormap_core::geometry::px_to_deg;
use motormap_core::{AxisSample, TrialCondition, TrialKey, TrialOutcome};

use super::state::{TrialProgress, TrialState};
use super::trial::TrialFactors;

fn ns_to_ms(ns: u64) -> f64 {
    ns as f64 / 1e6
}

/// Builds the result record of a finished trial attempt.
pub fn assemble_outcome(
    key: &TrialKey,
    condition: TrialCondition,
    factors: &TrialFactors,
    progress: &TrialProgress,
    pixels_per_degree: f64,
) -> TrialOutcome {
    TrialOutcome {
        block_num: key.block_num,
        trial_num: key.trial_num,
        trial_type: condition.trial_type,
        mapping: condition.mapping,
        target_onset: progress.target_on_ns.map(|_| factors.target_onset_ms),
        target_dist: px_to_deg(factors.target_dist as f64, pixels_per_degree),
        target_angle: factors.target_angle,
        movement_rt: progress.movement_rt_ns.map(ns_to_ms),
        contact_rt: progress.contact_rt_ns.map(ns_to_ms),
        response_rt: progress.response_rt_ns.map(ns_to_ms),
        initial_angle: progress.initial_angle,
        err: progress.error,
        target_x: factors.target_loc.0,
        target_y: factors.target_loc.1,
    }
}

/// The cursor trace worth persisting: only error-free trials that ended in a
/// response keep their samples.
pub fn samples_to_flush(progress: &TrialProgress) -> Option<&[AxisSample]> {
    match (progress.state, progress.error) {
        (TrialState::Responded, None) => Some(progress.samples.samples()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FrameInput, GatingRules, TrialStateMachine};
    use motormap_core::{ErrorCode, Mapping, TrialType};
    use motormap_input::NormalizedInput;

    const MS: u64 = 1_000_000;

    fn factors() -> TrialFactors {
        TrialFactors {
            target_dist: 200,
            target_angle: 0,
            target_loc: (500, 300),
            target_onset_ms: 1000,
            timeout_ms: 16_000,
        }
    }

    fn key() -> TrialKey {
        TrialKey {
            participant_id: "P01".into(),
            block_num: 2,
            trial_num: 5,
        }
    }

    fn machine(trial_type: TrialType) -> TrialStateMachine {
        TrialStateMachine::new(
            TrialCondition::new(trial_type, Mapping::Backwards),
            GatingRules {
                cursor_size: 40.0,
                release_threshold: 0.2,
                press_threshold: 0.5,
            },
            (500, 500),
            (500, 300),
        )
    }

    fn run(m: &mut TrialStateMachine, ms: u64, cursor: (i32, i32), trigger: f64, due: bool) {
        let f = FrameInput {
            now_ns: ms * MS,
            cursor,
            input: NormalizedInput {
                right: trigger,
                ..Default::default()
            },
            target_due: due,
        };
        if m.before_present(&f).is_none() {
            m.after_present(ms * MS, &f);
        }
    }

    #[test]
    fn responded_trial_reports_latched_times() {
        let mut m = machine(TrialType::FreeMovement);
        run(&mut m, 1000, (500, 500), 0.0, true);
        run(&mut m, 1250, (500, 420), 0.0, true);
        run(&mut m, 1500, (500, 301), 0.0, true);
        run(&mut m, 1700, (500, 301), 0.8, true);

        let outcome = assemble_outcome(
            &key(),
            m.condition(),
            &factors(),
            m.progress(),
            40.0,
        );
        assert_eq!(outcome.block_num, 2);
        assert_eq!(outcome.trial_num, 5);
        assert_eq!(outcome.mapping, Mapping::Backwards);
        assert_eq!(outcome.target_onset, Some(1000));
        assert_eq!(outcome.target_dist, 5.0);
        assert_eq!(outcome.movement_rt, Some(250.0));
        assert_eq!(outcome.contact_rt, Some(500.0));
        assert_eq!(outcome.response_rt, Some(700.0));
        assert_eq!(outcome.initial_angle, Some(0.0));
        assert_eq!(outcome.err, None);
        assert_eq!((outcome.target_x, outcome.target_y), (500, 300));

        let samples = samples_to_flush(m.progress()).unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn errored_trial_keeps_its_code_and_no_samples() {
        let mut m = machine(TrialType::MotorImagery);
        run(&mut m, 1000, (500, 500), 0.0, true);
        run(&mut m, 1100, (500, 490), 0.0, true);
        run(&mut m, 1200, (500, 430), 0.0, true);

        let outcome = assemble_outcome(&key(), m.condition(), &factors(), m.progress(), 40.0);
        assert_eq!(outcome.err, Some(ErrorCode::StickMi));
        assert_eq!(outcome.movement_rt, Some(100.0));
        assert_eq!(outcome.response_rt, None);
        assert!(samples_to_flush(m.progress()).is_none());
    }

    #[test]
    fn timed_out_trial_is_all_na() {
        let mut m = machine(TrialType::FreeMovement);
        run(&mut m, 1000, (500, 500), 0.0, true);
        m.time_out();
        let outcome = assemble_outcome(&key(), m.condition(), &factors(), m.progress(), 40.0);
        assert_eq!(outcome.target_onset, Some(1000));
        assert!(outcome.movement_rt.is_none());
        assert!(outcome.contact_rt.is_none());
        assert!(outcome.response_rt.is_none());
        assert!(outcome.initial_angle.is_none());
        assert!(outcome.err.is_none());
        assert!(samples_to_flush(m.progress()).is_none());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["movement_rt"], "NA");
        assert_eq!(json["err"], "NA");
    }

    #[test]
    fn target_onset_is_na_when_never_shown() {
        let m = machine(TrialType::ChoiceOnly);
        let outcome = assemble_outcome(&key(), m.condition(), &factors(), m.progress(), 40.0);
        assert_eq!(outcome.target_onset, None);
    }
}
