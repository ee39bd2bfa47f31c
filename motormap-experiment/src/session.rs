//! Block and trial sequencing around [`TrialStateMachine`].
//!
//! The harness drives a [`Session`] once per display refresh: [`Session::frame`]
//! consumes the input events of the refresh and returns the scene to draw,
//! [`Session::presented`] reports when that scene reached the screen. Waiting
//! screens (block instructions, feedback, "press any button") are stages of
//! their own, so nothing here ever blocks.

use std::mem;

use log::{debug, info, warn};
use motormap_core::{
    BlockPhase, ErrorCode, FeedbackMessage, Mapping, Phase, Scene, TrialCondition, TrialKey,
    TrialOutcome, TrialScene, TrialType,
};
use motormap_input::{AxisRemapper, InputSource, NormalizedInput};
use motormap_timing::{EventScheduler, Timer};
use rand::Rng;

use crate::config::{ScreenLayout, TaskConfig};
use crate::error::SessionError;
use crate::outcome::{assemble_outcome, samples_to_flush};
use crate::sink::ResultSink;
use crate::state::{FrameInput, GatingRules, Termination, TrialStateMachine};
use crate::trial::{TrialFactors, TARGET_ON, TIMEOUT};

const MS: u64 = 1_000_000;

pub const START_PROMPT: &str = "Press any button to start.";

const MOVE_INSTRUCTIONS: &str = "For the next set of trials, please use the right stick to move the\n\
     cursor over the target, then press one of the back triggers.";
const IMAGINE_INSTRUCTIONS: &str = "For the next set of trials, please try to imagine what it would look\n\
     and feel like to move the cursor over the target (without actually\n\
     moving it), then press one of the back triggers when you have\n\
     completed the imagined movement.";
const CHOICE_INSTRUCTIONS: &str = "For the next set of trials, please press one of the back triggers as\n\
     soon as you see the target appear (without moving the joystick).";

fn instructions(trial_type: TrialType) -> &'static str {
    match trial_type {
        TrialType::FreeMovement => MOVE_INSTRUCTIONS,
        TrialType::MotorImagery => IMAGINE_INSTRUCTIONS,
        TrialType::ChoiceOnly => CHOICE_INSTRUCTIONS,
    }
}

fn remapping_note(mapping: Mapping) -> String {
    let change = match mapping {
        Mapping::Normal => "The stick has been restored to its usual directions",
        Mapping::Backwards => "Both axes have been flipped",
        Mapping::InvertedX => "The left-right axis has been flipped",
        Mapping::InvertedY => "The up-down axis has been flipped",
    };
    format!(
        "Note that for this block, the joystick controls will be different:\n\
         {change}, such that moving the stick\n\
         will have a different effect than it used to."
    )
}

/// Instruction text shown before a block.
pub fn block_message(phase: BlockPhase, config: &TaskConfig) -> String {
    let trial_type = phase.trial_type(config.condition);
    let mut text = String::new();
    if phase.is_practice() {
        text.push_str("This is a practice block.\n\n");
    }
    text.push_str(instructions(trial_type));
    if phase.uses_test_mapping() && config.test_mapping != config.training_mapping {
        text.push_str("\n\n");
        text.push_str(&remapping_note(config.test_mapping));
    }
    text
}

/// What the harness observed since the previous frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameEvents {
    /// Escape or window close.
    pub quit: bool,
    /// Any discrete key or button press.
    pub any_input: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    BlockStarted {
        block_num: usize,
        phase: BlockPhase,
    },
    /// The emulated stick was recentred; harnesses warp the OS pointer too.
    TrialStarted {
        block_num: usize,
        trial_num: usize,
    },
    TargetOnset {
        presented_ns: u64,
    },
    TrialCompleted(TrialOutcome),
    TrialRecycled {
        block_num: usize,
        trial_num: usize,
        code: ErrorCode,
    },
    SessionFinished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub scene: Scene,
    pub events: Vec<SessionEvent>,
}

/// Counts over every written outcome of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionSummary {
    pub trials: usize,
    pub responded: usize,
    pub errors: usize,
    pub timed_out: usize,
    pub recycled: usize,
    pub mean_response_rt_ms: Option<f64>,
}

impl SessionSummary {
    pub fn from_outcomes(outcomes: &[TrialOutcome], recycled: usize) -> Self {
        let rts: Vec<f64> = outcomes.iter().filter_map(|o| o.response_rt).collect();
        let errors = outcomes.iter().filter(|o| o.err.is_some()).count();
        Self {
            trials: outcomes.len(),
            responded: rts.len(),
            errors,
            timed_out: outcomes.len() - rts.len() - errors,
            recycled,
            mean_response_rt_ms: (!rts.is_empty())
                .then(|| rts.iter().sum::<f64>() / rts.len() as f64),
        }
    }
}

struct ActiveTrial {
    key: TrialKey,
    factors: TrialFactors,
    machine: TrialStateMachine,
    remapper: AxisRemapper,
    /// Input of the frame currently waiting to be presented.
    pending: Option<FrameInput>,
}

enum Stage {
    BlockIntro {
        until_ns: u64,
    },
    BlockPrompt,
    Trial(Box<ActiveTrial>),
    ErrorFeedback {
        message: FeedbackMessage,
        until_ns: u64,
        advance: bool,
    },
    ErrorPrompt {
        message: FeedbackMessage,
        advance: bool,
    },
    Feedback {
        text: String,
        until_ns: u64,
    },
    Finished,
}

pub struct Session<T, S, K, R>
where
    T: Timer,
    S: InputSource,
    K: ResultSink,
    R: Rng,
{
    config: TaskConfig,
    layout: ScreenLayout,
    rules: GatingRules,
    evm: EventScheduler<T>,
    source: S,
    sink: K,
    rng: R,
    phase: BlockPhase,
    trial_num: usize,
    stage: Stage,
    events: Vec<SessionEvent>,
    results: Vec<TrialOutcome>,
    recycled: usize,
}

impl<T, S, K, R> Session<T, S, K, R>
where
    T: Timer,
    S: InputSource,
    K: ResultSink,
    R: Rng,
{
    pub fn new(
        config: TaskConfig,
        layout: ScreenLayout,
        timer: T,
        source: S,
        sink: K,
        rng: R,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let rules = GatingRules::new(&config, &layout);
        let mut session = Self {
            config,
            layout,
            rules,
            evm: EventScheduler::new(timer),
            source,
            sink,
            rng,
            phase: BlockPhase::default(),
            trial_num: 1,
            stage: Stage::Finished,
            events: Vec::new(),
            results: Vec::new(),
            recycled: 0,
        };
        let now = session.evm.timer().now();
        session.enter_block(now);
        Ok(session)
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn layout(&self) -> &ScreenLayout {
        &self.layout
    }

    pub fn timer(&self) -> &T {
        self.evm.timer()
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    pub fn phase(&self) -> BlockPhase {
        self.phase
    }

    pub fn trial_num(&self) -> usize {
        self.trial_num
    }

    pub fn results(&self) -> &[TrialOutcome] {
        &self.results
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Finished)
    }

    pub fn in_trial(&self) -> bool {
        matches!(self.stage, Stage::Trial(_))
    }

    /// Factors of the running trial attempt.
    pub fn current_factors(&self) -> Option<&TrialFactors> {
        match &self.stage {
            Stage::Trial(trial) => Some(&trial.factors),
            _ => None,
        }
    }

    /// Condition of the current block.
    pub fn condition(&self) -> TrialCondition {
        TrialCondition::new(
            self.phase.trial_type(self.config.condition),
            self.phase
                .mapping(self.config.training_mapping, self.config.test_mapping),
        )
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_outcomes(&self.results, self.recycled)
    }

    /// Advances the session by one display refresh.
    pub fn frame(&mut self, input: &FrameEvents) -> Result<FrameOutput, SessionError> {
        if input.quit {
            warn!(
                "quit requested in block {} trial {}",
                self.phase.block_number(),
                self.trial_num
            );
            self.evm.clear();
            self.stage = Stage::Finished;
            return Err(SessionError::Aborted);
        }

        let now = self.evm.timer().now();
        match self.stage {
            Stage::BlockIntro { until_ns } if now >= until_ns => self.stage = Stage::BlockPrompt,
            Stage::BlockPrompt if input.any_input => self.begin_trial()?,
            Stage::Trial(_) => self.trial_frame(now)?,
            Stage::ErrorFeedback {
                message,
                until_ns,
                advance,
            } if now >= until_ns => self.stage = Stage::ErrorPrompt { message, advance },
            Stage::ErrorPrompt { advance, .. } if input.any_input => {
                self.next_trial(advance, now)?
            }
            Stage::Feedback { until_ns, .. } if now >= until_ns => self.next_trial(true, now)?,
            _ => {}
        }

        Ok(FrameOutput {
            scene: self.scene(),
            events: mem::take(&mut self.events),
        })
    }

    /// Reports that the scene returned by the last [`frame`](Self::frame)
    /// went on screen at `presented_ns`.
    pub fn presented(&mut self, presented_ns: u64) -> Result<(), SessionError> {
        let Stage::Trial(trial) = &mut self.stage else {
            return Ok(());
        };
        let Some(frame) = trial.pending.take() else {
            return Ok(());
        };

        let was_visible = trial.machine.progress().target_on_ns.is_some();
        let termination = trial.machine.after_present(presented_ns, &frame);
        if !was_visible && trial.machine.progress().target_on_ns.is_some() {
            self.events.push(SessionEvent::TargetOnset { presented_ns });
        }

        match termination {
            Some(termination) => {
                let now = self.evm.timer().now();
                self.finish_trial(termination, now)
            }
            None => Ok(()),
        }
    }

    /// The scene for the current stage.
    pub fn scene(&self) -> Scene {
        let center = to_f32(self.layout.center);
        let lower_middle = to_f32(self.layout.lower_middle);
        match &self.stage {
            Stage::BlockIntro { .. } => Scene::message(
                block_message(self.phase, &self.config),
                to_f32(self.layout.message_anchor),
            ),
            Stage::BlockPrompt => Scene::message(
                block_message(self.phase, &self.config),
                to_f32(self.layout.message_anchor),
            )
            .with_footer(START_PROMPT, lower_middle),
            Stage::Trial(trial) => Scene::Trial(self.trial_scene(trial)),
            Stage::ErrorFeedback { message, .. } => Scene::message(message.text(), center),
            Stage::ErrorPrompt { message, .. } => Scene::message(message.text(), center)
                .with_footer(FeedbackMessage::Continue.text(), lower_middle),
            Stage::Feedback { text, .. } => Scene::message(text.clone(), center),
            Stage::Finished => Scene::Blank,
        }
    }

    fn trial_scene(&self, trial: &ActiveTrial) -> TrialScene {
        let (cursor, target_due) = match &trial.pending {
            Some(frame) => (frame.cursor, frame.target_due),
            None => (self.layout.center, false),
        };
        let visible = target_due || trial.machine.state().target_visible();
        TrialScene {
            center: to_f32(self.layout.center),
            fixation_size: self.layout.fixation_size as f32,
            fixation_thickness: self.layout.fixation_thickness as f32,
            cursor: to_f32(cursor),
            cursor_size: self.layout.cursor_size as f32,
            target: visible.then(|| to_f32(trial.factors.target_loc)),
            target_size: self.layout.target_size as f32,
        }
    }

    fn block_length(&self) -> usize {
        if self.phase.is_practice() {
            self.config.practice_trials
        } else {
            self.config.trials_per_block
        }
    }

    fn enter_block(&mut self, now: u64) {
        let condition = self.condition();
        info!(
            "block {} ({:?}): {} trials, {} with {} mapping",
            self.phase.block_number(),
            self.phase,
            self.block_length(),
            condition.trial_type,
            condition.mapping
        );
        self.events.push(SessionEvent::BlockStarted {
            block_num: self.phase.block_number(),
            phase: self.phase,
        });
        self.stage = Stage::BlockIntro {
            until_ns: now + self.config.block_message_ms * MS,
        };
    }

    /// Draws fresh factors, arms the tickets and starts the trial clock.
    fn begin_trial(&mut self) -> Result<(), SessionError> {
        let condition = self.condition();
        let factors = TrialFactors::draw(&mut self.rng, &self.layout, &self.config);

        self.evm.clear();
        factors.register(&mut self.evm)?;
        self.source.reset();
        self.evm.start_trial();

        let key = TrialKey {
            participant_id: self.config.participant_id.clone(),
            block_num: self.phase.block_number(),
            trial_num: self.trial_num,
        };
        info!(
            "block {} trial {}: {} px at {} deg, onset {} ms",
            key.block_num,
            key.trial_num,
            factors.target_dist,
            factors.target_angle,
            factors.target_onset_ms
        );
        self.events.push(SessionEvent::TrialStarted {
            block_num: key.block_num,
            trial_num: key.trial_num,
        });

        let machine = TrialStateMachine::new(
            condition,
            self.rules,
            self.layout.center,
            factors.target_loc,
        );
        let remapper = AxisRemapper::new(
            self.layout.center,
            self.layout.target_dist_max,
            condition.mapping,
        );
        self.stage = Stage::Trial(Box::new(ActiveTrial {
            key,
            factors,
            machine,
            remapper,
            pending: None,
        }));
        Ok(())
    }

    fn trial_frame(&mut self, now: u64) -> Result<(), SessionError> {
        let Stage::Trial(trial) = &mut self.stage else {
            return Ok(());
        };

        if self.evm.after_at(TIMEOUT, now)? {
            let termination = trial.machine.time_out();
            return self.finish_trial(termination, now);
        }

        self.source.update();
        let raw = self.source.sample(self.evm.trial_time_ms_at(now)?);
        let input = NormalizedInput::from_raw(&raw, self.config.deadzone);
        let frame = FrameInput {
            now_ns: now,
            cursor: trial.remapper.cursor_position(&input),
            input,
            target_due: self.evm.after_at(TARGET_ON, now)?,
        };

        match trial.machine.before_present(&frame) {
            Some(termination) => self.finish_trial(termination, now),
            None => {
                trial.pending = Some(frame);
                Ok(())
            }
        }
    }

    fn finish_trial(&mut self, termination: Termination, now: u64) -> Result<(), SessionError> {
        let Stage::Trial(trial) = mem::replace(&mut self.stage, Stage::Finished) else {
            return Ok(());
        };
        self.evm.clear();
        let ActiveTrial {
            key,
            factors,
            machine,
            ..
        } = *trial;
        let condition = machine.condition();
        let progress = machine.into_progress();

        if let Termination::Errored {
            code,
            recycle: true,
        } = termination
        {
            self.recycled += 1;
            info!(
                "recycling block {} trial {} after {}",
                key.block_num, key.trial_num, code
            );
            self.events.push(SessionEvent::TrialRecycled {
                block_num: key.block_num,
                trial_num: key.trial_num,
                code,
            });
            self.stage = Stage::ErrorFeedback {
                message: code.into(),
                until_ns: now + self.config.error_feedback_ms * MS,
                advance: false,
            };
            return Ok(());
        }

        let outcome = assemble_outcome(
            &key,
            condition,
            &factors,
            &progress,
            self.config.pixels_per_degree,
        );
        // Trace before row: a row in the trial file always has its samples.
        if let Some(samples) = samples_to_flush(&progress) {
            self.sink.write_samples(&key, samples)?;
        }
        self.sink.write_outcome(&key.participant_id, &outcome)?;
        debug!("wrote outcome for block {} trial {}", key.block_num, key.trial_num);

        self.stage = match termination {
            Termination::Responded => Stage::Feedback {
                text: format!("{:.3}", outcome.response_rt.unwrap_or_default() / 1000.0),
                until_ns: now + self.config.response_feedback_ms * MS,
            },
            Termination::TimedOut => Stage::Feedback {
                text: FeedbackMessage::TooSlow.text().to_string(),
                until_ns: now + self.config.timeout_feedback_ms * MS,
            },
            Termination::Errored { code, .. } => Stage::ErrorFeedback {
                message: code.into(),
                until_ns: now + self.config.error_feedback_ms * MS,
                advance: true,
            },
        };
        self.results.push(outcome.clone());
        self.events.push(SessionEvent::TrialCompleted(outcome));
        Ok(())
    }

    fn next_trial(&mut self, advance: bool, now: u64) -> Result<(), SessionError> {
        if advance {
            self.trial_num += 1;
        }
        if self.trial_num <= self.block_length() {
            return self.begin_trial();
        }

        match self.phase.next() {
            Some(next) => {
                self.phase = next;
                self.trial_num = 1;
                self.enter_block(now);
            }
            None => {
                let summary = self.summary();
                info!(
                    "session complete: {} trials, {} responses, {} errors, {} timeouts, {} recycled",
                    summary.trials,
                    summary.responded,
                    summary.errors,
                    summary.timed_out,
                    summary.recycled
                );
                if let Some(rt) = summary.mean_response_rt_ms {
                    info!("mean response time {:.1} ms", rt);
                }
                self.stage = Stage::Finished;
                self.events.push(SessionEvent::SessionFinished);
            }
        }
        Ok(())
    }
}

fn to_f32(p: (i32, i32)) -> (f32, f32) {
    (p.0 as f32, p.1 as f32)
}
