//! Per-frame decision core of a single trial.
//!
//! Each frame is processed in two halves. [`TrialStateMachine::before_present`]
//! sees the input snapshot before the frame is drawn and runs, in order:
//! movement-onset capture, the unwanted-movement check, the premature-trigger
//! check, and cursor sampling. [`TrialStateMachine::after_present`] runs once
//! the frame is on screen: it latches target onset against the presentation
//! timestamp, then updates over-target tracking and looks for a response.

use log::{debug, info};
use motormap_core::geometry::{linear_distance, vector_angle};
use motormap_core::{ErrorCode, TrialCondition};
use motormap_input::NormalizedInput;

use super::config::{ScreenLayout, TaskConfig};
use super::samples::SampleLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    AwaitingTarget,
    OffTarget,
    OverTarget,
    Responded,
    Errored(ErrorCode),
    TimedOut,
}

impl TrialState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrialState::Responded | TrialState::Errored(_) | TrialState::TimedOut
        )
    }

    pub fn target_visible(&self) -> bool {
        !matches!(self, TrialState::AwaitingTarget)
    }
}

/// How a trial attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Responded,
    TimedOut,
    /// `recycle` is set when the error happened before the target appeared.
    Errored { code: ErrorCode, recycle: bool },
}

/// Thresholds the machine classifies against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatingRules {
    /// Cursor size in px. Moving the cursor farther than this from centre is
    /// "movement"; being within half of it of the target is "contact".
    pub cursor_size: f64,
    pub release_threshold: f64,
    pub press_threshold: f64,
}

impl GatingRules {
    pub fn new(config: &TaskConfig, layout: &ScreenLayout) -> Self {
        Self {
            cursor_size: layout.cursor_size,
            release_threshold: config.release_threshold,
            press_threshold: config.press_threshold,
        }
    }
}

/// One frame's worth of input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// When the input was read.
    pub now_ns: u64,
    pub cursor: (i32, i32),
    pub input: NormalizedInput,
    /// The onset ticket has fired, so the target is drawn this frame.
    pub target_due: bool,
}

/// Derived cursor geometry of the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorState {
    pub position: (i32, i32),
    pub distance_from_center: f64,
    pub distance_from_target: f64,
    pub over_target: bool,
    pub triggers_released: bool,
}

/// Everything a trial accumulates. Each latched value is written at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialProgress {
    pub state: TrialState,
    pub target_on_ns: Option<u64>,
    pub movement_rt_ns: Option<u64>,
    pub initial_angle: Option<f64>,
    pub contact_rt_ns: Option<u64>,
    pub response_rt_ns: Option<u64>,
    pub over_target: bool,
    pub error: Option<ErrorCode>,
    pub samples: SampleLog,
    pub cursor: Option<CursorState>,
}

impl TrialProgress {
    fn new() -> Self {
        Self {
            state: TrialState::AwaitingTarget,
            target_on_ns: None,
            movement_rt_ns: None,
            initial_angle: None,
            contact_rt_ns: None,
            response_rt_ns: None,
            over_target: false,
            error: None,
            samples: SampleLog::new(),
            cursor: None,
        }
    }
}

fn to_f64(p: (i32, i32)) -> (f64, f64) {
    (p.0 as f64, p.1 as f64)
}

#[derive(Debug, Clone)]
pub struct TrialStateMachine {
    condition: TrialCondition,
    rules: GatingRules,
    center: (i32, i32),
    target: (i32, i32),
    progress: TrialProgress,
}

impl TrialStateMachine {
    pub fn new(
        condition: TrialCondition,
        rules: GatingRules,
        center: (i32, i32),
        target: (i32, i32),
    ) -> Self {
        Self {
            condition,
            rules,
            center,
            target,
            progress: TrialProgress::new(),
        }
    }

    pub fn condition(&self) -> TrialCondition {
        self.condition
    }

    pub fn state(&self) -> TrialState {
        self.progress.state
    }

    pub fn progress(&self) -> &TrialProgress {
        &self.progress
    }

    pub fn into_progress(self) -> TrialProgress {
        self.progress
    }

    fn cursor_state(&self, frame: &FrameInput) -> CursorState {
        let position = to_f64(frame.cursor);
        CursorState {
            position: frame.cursor,
            distance_from_center: linear_distance(to_f64(self.center), position),
            distance_from_target: linear_distance(to_f64(self.target), position),
            over_target: self.progress.over_target,
            triggers_released: frame.input.triggers_released(self.rules.release_threshold),
        }
    }

    fn terminal(&self) -> Option<Termination> {
        match self.progress.state {
            TrialState::Responded => Some(Termination::Responded),
            TrialState::TimedOut => Some(Termination::TimedOut),
            TrialState::Errored(code) => Some(Termination::Errored {
                code,
                recycle: self.progress.target_on_ns.is_none(),
            }),
            _ => None,
        }
    }

    /// Input-side checks for one frame. Returns the termination if the frame
    /// ended the trial.
    pub fn before_present(&mut self, frame: &FrameInput) -> Option<Termination> {
        if self.progress.state.is_terminal() {
            return self.terminal();
        }

        let cursor = self.cursor_state(frame);
        self.progress.cursor = Some(cursor);
        let target_on = self.progress.target_on_ns;

        if let Some(on) = target_on {
            if self.progress.movement_rt_ns.is_none() && cursor.distance_from_center > 0.0 {
                let angle = vector_angle(to_f64(self.center), to_f64(frame.cursor));
                self.progress.movement_rt_ns = Some(frame.now_ns.saturating_sub(on));
                self.progress.initial_angle = Some(angle);
                debug!("movement onset, initial angle {:.1}", angle);
            }
        }

        let mut error = None;
        if cursor.distance_from_center > self.rules.cursor_size {
            use motormap_core::TrialType::*;
            error = match self.condition.trial_type {
                MotorImagery => Some(ErrorCode::StickMi),
                ChoiceOnly => Some(ErrorCode::StickCc),
                FreeMovement if target_on.is_none() => Some(ErrorCode::TooSoon),
                FreeMovement => None,
            };
        }
        if !frame.target_due && !cursor.triggers_released {
            error = Some(ErrorCode::TooSoon);
        }

        if let Some(code) = error {
            self.progress.error = Some(code);
            self.progress.state = TrialState::Errored(code);
            info!(
                "trial error {} ({})",
                code,
                if target_on.is_some() { "after onset" } else { "recycling" }
            );
            return self.terminal();
        }

        if let Some(on) = target_on {
            let elapsed_ms = frame.now_ns.saturating_sub(on) / 1_000_000;
            self.progress
                .samples
                .record(elapsed_ms, frame.cursor.0, frame.cursor.1);
        }
        None
    }

    /// Display-side checks once the frame built from `frame` was presented at
    /// `presented_ns`.
    pub fn after_present(&mut self, presented_ns: u64, frame: &FrameInput) -> Option<Termination> {
        if self.progress.state.is_terminal() {
            return self.terminal();
        }

        if self.progress.target_on_ns.is_none() && frame.target_due {
            self.progress.target_on_ns = Some(presented_ns);
            self.progress.state = TrialState::OffTarget;
            info!("target on screen at {} ns", presented_ns);
        }
        let on = self.progress.target_on_ns?;

        let cursor = self.cursor_state(frame);
        if cursor.distance_from_target < self.rules.cursor_size / 2.0 {
            // Holding a trigger while sliding onto the target does not count.
            if !self.progress.over_target && cursor.triggers_released {
                self.progress.over_target = true;
                if self.progress.contact_rt_ns.is_none() {
                    self.progress.contact_rt_ns = Some(presented_ns.saturating_sub(on));
                    debug!("first contact with target");
                }
            }
        } else {
            self.progress.over_target = false;
        }
        self.progress.cursor = Some(CursorState {
            over_target: self.progress.over_target,
            ..cursor
        });
        self.progress.state = if self.progress.over_target {
            TrialState::OverTarget
        } else {
            TrialState::OffTarget
        };

        let can_respond =
            self.progress.over_target || !self.condition.trial_type.requires_contact();
        if can_respond && frame.input.trigger_pressed(self.rules.press_threshold) {
            let rt = presented_ns.saturating_sub(on);
            self.progress.response_rt_ns = Some(rt);
            self.progress.state = TrialState::Responded;
            info!("response after {:.3} ms", rt as f64 / 1e6);
            return self.terminal();
        }
        None
    }

    /// The timeout ticket fired before any response.
    pub fn time_out(&mut self) -> Termination {
        if !self.progress.state.is_terminal() {
            info!("trial timed out");
            self.progress.state = TrialState::TimedOut;
        }
        self.terminal().unwrap_or(Termination::TimedOut)
    }
}
