use serde::{Deserialize, Serialize};
use std::fmt;

/// What the participant is asked to do on each trial of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrialType {
    /// Move the cursor onto the target, then pull a trigger.
    #[serde(rename = "PP")]
    FreeMovement,
    /// Imagine the movement without moving the stick, then pull a trigger.
    #[serde(rename = "MI")]
    MotorImagery,
    /// Pull a trigger as soon as the target appears, without moving.
    #[serde(rename = "CC")]
    ChoiceOnly,
}

impl TrialType {
    pub fn code(&self) -> &'static str {
        match self {
            TrialType::FreeMovement => "PP",
            TrialType::MotorImagery => "MI",
            TrialType::ChoiceOnly => "CC",
        }
    }

    /// Whether a trigger pull only counts while the cursor is over the target.
    pub fn requires_contact(&self) -> bool {
        matches!(self, TrialType::FreeMovement)
    }
}

impl fmt::Display for TrialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Linear stick-to-cursor transform applied for a whole block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mapping {
    Normal,
    Backwards,
    InvertedX,
    InvertedY,
}

impl Mapping {
    pub const ALL: [Mapping; 4] = [
        Mapping::Normal,
        Mapping::Backwards,
        Mapping::InvertedX,
        Mapping::InvertedY,
    ];

    /// Per-axis sign applied to the normalized stick displacement.
    pub fn modifiers(&self) -> (f64, f64) {
        match self {
            Mapping::Normal => (1.0, 1.0),
            Mapping::Backwards => (-1.0, -1.0),
            Mapping::InvertedX => (-1.0, 1.0),
            Mapping::InvertedY => (1.0, -1.0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mapping::Normal => "normal",
            Mapping::Backwards => "backwards",
            Mapping::InvertedX => "inverted_x",
            Mapping::InvertedY => "inverted_y",
        }
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The task/mapping pair a trial runs under. Fixed from trial prep to outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialCondition {
    pub trial_type: TrialType,
    pub mapping: Mapping,
}

impl TrialCondition {
    pub fn new(trial_type: TrialType, mapping: Mapping) -> Self {
        Self {
            trial_type,
            mapping,
        }
    }
}
