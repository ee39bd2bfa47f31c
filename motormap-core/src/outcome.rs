use serde::{Deserialize, Serialize};
use std::fmt;

use crate::condition::{Mapping, TrialType};

/// Behavioural error a trial can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Trigger or stick activity before the target appeared.
    TooSoon,
    /// Stick moved on a motor-imagery trial.
    StickMi,
    /// Stick moved on a choice-only trial.
    StickCc,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::TooSoon => "too_soon",
            ErrorCode::StickMi => "stick_mi",
            ErrorCode::StickCc => "stick_cc",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One cursor position, timed from target onset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSample {
    pub elapsed_ms: u64,
    pub x: i32,
    pub y: i32,
}

/// Identifies a trial in persisted results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialKey {
    pub participant_id: String,
    pub block_num: usize,
    pub trial_num: usize,
}

/// Result record of a single trial. Unset values serialize as `"NA"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub block_num: usize,
    pub trial_num: usize,
    pub trial_type: TrialType,
    pub mapping: Mapping,
    /// Scheduled onset delay in ms, if the target was ever shown.
    #[serde(with = "na")]
    pub target_onset: Option<u64>,
    /// Target distance from centre in degrees of visual angle.
    pub target_dist: f64,
    pub target_angle: u32,
    #[serde(with = "na")]
    pub movement_rt: Option<f64>,
    #[serde(with = "na")]
    pub contact_rt: Option<f64>,
    #[serde(with = "na")]
    pub response_rt: Option<f64>,
    #[serde(with = "na")]
    pub initial_angle: Option<f64>,
    #[serde(with = "na")]
    pub err: Option<ErrorCode>,
    pub target_x: i32,
    pub target_y: i32,
}

/// Serde adapter writing `None` as the `"NA"` marker instead of `null` or zero.
pub mod na {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub const MARKER: &str = "NA";

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(v) => v.serialize(serializer),
            None => serializer.serialize_str(MARKER),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ValueOrMarker<T> {
        Value(T),
        Marker(String),
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        match ValueOrMarker::<T>::deserialize(deserializer)? {
            ValueOrMarker::Value(v) => Ok(Some(v)),
            ValueOrMarker::Marker(m) if m == MARKER => Ok(None),
            ValueOrMarker::Marker(m) => Err(de::Error::custom(format!(
                "expected a value or \"{MARKER}\", got {m:?}"
            ))),
        }
    }
}
