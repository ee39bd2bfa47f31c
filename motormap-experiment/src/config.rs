use std::fs;
use std::path::{Path, PathBuf};

use motormap_core::geometry::deg_to_px;
use motormap_core::{Mapping, TrialType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Longest duration any timing setting may take. Deadlines are computed in
/// nanoseconds on a `u64` clock, so they stay far from overflow under this.
pub const MAX_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Task parameters. Sizes are in degrees of visual angle, durations in ms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub participant_id: String,
    pub pixels_per_degree: f64,

    pub cursor_size_deg: f64,
    pub target_size_deg: f64,
    pub fixation_size_deg: f64,
    pub fixation_thickness_deg: f64,
    pub target_dist_min_deg: f64,
    /// Gap kept between the farthest target and the top/bottom screen edge.
    pub target_dist_margin_deg: f64,

    /// Target onset is drawn from `[start, end)` in `onset_step_ms` steps.
    pub onset_window_ms: (u64, u64),
    pub onset_step_ms: u64,
    /// Hard timeout, counted from target onset.
    pub timeout_ms: u64,

    pub deadzone: f64,
    /// Both triggers must be below this to count as released.
    pub release_threshold: f64,
    /// Either trigger above this counts as a response.
    pub press_threshold: f64,
    pub click_guard_ms: u64,

    pub practice_trials: usize,
    pub trials_per_block: usize,
    /// Trial type of the training block.
    pub condition: TrialType,
    pub training_mapping: Mapping,
    pub test_mapping: Mapping,

    pub block_message_ms: u64,
    pub error_feedback_ms: u64,
    pub response_feedback_ms: u64,
    pub timeout_feedback_ms: u64,

    pub output_dir: PathBuf,
    /// TrueType/OpenType font for instructions; without one no text is drawn.
    pub font_path: Option<PathBuf>,
    pub text_size_deg: f64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            participant_id: "P00".to_string(),
            pixels_per_degree: 36.0,
            cursor_size_deg: 1.0,
            target_size_deg: 0.3,
            fixation_size_deg: 0.5,
            fixation_thickness_deg: 0.06,
            target_dist_min_deg: 3.0,
            target_dist_margin_deg: 1.0,
            onset_window_ms: (1000, 3000),
            onset_step_ms: 100,
            timeout_ms: 15_000,
            deadzone: 0.2,
            release_threshold: 0.2,
            press_threshold: 0.5,
            click_guard_ms: 100,
            practice_trials: 10,
            trials_per_block: 40,
            condition: TrialType::MotorImagery,
            training_mapping: Mapping::Normal,
            test_mapping: Mapping::InvertedX,
            block_message_ms: 2000,
            error_feedback_ms: 2000,
            response_feedback_ms: 1000,
            timeout_feedback_ms: 2000,
            output_dir: PathBuf::from("results"),
            font_path: None,
            text_size_deg: 0.6,
        }
    }
}

impl TaskConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: TaskConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.participant_id.trim().is_empty() {
            return Err(invalid("participant_id", "must not be empty"));
        }
        if !(self.pixels_per_degree > 0.0) {
            return Err(invalid("pixels_per_degree", "must be positive"));
        }
        for (field, value) in [
            ("cursor_size_deg", self.cursor_size_deg),
            ("target_size_deg", self.target_size_deg),
            ("target_dist_min_deg", self.target_dist_min_deg),
            ("text_size_deg", self.text_size_deg),
        ] {
            if !(value > 0.0) {
                return Err(invalid(field, "must be positive"));
            }
        }
        if !(self.deadzone > 0.0 && self.deadzone < 1.0) {
            return Err(invalid("deadzone", format!("{} is outside (0, 1)", self.deadzone)));
        }
        for (field, value) in [
            ("release_threshold", self.release_threshold),
            ("press_threshold", self.press_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("{value} is outside [0, 1]")));
            }
        }
        let (start, end) = self.onset_window_ms;
        if self.onset_step_ms == 0 {
            return Err(invalid("onset_step_ms", "must be positive"));
        }
        if end <= start {
            return Err(invalid(
                "onset_window_ms",
                format!("window [{start}, {end}) is empty"),
            ));
        }
        for (field, value) in [
            ("onset_window_ms", end),
            ("onset_step_ms", self.onset_step_ms),
            ("timeout_ms", self.timeout_ms),
            ("click_guard_ms", self.click_guard_ms),
            ("block_message_ms", self.block_message_ms),
            ("error_feedback_ms", self.error_feedback_ms),
            ("response_feedback_ms", self.response_feedback_ms),
            ("timeout_feedback_ms", self.timeout_feedback_ms),
        ] {
            if value > MAX_DURATION_MS {
                return Err(invalid(
                    field,
                    format!("{value} ms exceeds the {MAX_DURATION_MS} ms limit"),
                ));
            }
        }
        if self.practice_trials == 0 || self.trials_per_block == 0 {
            return Err(invalid("trials_per_block", "blocks need at least one trial"));
        }
        Ok(())
    }

    pub fn deg_to_px(&self, deg: f64) -> f64 {
        deg_to_px(deg, self.pixels_per_degree)
    }
}

/// Pixel geometry of the task for one display size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenLayout {
    pub width: u32,
    pub height: u32,
    pub center: (i32, i32),
    pub cursor_size: f64,
    pub target_size: f64,
    pub fixation_size: f64,
    pub fixation_thickness: f64,
    pub target_dist_min: f64,
    pub target_dist_max: f64,
    /// Anchor for block instructions.
    pub message_anchor: (i32, i32),
    /// Anchor for "press any button" prompts.
    pub lower_middle: (i32, i32),
}

impl ScreenLayout {
    pub fn new(config: &TaskConfig, width: u32, height: u32) -> Result<Self, ConfigError> {
        let center = (width as i32 / 2, height as i32 / 2);
        let half_height_deg = (height as f64 / 2.0) / config.pixels_per_degree;
        let target_dist_min = config.deg_to_px(config.target_dist_min_deg).round();
        let target_dist_max =
            config.deg_to_px(half_height_deg - config.target_dist_margin_deg).round();
        if target_dist_max <= target_dist_min {
            return Err(invalid(
                "target_dist_min_deg",
                format!(
                    "a {width}x{height} display leaves no room for targets beyond {target_dist_min} px"
                ),
            ));
        }
        Ok(Self {
            width,
            height,
            center,
            cursor_size: config.deg_to_px(config.cursor_size_deg),
            target_size: config.deg_to_px(config.target_size_deg),
            fixation_size: config.deg_to_px(config.fixation_size_deg),
            fixation_thickness: config.deg_to_px(config.fixation_thickness_deg),
            target_dist_min,
            target_dist_max,
            message_anchor: (center.0, (height as f64 * 0.4) as i32),
            lower_middle: (center.0, (height as f64 * 0.75) as i32),
        })
    }

    pub fn center_f64(&self) -> (f64, f64) {
        (self.center.0 as f64, self.center.1 as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TaskConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: TaskConfig =
            serde_json::from_str(r#"{"participant_id": "P07", "condition": "CC"}"#).unwrap();
        assert_eq!(config.participant_id, "P07");
        assert_eq!(config.condition, TrialType::ChoiceOnly);
        assert_eq!(config.timeout_ms, 15_000);
        assert_eq!(config.onset_window_ms, (1000, 3000));
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut config = TaskConfig::default();
        config.deadzone = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "deadzone", .. })
        ));

        let mut config = TaskConfig::default();
        config.onset_window_ms = (3000, 3000);
        assert!(config.validate().is_err());

        let mut config = TaskConfig::default();
        config.press_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn durations_are_bounded() {
        let mut config = TaskConfig::default();
        config.timeout_ms = u64::MAX - 100;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "timeout_ms", .. })
        ));

        let mut config = TaskConfig::default();
        config.onset_window_ms = (1000, u64::MAX);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "onset_window_ms", .. })
        ));

        let mut config = TaskConfig::default();
        config.error_feedback_ms = MAX_DURATION_MS + 1;
        assert!(config.validate().is_err());

        config.error_feedback_ms = MAX_DURATION_MS;
        config.timeout_ms = MAX_DURATION_MS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = TaskConfig::from_json_file("/nonexistent/motormap.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/motormap.json"));
    }

    #[test]
    fn layout_from_display_size() {
        let config = TaskConfig {
            pixels_per_degree: 40.0,
            ..TaskConfig::default()
        };
        let layout = ScreenLayout::new(&config, 1920, 1080).unwrap();
        assert_eq!(layout.center, (960, 540));
        assert_eq!(layout.cursor_size, 40.0);
        assert_eq!(layout.target_dist_min, 120.0);
        // half height is 13.5 deg, minus the 1 deg margin
        assert_eq!(layout.target_dist_max, 500.0);
        assert_eq!(layout.lower_middle, (960, 810));
        assert_eq!(layout.message_anchor, (960, 432));
    }

    #[test]
    fn tiny_display_is_rejected() {
        let config = TaskConfig {
            pixels_per_degree: 40.0,
            ..TaskConfig::default()
        };
        assert!(ScreenLayout::new(&config, 320, 240).is_err());
    }
}
