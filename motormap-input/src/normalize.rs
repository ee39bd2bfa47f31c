//! Stick and trigger normalization.
//!
//! Sticks use a radial deadzone: below the deadzone the output is exactly
//! zero, above it the usable range is stretched back onto `[0, 1]` so the
//! cursor leaves the centre continuously and full deflection lands on the
//! unit circle. The stick angle goes through the same geometry helpers as
//! target placement so both share one angle convention.

use motormap_core::geometry::{vector_angle, vector_to_pos};

/// Largest stick magnitude a device reports on one axis.
pub const AXIS_MAX: i32 = 32768;
/// Largest raw trigger value.
pub const TRIGGER_MAX: u32 = 32767;
pub const DEFAULT_DEADZONE: f64 = 0.2;

/// One frame of raw device readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawInput {
    pub stick_x: i32,
    pub stick_y: i32,
    pub left_trigger: u32,
    pub right_trigger: u32,
}

/// Stick position on the unit disc plus trigger pressures in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedInput {
    pub x: f64,
    pub y: f64,
    pub left: f64,
    pub right: f64,
}

impl NormalizedInput {
    pub fn from_raw(raw: &RawInput, deadzone: f64) -> Self {
        let (x, y) = normalize_stick(raw.stick_x, raw.stick_y, deadzone);
        Self {
            x,
            y,
            left: normalize_trigger(raw.left_trigger),
            right: normalize_trigger(raw.right_trigger),
        }
    }

    pub fn magnitude(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Both triggers below `threshold`.
    pub fn triggers_released(&self, threshold: f64) -> bool {
        self.left < threshold && self.right < threshold
    }

    /// Either trigger beyond `threshold`.
    pub fn trigger_pressed(&self, threshold: f64) -> bool {
        self.left > threshold || self.right > threshold
    }
}

pub fn normalize_stick(x: i32, y: i32, deadzone: f64) -> (f64, f64) {
    let (xf, yf) = (x as f64, y as f64);
    let amplitude = (xf.hypot(yf) / AXIS_MAX as f64).min(1.0);
    if amplitude < deadzone {
        return (0.0, 0.0);
    }

    let angle = vector_angle((0.0, 0.0), (xf, yf));
    let rescaled = (amplitude - deadzone) / (1.0 - deadzone);
    vector_to_pos((0.0, 0.0), rescaled, angle)
}

pub fn normalize_trigger(raw: u32) -> f64 {
    (raw as f64 / TRIGGER_MAX as f64).min(1.0)
}
