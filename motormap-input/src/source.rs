//! Where raw per-frame readings come from.
//!
//! A connected gamepad is wrapped in a [`DeviceSource`]; without one the
//! mouse stands in through [`PointerSource`]. Both hand the trial loop the
//! same [`RawInput`] snapshot, so everything downstream is source-agnostic.

use crate::normalize::{RawInput, AXIS_MAX, TRIGGER_MAX};

/// Per-frame supplier of raw stick and trigger readings.
pub trait InputSource {
    /// Refresh device state. Called once per frame before [`sample`](Self::sample).
    fn update(&mut self) {}

    /// Current readings; `trial_time_ms` is the elapsed time of the running trial.
    fn sample(&mut self, trial_time_ms: u64) -> RawInput;

    /// Return to the resting state at the start of a trial.
    fn reset(&mut self) {}
}

/// The handful of gamepad readings the task uses. Implemented by the harness
/// for whatever controller backend it initialised.
pub trait GamepadDevice {
    fn update(&mut self);
    fn right_stick(&self) -> (i32, i32);
    fn left_trigger(&self) -> u32;
    fn right_trigger(&self) -> u32;
}

impl<D: GamepadDevice + ?Sized> GamepadDevice for &mut D {
    fn update(&mut self) {
        (**self).update()
    }
    fn right_stick(&self) -> (i32, i32) {
        (**self).right_stick()
    }
    fn left_trigger(&self) -> u32 {
        (**self).left_trigger()
    }
    fn right_trigger(&self) -> u32 {
        (**self).right_trigger()
    }
}

pub struct DeviceSource<D: GamepadDevice> {
    device: D,
}

impl<D: GamepadDevice> DeviceSource<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: GamepadDevice> InputSource for DeviceSource<D> {
    fn update(&mut self) {
        self.device.update();
    }

    fn sample(&mut self, _trial_time_ms: u64) -> RawInput {
        let (stick_x, stick_y) = self.device.right_stick();
        RawInput {
            stick_x,
            stick_y,
            left_trigger: self.device.left_trigger(),
            right_trigger: self.device.right_trigger(),
        }
    }
}

/// Default time after trial start during which a held button is ignored, so
/// the click that started the trial is not read as a response.
pub const CLICK_GUARD_MS: u64 = 100;

/// Emulates the stick with pointer displacement from the screen centre and
/// both triggers with the pointer button.
#[derive(Debug, Clone)]
pub struct PointerSource {
    center: (f64, f64),
    scale: f64,
    click_guard_ms: u64,
    position: (f64, f64),
    pressed: bool,
}

impl PointerSource {
    /// `target_dist_max` is the cursor travel (px) that full deflection maps to.
    pub fn new(center: (f64, f64), target_dist_max: f64) -> Self {
        Self {
            center,
            scale: AXIS_MAX as f64 / target_dist_max,
            click_guard_ms: CLICK_GUARD_MS,
            position: center,
            pressed: false,
        }
    }

    pub fn with_click_guard(mut self, ms: u64) -> Self {
        self.click_guard_ms = ms;
        self
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.position = (x, y);
    }

    pub fn set_pressed(&mut self, pressed: bool) {
        self.pressed = pressed;
    }

    /// Warps the emulated stick back to rest, as at the start of each trial.
    pub fn recenter(&mut self) {
        self.position = self.center;
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }
}

impl InputSource for PointerSource {
    fn sample(&mut self, trial_time_ms: u64) -> RawInput {
        let stick_x = ((self.position.0 - self.center.0) * self.scale) as i32;
        let stick_y = ((self.position.1 - self.center.1) * self.scale) as i32;
        let (left_trigger, right_trigger) = if self.pressed && trial_time_ms > self.click_guard_ms {
            (TRIGGER_MAX, TRIGGER_MAX)
        } else {
            (0, 0)
        };
        RawInput {
            stick_x,
            stick_y,
            left_trigger,
            right_trigger,
        }
    }

    fn reset(&mut self) {
        self.recenter();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakePad {
        updates: usize,
        stick: (i32, i32),
        triggers: (u32, u32),
    }

    impl GamepadDevice for FakePad {
        fn update(&mut self) {
            self.updates += 1;
        }
        fn right_stick(&self) -> (i32, i32) {
            self.stick
        }
        fn left_trigger(&self) -> u32 {
            self.triggers.0
        }
        fn right_trigger(&self) -> u32 {
            self.triggers.1
        }
    }

    #[test]
    fn device_source_polls_a_borrowed_device() {
        let mut pad = FakePad {
            updates: 0,
            stick: (1200, -32768),
            triggers: (0, 30000),
        };
        {
            let mut source = DeviceSource::new(&mut pad);
            source.update();
            let raw = source.sample(0);
            assert_eq!((raw.stick_x, raw.stick_y), (1200, -32768));
            assert_eq!(raw.right_trigger, 30000);
            source.device_mut().triggers = (0, 0);
            assert_eq!(source.sample(16).right_trigger, 0);
        }
        assert_eq!(pad.updates, 1);
    }

    #[test]
    fn pointer_displacement_scales_to_axis_range() {
        let mut source = PointerSource::new((640.0, 360.0), 320.0);
        source.set_position(960.0, 360.0);
        let raw = source.sample(500);
        assert_eq!(raw.stick_x, AXIS_MAX);
        assert_eq!(raw.stick_y, 0);

        source.set_position(640.0, 200.0);
        assert_eq!(source.sample(500).stick_y, -AXIS_MAX / 2);

        source.recenter();
        assert_eq!(source.sample(500), RawInput::default());
    }

    #[test]
    fn starting_click_is_ignored() {
        let mut source = PointerSource::new((0.0, 0.0), 100.0);
        source.set_pressed(true);
        assert_eq!(source.sample(40).left_trigger, 0);
        assert_eq!(source.sample(100).right_trigger, 0);
        let raw = source.sample(101);
        assert_eq!((raw.left_trigger, raw.right_trigger), (TRIGGER_MAX, TRIGGER_MAX));

        let mut unguarded = PointerSource::new((0.0, 0.0), 100.0).with_click_guard(0);
        unguarded.set_pressed(true);
        assert_eq!(unguarded.sample(1).left_trigger, TRIGGER_MAX);
    }
}
