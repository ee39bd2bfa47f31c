//! gilrs gamepad backend, and the runtime choice between a real pad and the
//! mouse stand-in.

use std::mem;

use gilrs::{Axis, Button, EventType, GamepadId, Gilrs};
use log::{info, warn};
use motormap_input::{
    DeviceSource, GamepadDevice, InputSource, PointerSource, RawInput, AXIS_MAX, TRIGGER_MAX,
};

/// gilrs axis value in `[-1, 1]` to the raw stick range.
fn axis_to_raw(value: f32) -> i32 {
    (f64::from(value.clamp(-1.0, 1.0)) * AXIS_MAX as f64).round() as i32
}

/// gilrs trigger value in `[0, 1]` to the raw trigger range.
fn trigger_to_raw(value: f32) -> u32 {
    (f64::from(value.clamp(0.0, 1.0)) * TRIGGER_MAX as f64).round() as u32
}

/// The first gamepad gilrs found at startup.
pub struct GilrsPad {
    gilrs: Gilrs,
    id: GamepadId,
    button_pressed: bool,
}

impl GilrsPad {
    pub fn first_connected() -> Option<Self> {
        let gilrs = match Gilrs::new() {
            Ok(gilrs) => gilrs,
            Err(e) => {
                warn!("gamepad support unavailable: {e}");
                return None;
            }
        };
        let (id, name) = gilrs
            .gamepads()
            .next()
            .map(|(id, pad)| (id, pad.name().to_string()))?;
        info!("using gamepad {name}");
        Some(Self {
            gilrs,
            id,
            button_pressed: false,
        })
    }

    /// Drains pending events so the cached pad state is current.
    fn poll(&mut self) {
        while let Some(event) = self.gilrs.next_event() {
            if event.id != self.id {
                continue;
            }
            match event.event {
                EventType::ButtonPressed(..) => self.button_pressed = true,
                EventType::Disconnected => warn!("gamepad disconnected, readings held at rest"),
                EventType::Connected => info!("gamepad reconnected"),
                _ => {}
            }
        }
        self.gilrs.inc();
    }

    /// Whether any button went down since the last call.
    pub fn take_button_press(&mut self) -> bool {
        self.poll();
        mem::take(&mut self.button_pressed)
    }

    fn trigger(&self, button: Button) -> u32 {
        self.gilrs
            .connected_gamepad(self.id)
            .and_then(|pad| pad.button_data(button).map(|data| data.value()))
            .map_or(0, trigger_to_raw)
    }
}

impl GamepadDevice for GilrsPad {
    fn update(&mut self) {
        self.poll();
    }

    fn right_stick(&self) -> (i32, i32) {
        match self.gilrs.connected_gamepad(self.id) {
            // gilrs y grows upwards, screen y downwards
            Some(pad) => (
                axis_to_raw(pad.value(Axis::RightStickX)),
                axis_to_raw(-pad.value(Axis::RightStickY)),
            ),
            None => (0, 0),
        }
    }

    fn left_trigger(&self) -> u32 {
        self.trigger(Button::LeftTrigger2)
    }

    fn right_trigger(&self) -> u32 {
        self.trigger(Button::RightTrigger2)
    }
}

/// Input actually driving the session.
pub enum TaskInput {
    Gamepad(DeviceSource<GilrsPad>),
    Pointer(PointerSource),
}

impl TaskInput {
    /// A connected gamepad if there is one, else the pointer.
    pub fn detect(pointer: PointerSource) -> Self {
        match GilrsPad::first_connected() {
            Some(pad) => TaskInput::Gamepad(DeviceSource::new(pad)),
            None => {
                info!("no gamepad connected, emulating the stick with the mouse");
                TaskInput::Pointer(pointer)
            }
        }
    }

    pub fn pointer_mut(&mut self) -> Option<&mut PointerSource> {
        match self {
            TaskInput::Pointer(pointer) => Some(pointer),
            TaskInput::Gamepad(_) => None,
        }
    }

    pub fn take_button_press(&mut self) -> bool {
        match self {
            TaskInput::Gamepad(source) => source.device_mut().take_button_press(),
            TaskInput::Pointer(_) => false,
        }
    }
}

impl InputSource for TaskInput {
    fn update(&mut self) {
        match self {
            TaskInput::Gamepad(source) => source.update(),
            TaskInput::Pointer(source) => source.update(),
        }
    }

    fn sample(&mut self, trial_time_ms: u64) -> RawInput {
        match self {
            TaskInput::Gamepad(source) => source.sample(trial_time_ms),
            TaskInput::Pointer(source) => source.sample(trial_time_ms),
        }
    }

    fn reset(&mut self) {
        match self {
            TaskInput::Gamepad(source) => source.reset(),
            TaskInput::Pointer(source) => source.reset(),
        }
    }
}
