pub mod normalize;
pub mod remap;
pub mod source;

pub use normalize::{NormalizedInput, RawInput, AXIS_MAX, DEFAULT_DEADZONE, TRIGGER_MAX};
pub use remap::AxisRemapper;
pub use source::{DeviceSource, GamepadDevice, InputSource, PointerSource, CLICK_GUARD_MS};
