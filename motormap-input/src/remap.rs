use motormap_core::Mapping;

use crate::normalize::NormalizedInput;

/// Turns a normalized stick position into a screen cursor position under a
/// block's [`Mapping`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRemapper {
    center: (i32, i32),
    target_dist_max: f64,
    modifiers: (f64, f64),
}

impl AxisRemapper {
    pub fn new(center: (i32, i32), target_dist_max: f64, mapping: Mapping) -> Self {
        Self {
            center,
            target_dist_max,
            modifiers: mapping.modifiers(),
        }
    }

    /// Offsets are truncated towards zero to whole pixels.
    pub fn cursor_offset(&self, input: &NormalizedInput) -> (i32, i32) {
        let (mod_x, mod_y) = self.modifiers;
        (
            (input.x * self.target_dist_max * mod_x) as i32,
            (input.y * self.target_dist_max * mod_y) as i32,
        )
    }

    pub fn cursor_position(&self, input: &NormalizedInput) -> (i32, i32) {
        let (dx, dy) = self.cursor_offset(input);
        (self.center.0 + dx, self.center.1 + dy)
    }
}
