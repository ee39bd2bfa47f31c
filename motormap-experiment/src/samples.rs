use motormap_core::AxisSample;

/// Append-only cursor trace of one trial, timed from target onset.
///
/// A sample is only kept when the cursor moved since the last kept one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleLog {
    samples: Vec<AxisSample>,
}

impl SampleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the sample was kept.
    pub fn record(&mut self, elapsed_ms: u64, x: i32, y: i32) -> bool {
        let elapsed_ms = match self.samples.last() {
            Some(last) if (last.x, last.y) == (x, y) => return false,
            Some(last) => {
                debug_assert!(elapsed_ms >= last.elapsed_ms, "sample clock went backwards");
                elapsed_ms.max(last.elapsed_ms)
            }
            None => elapsed_ms,
        };
        self.samples.push(AxisSample { elapsed_ms, x, y });
        true
    }

    pub fn samples(&self) -> &[AxisSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
