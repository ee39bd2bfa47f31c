use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock used by the trial loop.
///
/// Timestamps are nanoseconds since the timer's own epoch.
pub trait Timer: Clone + Send + Sync {
    fn now(&self) -> u64;
    fn record_frame(&mut self, d: Duration);
    fn calibration_stats(&self) -> CalibrationStats;

    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationStats {
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
    pub frame_count: usize,
}

impl CalibrationStats {
    pub fn from_frames<'a>(frames: impl IntoIterator<Item = &'a Duration>) -> Self {
        let times: Vec<f64> = frames.into_iter().map(|d| d.as_nanos() as f64).collect();
        if times.is_empty() {
            return CalibrationStats {
                average_frame_time_ns: 0.0,
                jitter_ns: 0.0,
                min_frame_time_ns: 0.0,
                max_frame_time_ns: 0.0,
                effective_fps: 0.0,
                frame_count: 0,
            };
        }
        let n = times.len() as f64;
        let avg = times.iter().sum::<f64>() / n;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        CalibrationStats {
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
            frame_count: times.len(),
        }
    }
}

const MAX_FRAME_SAMPLES: usize = 1000;

/// Wall-clock timer backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
    pub frame_times: VecDeque<Duration>,
    pub max_samples: usize,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn record_frame(&mut self, d: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(d);
    }
    fn calibration_stats(&self) -> CalibrationStats {
        CalibrationStats::from_frames(&self.frame_times)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_times: VecDeque::with_capacity(MAX_FRAME_SAMPLES),
            max_samples: MAX_FRAME_SAMPLES,
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Hand-driven clock for replays and tests. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
    frame_times: Vec<Duration>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    pub fn set_ns(&self, ns: u64) {
        self.now_ns.store(ns, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn record_frame(&mut self, d: Duration) {
        self.frame_times.push(d);
    }
    fn calibration_stats(&self) -> CalibrationStats {
        CalibrationStats::from_frames(&self.frame_times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_clones_share_the_clock() {
        let timer = ManualTimer::new();
        let view = timer.clone();
        timer.advance_ms(16);
        assert_eq!(view.now(), 16_000_000);
        view.advance_ms(4);
        assert_eq!(timer.now(), 20_000_000);
        assert_eq!(timer.elapsed(5_000_000), Duration::from_millis(15));
    }

    #[test]
    fn calibration_stats_over_frames() {
        let mut timer = ManualTimer::new();
        for ms in [16u64, 17, 16, 17] {
            timer.record_frame(Duration::from_millis(ms));
        }
        let stats = timer.calibration_stats();
        assert_eq!(stats.frame_count, 4);
        assert!((stats.average_frame_time_ns - 16_500_000.0).abs() < 1e-6);
        assert!((stats.jitter_ns - 500_000.0).abs() < 1e-6);
        assert_eq!(stats.min_frame_time_ns, 16_000_000.0);
        assert_eq!(stats.max_frame_time_ns, 17_000_000.0);
        assert!((stats.effective_fps - 1e9 / 16_500_000.0).abs() < 1e-9);
    }

    #[test]
    fn empty_stats_are_zero() {
        let stats = HighPrecisionTimer::new().calibration_stats();
        assert_eq!(stats.frame_count, 0);
        assert_eq!(stats.effective_fps, 0.0);
    }

    #[test]
    fn frame_buffer_is_bounded() {
        let mut timer = HighPrecisionTimer::new();
        timer.max_samples = 3;
        for ms in 1..=5 {
            timer.record_frame(Duration::from_millis(ms));
        }
        assert_eq!(timer.frame_times.len(), 3);
        assert_eq!(timer.frame_times[0], Duration::from_millis(3));
    }
}
