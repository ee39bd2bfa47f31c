use motormap_core::geometry::vector_to_pos;
use motormap_timing::{EventScheduler, SchedulerError, Timer};
use rand::Rng;

use super::config::{ScreenLayout, TaskConfig};

pub const TARGET_ON: &str = "target_on";
pub const TIMEOUT: &str = "timeout";

/// Randomly drawn parameters of one trial attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialFactors {
    /// Target distance from centre, whole pixels.
    pub target_dist: u32,
    /// Target direction, 0° up and clockwise.
    pub target_angle: u32,
    pub target_loc: (i32, i32),
    /// Delay from trial start to target onset.
    pub target_onset_ms: u64,
    /// Delay from trial start to the hard timeout.
    pub timeout_ms: u64,
}

impl TrialFactors {
    pub fn draw<R: Rng>(rng: &mut R, layout: &ScreenLayout, config: &TaskConfig) -> Self {
        let target_dist =
            rng.random_range(layout.target_dist_min as u32..layout.target_dist_max as u32);
        let target_angle = rng.random_range(0..360u32);
        let (x, y) = vector_to_pos(layout.center_f64(), target_dist as f64, target_angle as f64);

        let (start, end) = config.onset_window_ms;
        let steps = (end - start).div_ceil(config.onset_step_ms);
        let target_onset_ms = start + config.onset_step_ms * rng.random_range(0..steps);

        Self {
            target_dist,
            target_angle,
            target_loc: (x.round() as i32, y.round() as i32),
            target_onset_ms,
            timeout_ms: target_onset_ms + config.timeout_ms,
        }
    }

    /// Registers the onset and timeout tickets for this attempt.
    pub fn register<T: Timer>(&self, evm: &mut EventScheduler<T>) -> Result<(), SchedulerError> {
        evm.register(TARGET_ON, self.target_onset_ms)?;
        evm.register(TIMEOUT, self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_DURATION_MS;
    use motormap_core::geometry::linear_distance;
    use motormap_timing::ManualTimer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> (TaskConfig, ScreenLayout) {
        let config = TaskConfig {
            pixels_per_degree: 40.0,
            ..TaskConfig::default()
        };
        let layout = ScreenLayout::new(&config, 1920, 1080).unwrap();
        (config, layout)
    }

    #[test]
    fn factors_stay_inside_their_ranges() {
        let (config, layout) = setup();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let f = TrialFactors::draw(&mut rng, &layout, &config);
            assert!((120..500).contains(&f.target_dist));
            assert!(f.target_angle < 360);
            assert!((1000..3000).contains(&f.target_onset_ms));
            assert_eq!(f.target_onset_ms % 100, 0);
            assert_eq!(f.timeout_ms, f.target_onset_ms + 15_000);
            let loc = (f.target_loc.0 as f64, f.target_loc.1 as f64);
            let d = linear_distance(layout.center_f64(), loc);
            assert!((d - f.target_dist as f64).abs() <= 1.0);
        }
    }

    #[test]
    fn registers_both_tickets() {
        let (config, layout) = setup();
        let mut rng = StdRng::seed_from_u64(1);
        let f = TrialFactors::draw(&mut rng, &layout, &config);
        let mut evm = EventScheduler::new(ManualTimer::new());
        f.register(&mut evm).unwrap();
        assert_eq!(evm.ticket(TARGET_ON).unwrap().fire_time_ms, f.target_onset_ms);
        assert_eq!(evm.ticket(TIMEOUT).unwrap().fire_time_ms, f.timeout_ms);
    }

    #[test]
    fn longest_allowed_timings_still_schedule() {
        let (mut config, layout) = setup();
        config.onset_window_ms = (MAX_DURATION_MS - 1000, MAX_DURATION_MS);
        config.timeout_ms = MAX_DURATION_MS;
        config.validate().unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let f = TrialFactors::draw(&mut rng, &layout, &config);
        assert_eq!(f.timeout_ms, f.target_onset_ms + MAX_DURATION_MS);

        let timer = ManualTimer::new();
        let mut evm = EventScheduler::new(timer.clone());
        f.register(&mut evm).unwrap();
        evm.start_trial();
        timer.advance_ms(MAX_DURATION_MS);
        assert!(evm.before(TIMEOUT).unwrap());
    }
}
