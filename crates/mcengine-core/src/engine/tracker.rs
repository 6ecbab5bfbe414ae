use super::config::{ConfigError, StepSizeConfig};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdjustDirection {
    Down,
    #[default]
    None,
    Up,
}

/// Damped multiplicative controller that steers a move's step size toward a
/// target acceptance ratio.
///
/// Every `adjust_interval` recorded trials the observed acceptance ratio of that
/// interval is compared with the target and the step size is scaled by
/// `1 ± adjust_step`. When the direction flips relative to the previous
/// adjustment, `adjust_step` is halved and `adjust_interval` doubled, so the
/// controller settles instead of oscillating. The step size never leaves
/// `[min, max]`.
#[derive(Debug, Clone)]
pub struct StepSizeController {
    step_size: f64,
    min: f64,
    max: f64,
    adjust_interval: u64,
    adjust_step: f64,
    min_adjust_step: f64,
    acceptance_target: f64,
    last_direction: AdjustDirection,
    tunable: bool,
    interval_trials: u64,
    interval_accepted: u64,
}

impl StepSizeController {
    pub fn new(config: &StepSizeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            step_size: config.initial,
            min: config.min,
            max: config.max,
            adjust_interval: config.adjust_interval,
            adjust_step: config.adjust_step,
            min_adjust_step: config.min_adjust_step,
            acceptance_target: config.acceptance_target,
            last_direction: AdjustDirection::None,
            tunable: config.tunable,
            interval_trials: 0,
            interval_accepted: 0,
        })
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Sets the step size, clamped to the controller's bounds.
    pub fn set_step_size(&mut self, step_size: f64) {
        self.step_size = step_size.clamp(self.min, self.max);
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn adjust_interval(&self) -> u64 {
        self.adjust_interval
    }

    pub fn adjust_step(&self) -> f64 {
        self.adjust_step
    }

    pub fn acceptance_target(&self) -> f64 {
        self.acceptance_target
    }

    pub fn last_direction(&self) -> AdjustDirection {
        self.last_direction
    }

    pub fn is_tunable(&self) -> bool {
        self.tunable
    }

    /// Enables or freezes tuning. Partial interval statistics are discarded.
    pub fn set_tunable(&mut self, tunable: bool) {
        self.tunable = tunable;
        self.interval_trials = 0;
        self.interval_accepted = 0;
    }

    /// Records one resolved trial.
    ///
    /// # Return
    ///
    /// The new step size if this trial completed an adjustment interval.
    pub fn record(&mut self, accepted: bool) -> Option<f64> {
        if !self.tunable {
            return None;
        }
        self.interval_trials += 1;
        if accepted {
            self.interval_accepted += 1;
        }
        if self.interval_trials < self.adjust_interval {
            return None;
        }
        self.adjust();
        Some(self.step_size)
    }

    fn adjust(&mut self) {
        let ratio = self.interval_accepted as f64 / self.interval_trials as f64;

        let direction = if ratio > self.acceptance_target {
            if self.step_size < self.max {
                self.step_size *= 1.0 + self.adjust_step;
                AdjustDirection::Up
            } else {
                AdjustDirection::None
            }
        } else if self.step_size > self.min {
            self.step_size *= 1.0 - self.adjust_step;
            AdjustDirection::Down
        } else {
            AdjustDirection::None
        };

        if direction != AdjustDirection::None {
            if self.last_direction != AdjustDirection::None && direction != self.last_direction {
                self.adjust_step *= 0.5;
                self.adjust_interval *= 2;
            }
            self.last_direction = direction;
        }

        self.step_size = self.step_size.clamp(self.min, self.max);
        self.interval_trials = 0;
        self.interval_accepted = 0;

        debug!(
            ratio,
            step_size = self.step_size,
            adjust_step = self.adjust_step,
            adjust_interval = self.adjust_interval,
            "Adjusted step size"
        );

        if self.min_adjust_step > 0.0 && self.adjust_step < self.min_adjust_step {
            self.tunable = false;
            debug!(
                step_size = self.step_size,
                "Step size tuning converged; freezing step size"
            );
        }
    }
}

/// Per-move trial statistics, optionally owning a step-size controller.
#[derive(Debug, Clone, Default)]
pub struct AcceptanceTracker {
    n_trials: u64,
    n_accept: u64,
    chi_sum: f64,
    step: Option<StepSizeController>,
}

impl AcceptanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step_size(config: &StepSizeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            step: Some(StepSizeController::new(config)?),
            ..Self::default()
        })
    }

    /// Records the resolution of one trial.
    ///
    /// # Arguments
    ///
    /// * `accepted` - Whether the Metropolis test accepted the trial.
    /// * `chi` - The acceptance probability used for the test.
    pub fn update_counts(&mut self, accepted: bool, chi: f64) {
        self.n_trials += 1;
        if accepted {
            self.n_accept += 1;
        }
        self.chi_sum += chi;
        if let Some(step) = &mut self.step {
            step.record(accepted);
        }
    }

    pub fn n_trials(&self) -> u64 {
        self.n_trials
    }

    pub fn n_accept(&self) -> u64 {
        self.n_accept
    }

    pub fn chi_sum(&self) -> f64 {
        self.chi_sum
    }

    /// Fraction of accepted trials, or `None` before the first trial.
    pub fn acceptance_ratio(&self) -> Option<f64> {
        (self.n_trials > 0).then(|| self.n_accept as f64 / self.n_trials as f64)
    }

    /// Mean acceptance probability, or `None` before the first trial.
    pub fn mean_chi(&self) -> Option<f64> {
        (self.n_trials > 0).then(|| self.chi_sum / self.n_trials as f64)
    }

    /// Clears the counters. The step-size controller keeps its state.
    pub fn reset(&mut self) {
        self.n_trials = 0;
        self.n_accept = 0;
        self.chi_sum = 0.0;
    }

    pub fn step_controller(&self) -> Option<&StepSizeController> {
        self.step.as_ref()
    }

    pub fn step_controller_mut(&mut self) -> Option<&mut StepSizeController> {
        self.step.as_mut()
    }

    pub fn step_size(&self) -> Option<f64> {
        self.step.as_ref().map(StepSizeController::step_size)
    }

    pub fn set_tunable(&mut self, tunable: bool) {
        if let Some(step) = &mut self.step {
            step.set_tunable(tunable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(initial: f64, min: f64, max: f64) -> StepSizeController {
        StepSizeController::new(&StepSizeConfig::bounded(initial, min, max)).unwrap()
    }

    /// Feeds `count` trials whose acceptance pattern has exactly `accepted_per_10` out of ten.
    fn feed(tracker: &mut AcceptanceTracker, count: usize, accepted_per_10: usize) {
        for i in 0..count {
            tracker.update_counts(i % 10 < accepted_per_10, 0.5);
        }
    }

    mod step_size_controller {
        use super::*;

        #[test]
        fn high_acceptance_strictly_increases_step_size() {
            let mut tracker =
                AcceptanceTracker::with_step_size(&StepSizeConfig::bounded(1.0, 0.0, 15.0))
                    .unwrap();
            feed(&mut tracker, 150, 8);
            let step = tracker.step_size().unwrap();
            assert!(step > 1.0);
            assert!(step <= 15.0);
        }

        #[test]
        fn low_acceptance_strictly_decreases_step_size() {
            let mut tracker =
                AcceptanceTracker::with_step_size(&StepSizeConfig::bounded(1.0, 0.0, 15.0))
                    .unwrap();
            feed(&mut tracker, 150, 2);
            let step = tracker.step_size().unwrap();
            assert!(step < 1.0);
            assert!(step >= 0.0);
        }

        #[test]
        fn step_size_never_leaves_bounds() {
            let mut ctrl = controller(1.0, 0.0, 15.0);
            for _ in 0..100_000 {
                ctrl.record(true);
                assert!(ctrl.step_size() <= 15.0);
            }
            assert_eq!(ctrl.step_size(), 15.0);

            let mut ctrl = controller(1.0, 0.5, 15.0);
            for _ in 0..100_000 {
                ctrl.record(false);
                assert!(ctrl.step_size() >= 0.5);
            }
            assert_eq!(ctrl.step_size(), 0.5);
        }

        #[test]
        fn direction_flip_halves_step_and_doubles_interval() {
            let mut ctrl = controller(1.0, 0.0, 15.0);
            for _ in 0..100 {
                ctrl.record(true);
            }
            assert_eq!(ctrl.last_direction(), AdjustDirection::Up);
            assert_eq!(ctrl.adjust_interval(), 100);

            for _ in 0..100 {
                ctrl.record(false);
            }
            assert_eq!(ctrl.last_direction(), AdjustDirection::Down);
            assert_eq!(ctrl.adjust_interval(), 200);
            assert!((ctrl.adjust_step() - 0.025).abs() < 1e-15);
        }

        #[test]
        fn frozen_controller_ignores_trials() {
            let mut ctrl = controller(1.0, 0.0, 15.0);
            ctrl.set_tunable(false);
            for _ in 0..1000 {
                assert_eq!(ctrl.record(true), None);
            }
            assert_eq!(ctrl.step_size(), 1.0);
        }

        #[test]
        fn tuning_stops_once_adjust_step_falls_below_minimum() {
            let config = StepSizeConfig {
                adjust_interval: 10,
                min_adjust_step: 0.02,
                ..StepSizeConfig::bounded(1.0, 0.0, 15.0)
            };
            let mut ctrl = StepSizeController::new(&config).unwrap();
            for _ in 0..10 {
                ctrl.record(true);
            }
            for _ in 0..20 {
                ctrl.record(false);
            }
            assert!(ctrl.is_tunable());
            for _ in 0..40 {
                ctrl.record(true);
            }
            assert!(!ctrl.is_tunable());
            let frozen = ctrl.step_size();
            for _ in 0..1000 {
                ctrl.record(true);
            }
            assert_eq!(ctrl.step_size(), frozen);
        }
    }

    mod acceptance_tracker {
        use super::*;

        #[test]
        fn counts_trials_accepts_and_chi() {
            let mut tracker = AcceptanceTracker::new();
            tracker.update_counts(true, 1.0);
            tracker.update_counts(false, 0.25);
            tracker.update_counts(false, 0.0);
            assert_eq!(tracker.n_trials(), 3);
            assert_eq!(tracker.n_accept(), 1);
            assert!((tracker.chi_sum() - 1.25).abs() < 1e-15);
            assert!((tracker.acceptance_ratio().unwrap() - 1.0 / 3.0).abs() < 1e-15);
        }

        #[test]
        fn ratios_are_none_before_first_trial() {
            let tracker = AcceptanceTracker::new();
            assert_eq!(tracker.acceptance_ratio(), None);
            assert_eq!(tracker.mean_chi(), None);
            assert_eq!(tracker.step_size(), None);
        }

        #[test]
        fn reset_clears_counters_but_keeps_step_size() {
            let mut tracker =
                AcceptanceTracker::with_step_size(&StepSizeConfig::bounded(1.0, 0.0, 15.0))
                    .unwrap();
            feed(&mut tracker, 100, 9);
            let step = tracker.step_size().unwrap();
            tracker.reset();
            assert_eq!(tracker.n_trials(), 0);
            assert_eq!(tracker.chi_sum(), 0.0);
            assert_eq!(tracker.step_size(), Some(step));
        }
    }
}
