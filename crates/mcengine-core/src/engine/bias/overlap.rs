use crate::core::models::ids::MoveId;
use crate::core::utils::spline::AkimaSpline;
use crate::engine::config::{ConfigError, OverlapConfig};
use crate::engine::events::{TrialEvent, TrialEventKind, TrialListener};
use crate::engine::moves::biased::BiasedInsertDeleteMove;
use tracing::{debug, trace, warn};

/// Weighted overlap sums collected at one particle number.
#[derive(Debug, Clone)]
struct OverlapBin {
    sum_insert: Vec<f64>,
    sum_delete: Vec<f64>,
    num_insert: u64,
    num_delete: u64,
    num_failed: u64,
}

impl OverlapBin {
    fn new(grid_len: usize) -> Self {
        Self {
            sum_insert: vec![0.0; grid_len],
            sum_delete: vec![0.0; grid_len],
            num_insert: 0,
            num_delete: 0,
            num_failed: 0,
        }
    }
}

/// Overlap-sampling estimator of the free-energy ratio between adjacent
/// particle numbers.
///
/// For every insertion or deletion initiated by the target move, the estimator
/// strips the current bias from the trial's acceptance weight and accumulates
/// Bennett-style overlap functions over a log-spaced grid of trial parameters
/// `alpha`. The ratio for `(N, N+1)` is the `alpha` at which the insertion
/// average from `N` matches `alpha` times the deletion average from `N+1`.
///
/// The weights are taken relative to the nominal `mu / T` bias, so the ratio
/// estimates `Q(N+1)/Q(N)` of the grand-canonical ensemble: for an ideal gas it
/// is `V/(N+1) exp(mu/T)`.
#[derive(Debug, Clone)]
pub struct OverlapListener {
    target: MoveId,
    alpha: Vec<f64>,
    ln_alpha: Vec<f64>,
    bins: Vec<OverlapBin>,
    num_dropped: u64,
}

impl OverlapListener {
    pub fn new(target: MoveId, config: &OverlapConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let alpha = config.alpha_grid();
        let ln_alpha = alpha.iter().map(|a| a.ln()).collect();
        Ok(Self {
            target,
            alpha,
            ln_alpha,
            bins: Vec::new(),
            num_dropped: 0,
        })
    }

    pub fn target(&self) -> MoveId {
        self.target
    }

    pub fn alpha_grid(&self) -> &[f64] {
        &self.alpha
    }

    fn ensure_bin(&mut self, n: usize) {
        if self.bins.len() <= n {
            let grid_len = self.alpha.len();
            self.bins.resize_with(n + 1, || OverlapBin::new(grid_len));
        }
    }

    /// Accumulates one trial started at particle number `n` with unbiased weight `x`.
    ///
    /// NaN weights carry no information and are dropped.
    pub fn record_trial(&mut self, insertion: bool, n: usize, x: f64) {
        if x.is_nan() {
            self.num_dropped += 1;
            if self.num_dropped == 1 {
                warn!(
                    n,
                    insertion,
                    "Dropping overlap sample with NaN weight (repeats are logged at debug level)"
                );
            } else {
                debug!(n, insertion, dropped = self.num_dropped, "Dropping overlap sample with NaN weight");
            }
            return;
        }
        self.ensure_bin(n);
        let bin = &mut self.bins[n];
        if insertion {
            bin.num_insert += 1;
            for (sum, a) in bin.sum_insert.iter_mut().zip(&self.alpha) {
                *sum += 1.0 / (1.0 + a / x);
            }
        } else {
            bin.num_delete += 1;
            for (sum, a) in bin.sum_delete.iter_mut().zip(&self.alpha) {
                *sum += 1.0 / (a + 1.0 / x);
            }
        }
    }

    pub fn record_failure(&mut self, n: usize) {
        self.ensure_bin(n);
        self.bins[n].num_failed += 1;
    }

    /// Samples discarded for a NaN weight since the last reset.
    pub fn num_dropped(&self) -> u64 {
        self.num_dropped
    }

    pub fn num_insert(&self, n: usize) -> u64 {
        self.bins.get(n).map_or(0, |bin| bin.num_insert)
    }

    pub fn num_delete(&self, n: usize) -> u64 {
        self.bins.get(n).map_or(0, |bin| bin.num_delete)
    }

    pub fn num_failed(&self, n: usize) -> u64 {
        self.bins.get(n).map_or(0, |bin| bin.num_failed)
    }

    /// Number of particle-number bins seen so far.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn reset(&mut self) {
        self.bins.clear();
        self.num_dropped = 0;
    }

    /// `y(alpha_i) = -ln[(<ins>_N / <del>_{N+1}) / alpha_i]`, or `None` without samples.
    fn y_values(&self, n: usize) -> Option<Vec<f64>> {
        let lower = self.bins.get(n)?;
        let upper = self.bins.get(n + 1)?;
        if lower.num_insert == 0 || upper.num_delete == 0 {
            return None;
        }
        let (ni, nd) = (lower.num_insert as f64, upper.num_delete as f64);
        Some(
            self.alpha
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    let ratio = (lower.sum_insert[i] / ni) / (upper.sum_delete[i] / nd);
                    -(ratio / a).ln()
                })
                .collect(),
        )
    }

    /// Estimated ratio between particle numbers `n + 1` and `n`.
    ///
    /// Returns the grid boundary when the root lies outside the grid, and NaN
    /// when either side has no samples or the estimate carries no information.
    pub fn ratio(&self, n: usize) -> f64 {
        let Some(y) = self.y_values(n) else {
            return f64::NAN;
        };
        let ratio = self.root(&y);
        trace!(n, ratio, "Overlap ratio estimate");
        ratio
    }

    /// `ratio(n)` for every `n` that can have samples on both sides.
    pub fn ratios(&self) -> Vec<f64> {
        (0..self.bins.len().saturating_sub(1))
            .map(|n| self.ratio(n))
            .collect()
    }

    fn root(&self, y: &[f64]) -> f64 {
        let last = y.len() - 1;
        if y.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        if y[0] > 0.0 {
            return if y[0].is_infinite() {
                f64::NAN
            } else {
                self.alpha[0]
            };
        }
        if y[last] < 0.0 {
            return if y[last].is_infinite() {
                f64::NAN
            } else {
                self.alpha[last]
            };
        }

        let Some(j) = (0..last).find(|&i| y[i] <= 0.0 && y[i + 1] >= 0.0) else {
            return f64::NAN;
        };
        if y[j] == 0.0 {
            return self.alpha[j];
        }
        if !(y[j].is_finite() && y[j + 1].is_finite()) {
            return f64::NAN;
        }

        let mut lo = j;
        while lo > 0 && y[lo - 1].is_finite() && y[lo - 1] < y[lo] {
            lo -= 1;
        }
        let mut hi = j + 1;
        while hi < last && y[hi + 1].is_finite() && y[hi + 1] > y[hi] {
            hi += 1;
        }

        match AkimaSpline::new(&y[lo..=hi], &self.ln_alpha[lo..=hi]) {
            Ok(spline) => spline.evaluate(0.0).exp(),
            Err(e) => {
                warn!(error = %e, "Overlap root interpolation failed");
                f64::NAN
            }
        }
    }
}

impl TrialListener for OverlapListener {
    fn on_trial(&mut self, event: &TrialEvent<'_>) {
        if event.move_id != self.target {
            return;
        }
        let Some(mv) = event.mcmove.as_any().downcast_ref::<BiasedInsertDeleteMove>() else {
            return;
        };
        match event.kind {
            TrialEventKind::Initiated { a, b } => {
                let x = a
                    * (-mv.ln_bias_diff() + mv.nominal_ln_bias_diff() + b / event.temperature)
                        .exp();
                self.record_trial(mv.is_insertion(), mv.particles_before(), x);
            }
            TrialEventKind::Failed => self.record_failure(mv.particles_before()),
            TrialEventKind::Completed { .. } => {}
        }
    }
}
