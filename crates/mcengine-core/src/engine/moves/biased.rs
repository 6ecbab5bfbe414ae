use super::insert_delete::{Direction, ExchangeTrial};
use super::{Commit, Move, TrialState, box_len};
use crate::core::models::ids::BoxId;
use crate::core::models::system::System;
use crate::engine::SimRng;
use crate::engine::bias::table::BiasTable;
use crate::engine::config::ParticleWindow;
use crate::engine::error::EngineError;
use crate::engine::tracker::AcceptanceTracker;
use std::any::Any;
use tracing::trace;

const NAME: &str = "biased-insert-delete";

/// Insertion/deletion move that samples a particle-number window under a
/// per-particle-number bias.
///
/// The acceptance factors are `A = A_gc * exp(ln_bias[N'] - ln_bias[N])`, where
/// `A_gc` is the unbiased grand-canonical ratio, and `B = u_old - u_new`. The
/// chemical potential enters only through the bias table, whose unvisited entries
/// extend with slope `mu / T`.
///
/// A trial whose outcome would move the particle number further outside
/// `window` is generated and evaluated normally, but [`Move::accept_notify`]
/// restores the pre-trial state and reports [`Commit::ForcedReject`]. The
/// tracker therefore still sees the true acceptance rate of the walk.
#[derive(Debug)]
pub struct BiasedInsertDeleteMove {
    trial: ExchangeTrial,
    mu: f64,
    temperature: f64,
    window: ParticleWindow,
    table: BiasTable,
    ln_bias_diff: f64,
    tracker: AcceptanceTracker,
    state: TrialState,
}

impl BiasedInsertDeleteMove {
    pub fn new(box_id: BoxId, mu: f64, temperature: f64, window: ParticleWindow) -> Self {
        Self {
            trial: ExchangeTrial::new(box_id),
            mu,
            temperature,
            window,
            table: BiasTable::new(mu / temperature),
            ln_bias_diff: 0.0,
            tracker: AcceptanceTracker::new(),
            state: TrialState::new(),
        }
    }

    pub fn box_id(&self) -> BoxId {
        self.trial.box_id
    }

    pub fn chemical_potential(&self) -> f64 {
        self.mu
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Updates the temperature and resets the extension slope to `mu / T`.
    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
        self.table.set_slope(self.mu / temperature);
    }

    pub fn window(&self) -> ParticleWindow {
        self.window
    }

    pub fn is_insertion(&self) -> bool {
        self.trial.direction == Direction::Insert
    }

    /// Particle number before the current (or last) trial.
    pub fn particles_before(&self) -> usize {
        self.trial.n_before
    }

    pub fn particles_after(&self) -> usize {
        self.trial.n_after()
    }

    /// `ln_bias[N'] - ln_bias[N]` of the current trial.
    pub fn ln_bias_diff(&self) -> f64 {
        self.ln_bias_diff
    }

    /// The part of `ln_bias_diff` a pure `mu / T` bias would contribute:
    /// `+mu/T` for an insertion and `-mu/T` for a deletion.
    pub fn nominal_ln_bias_diff(&self) -> f64 {
        let per_particle = self.mu / self.temperature;
        match self.trial.direction {
            Direction::Insert => per_particle,
            Direction::Delete => -per_particle,
        }
    }

    pub fn ln_bias(&self, n: usize) -> f64 {
        self.table.value(n)
    }

    pub fn set_ln_bias(&mut self, n: usize, value: f64) {
        self.table.set(n, value);
    }

    pub fn bias_table(&self) -> &BiasTable {
        &self.table
    }

    pub fn bias_table_mut(&mut self) -> &mut BiasTable {
        &mut self.table
    }

    fn distance_outside(&self, n: usize) -> usize {
        if n < self.window.min_n() {
            self.window.min_n() - n
        } else {
            n.saturating_sub(self.window.max_n())
        }
    }

    /// Whether committing the trial would leave the window, or move further away
    /// from it when the walk starts outside.
    fn leaves_window(&self) -> bool {
        let after = self.trial.n_after();
        !self.window.contains(after)
            && self.distance_outside(after) > self.distance_outside(self.trial.n_before)
    }
}

impl Move for BiasedInsertDeleteMove {
    fn name(&self) -> &str {
        NAME
    }

    fn do_trial(&mut self, system: &mut System, rng: &mut SimRng) -> Result<bool, EngineError> {
        self.state.begin(NAME)?;
        let proposed = self.trial.propose(&mut self.state, system, rng);
        let proposed = self.state.settle(proposed)?;
        if proposed {
            self.table.ensure(self.trial.n_before + 1);
            self.ln_bias_diff = self.table.diff(self.trial.n_before, self.trial.n_after());
        }
        Ok(proposed)
    }

    fn a(&self) -> f64 {
        self.trial.base_a() * self.ln_bias_diff.exp()
    }

    fn b(&mut self, system: &System) -> Result<f64, EngineError> {
        let delta = self.trial.energy_change(&mut self.state, system, NAME)?;
        Ok(-delta)
    }

    fn accept_notify(&mut self, system: &mut System) -> Result<Commit, EngineError> {
        if self.leaves_window() {
            trace!(
                n_before = self.trial.n_before,
                n_after = self.trial.n_after(),
                "Forcing rejection of trial outside the particle-number window"
            );
            self.state.revert(system, NAME)?;
            return Ok(Commit::ForcedReject);
        }
        if !self.state.is_pending() {
            return Err(EngineError::NoPendingTrial {
                name: NAME.to_string(),
            });
        }
        self.trial.apply(system)?;
        self.state.commit(system, NAME)?;
        Ok(Commit::Applied)
    }

    fn particle_count(&self, system: &System) -> usize {
        box_len(system, self.trial.box_id)
    }

    fn tracker(&self) -> &AcceptanceTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut AcceptanceTracker {
        &mut self.tracker
    }

    fn state(&self) -> &TrialState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TrialState {
        &mut self.state
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
