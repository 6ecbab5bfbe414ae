//! # Moves Module
//!
//! The trial abstraction of the engine and its concrete variants.
//!
//! ## Overview
//!
//! A [`Move`] proposes one perturbation of the sampled configuration, reports the
//! two factors of its acceptance probability `min(1, A * exp(B / T))`, and then
//! either commits or exactly undoes the perturbation. The undo path never relies on
//! recomputation: while proposing, each move records an [`InverseDelta`] in its
//! [`TrialState`], and rejection simply applies that value.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --do_trial()=true--> Pending --accept_notify()--> Idle
//!   ^  \                            \--reject_notify()--> Idle
//!   |   \--do_trial()=false (nothing legal to try)------> Idle
//! ```
//!
//! Calling `do_trial` again while a trial is pending is an error.
//!
//! ## Variants
//!
//! - [`displacement`] - Single-particle translation
//! - [`rotation`] - Single rigid-body rotation
//! - [`volume`] - Isotropic or single-axis box rescaling at constant pressure
//! - [`insert_delete`] - Plain grand-canonical insertion/deletion
//! - [`biased`] - Insertion/deletion with a per-particle-number bias and a window
//! - [`exchange`] - Gibbs-ensemble particle and volume exchange between two boxes
//! - [`swap`] - Configuration swap between two replicas (replica exchange)

pub mod biased;
pub mod delta;
pub mod displacement;
pub mod exchange;
pub mod insert_delete;
pub mod rotation;
pub mod swap;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;

pub use delta::InverseDelta;

use super::SimRng;
use super::error::EngineError;
use super::tracker::AcceptanceTracker;
use crate::core::models::ids::{BoxId, ParticleId};
use crate::core::models::sim_box::SimBox;
use crate::core::models::system::System;
use std::any::Any;
use std::fmt;

/// Outcome of [`Move::accept_notify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// The perturbation is now part of the configuration.
    Applied,
    /// The move refused to commit and restored the pre-trial state itself.
    ForcedReject,
}

/// Bookkeeping for the trial a move currently has in flight.
#[derive(Debug, Clone)]
pub struct TrialState {
    pending: bool,
    inverse: InverseDelta,
    affected: Vec<ParticleId>,
    energy_change: f64,
    /// Energy increments applied to box bookkeeping on commit.
    energy_updates: Vec<(BoxId, f64)>,
}

impl Default for TrialState {
    fn default() -> Self {
        Self::new()
    }
}

impl TrialState {
    pub fn new() -> Self {
        Self {
            pending: false,
            inverse: InverseDelta::Nothing,
            affected: Vec::new(),
            energy_change: f64::NAN,
            energy_updates: Vec::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Opens a new trial.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TrialInProgress`] if the previous trial of this move
    /// has not been resolved yet.
    pub fn begin(&mut self, name: &str) -> Result<(), EngineError> {
        if self.pending {
            return Err(EngineError::TrialInProgress {
                name: name.to_string(),
            });
        }
        self.pending = true;
        self.inverse = InverseDelta::Nothing;
        self.affected.clear();
        self.energy_change = f64::NAN;
        self.energy_updates.clear();
        Ok(())
    }

    /// Closes the trial opened by [`TrialState::begin`] unless the proposal succeeded.
    ///
    /// A proposal that found nothing legal to do, or failed before touching the
    /// configuration, leaves the move idle again.
    pub fn settle(&mut self, proposed: Result<bool, EngineError>) -> Result<bool, EngineError> {
        if !matches!(proposed, Ok(true)) {
            self.pending = false;
            self.inverse = InverseDelta::Nothing;
            self.affected.clear();
        }
        proposed
    }

    pub fn stage(&mut self, inverse: InverseDelta, affected: impl IntoIterator<Item = ParticleId>) {
        self.inverse = inverse;
        self.affected.extend(affected);
    }

    pub fn set_energy_change(&mut self, delta: f64) {
        self.energy_change = delta;
    }

    /// Schedules a bookkeeping energy increment for `box_id`, applied on commit.
    ///
    /// Non-finite increments are dropped; they only arise for overlapping
    /// configurations, which are never committed.
    pub fn record_energy(&mut self, box_id: BoxId, delta: f64) {
        if delta.is_finite() {
            self.energy_updates.push((box_id, delta));
        }
    }

    pub fn affected(&self) -> &[ParticleId] {
        &self.affected
    }

    pub fn energy_change(&self) -> f64 {
        self.energy_change
    }

    fn ensure_pending(&self, name: &str) -> Result<(), EngineError> {
        if self.pending {
            Ok(())
        } else {
            Err(EngineError::NoPendingTrial {
                name: name.to_string(),
            })
        }
    }

    /// Makes the pending perturbation permanent and applies the energy updates.
    pub fn commit(&mut self, system: &mut System, name: &str) -> Result<(), EngineError> {
        self.ensure_pending(name)?;
        for (box_id, delta) in self.energy_updates.drain(..) {
            box_mut(system, box_id)?.add_energy(delta);
        }
        self.inverse = InverseDelta::Nothing;
        self.pending = false;
        Ok(())
    }

    /// Applies the recorded inverse delta.
    pub fn revert(&mut self, system: &mut System, name: &str) -> Result<(), EngineError> {
        self.ensure_pending(name)?;
        self.pending = false;
        self.energy_updates.clear();
        std::mem::replace(&mut self.inverse, InverseDelta::Nothing).revert(system)
    }
}

/// A Monte Carlo trial move.
///
/// The driver calls, in order: [`do_trial`](Move::do_trial); if it returned
/// `true`, [`b`](Move::b) and [`a`](Move::a); then exactly one of
/// [`accept_notify`](Move::accept_notify) or [`reject_notify`](Move::reject_notify).
pub trait Move: fmt::Debug {
    fn name(&self) -> &str;

    /// Proposes a perturbation and applies it to the configuration.
    ///
    /// # Return
    ///
    /// `Ok(false)` when no legal trial exists (for example a deletion from an empty
    /// box); nothing is evaluated or changed in that case.
    fn do_trial(&mut self, system: &mut System, rng: &mut SimRng) -> Result<bool, EngineError>;

    /// Temperature-independent factor of the acceptance ratio.
    fn a(&self) -> f64;

    /// Temperature-scaled exponent of the acceptance ratio.
    ///
    /// Evaluates the energy of the trial configuration; afterwards
    /// [`energy_change`](Move::energy_change) is valid.
    fn b(&mut self, system: &System) -> Result<f64, EngineError>;

    fn accept_notify(&mut self, system: &mut System) -> Result<Commit, EngineError> {
        let name = self.name().to_string();
        self.state_mut().commit(system, &name)?;
        Ok(Commit::Applied)
    }

    fn reject_notify(&mut self, system: &mut System) -> Result<(), EngineError> {
        let name = self.name().to_string();
        self.state_mut().revert(system, &name)
    }

    fn affected_particles(&self) -> &[ParticleId] {
        self.state().affected()
    }

    /// Energy difference of the last trial; NaN until [`b`](Move::b) ran.
    fn energy_change(&self) -> f64 {
        self.state().energy_change()
    }

    /// Live particle count of the box(es) this move acts on.
    fn particle_count(&self, system: &System) -> usize;

    fn tracker(&self) -> &AcceptanceTracker;
    fn tracker_mut(&mut self) -> &mut AcceptanceTracker;

    fn state(&self) -> &TrialState;
    fn state_mut(&mut self) -> &mut TrialState;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) fn box_ref(system: &System, box_id: BoxId) -> Result<&SimBox, EngineError> {
    system
        .sim_box(box_id)
        .ok_or(EngineError::BoxNotFound(box_id))
}

pub(crate) fn box_mut(system: &mut System, box_id: BoxId) -> Result<&mut SimBox, EngineError> {
    system
        .sim_box_mut(box_id)
        .ok_or(EngineError::BoxNotFound(box_id))
}

pub(crate) fn particle_energy(
    system: &System,
    box_id: BoxId,
    particle: ParticleId,
) -> Result<f64, EngineError> {
    let sim_box = box_ref(system, box_id)?;
    if !sim_box.contains(particle) {
        return Err(EngineError::ParticleNotFound { box_id, particle });
    }
    Ok(system.potential().particle_energy(sim_box, particle))
}

pub(crate) fn box_energy(system: &System, box_id: BoxId) -> Result<f64, EngineError> {
    Ok(system.potential().total_energy(box_ref(system, box_id)?))
}

pub(crate) fn box_len(system: &System, box_id: BoxId) -> usize {
    system.sim_box(box_id).map_or(0, SimBox::len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::energy::IdealGas;
    use crate::core::models::particle::Particle;
    use nalgebra::Point3;

    #[test]
    fn begin_twice_without_resolution_is_an_error() {
        let mut state = TrialState::new();
        state.begin("dummy-move").unwrap();
        assert!(matches!(
            state.begin("dummy-move"),
            Err(EngineError::TrialInProgress { .. })
        ));
    }

    #[test]
    fn settle_returns_to_idle_when_nothing_was_proposed() {
        let mut state = TrialState::new();
        state.begin("dummy-move").unwrap();
        assert!(!state.settle(Ok(false)).unwrap());
        assert!(!state.is_pending());
        state.begin("dummy-move").unwrap();
    }

    #[test]
    fn energy_change_is_nan_until_set() {
        let mut state = TrialState::new();
        state.begin("dummy-move").unwrap();
        assert!(state.energy_change().is_nan());
        state.set_energy_change(-1.5);
        assert_eq!(state.energy_change(), -1.5);
    }

    #[test]
    fn commit_without_pending_trial_is_an_error() {
        let mut system = System::new(IdealGas);
        let mut state = TrialState::new();
        assert!(matches!(
            state.commit(&mut system, "dummy-move"),
            Err(EngineError::NoPendingTrial { .. })
        ));
    }

    #[test]
    fn commit_applies_energy_updates_and_revert_discards_them() {
        let mut system = System::new(IdealGas);
        let mut sim_box = SimBox::cubic(5.0);
        sim_box.add_particle(Particle::new(Point3::new(1.0, 1.0, 1.0)));
        let box_id = system.add_box(sim_box);

        let mut state = TrialState::new();
        state.begin("dummy-move").unwrap();
        state.record_energy(box_id, 2.5);
        state.record_energy(box_id, f64::INFINITY);
        state.commit(&mut system, "dummy-move").unwrap();
        assert_eq!(system.sim_box(box_id).unwrap().energy(), 2.5);

        state.begin("dummy-move").unwrap();
        state.record_energy(box_id, 4.0);
        state.revert(&mut system, "dummy-move").unwrap();
        assert_eq!(system.sim_box(box_id).unwrap().energy(), 2.5);
    }
}
