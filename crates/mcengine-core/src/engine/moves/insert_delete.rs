use super::{Commit, InverseDelta, Move, TrialState, box_len, box_mut, box_ref, particle_energy};
use crate::core::forcefield::potentials::is_overlap;
use crate::core::models::ids::{BoxId, ParticleId};
use crate::core::models::particle::Particle;
use crate::core::models::system::System;
use crate::engine::SimRng;
use crate::engine::error::EngineError;
use crate::engine::tracker::AcceptanceTracker;
use rand::Rng;
use std::any::Any;

const NAME: &str = "insert-delete";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Insert,
    Delete,
}

/// Proposal logic shared by the plain and the biased insertion/deletion moves.
///
/// Insertions add the new particle immediately and record its removal as the
/// inverse. Deletions only mark the victim; it is removed when the trial is
/// committed, so a rejected deletion never touches the box.
#[derive(Debug, Clone)]
pub(crate) struct ExchangeTrial {
    pub box_id: BoxId,
    pub direction: Direction,
    pub n_before: usize,
    pub volume: f64,
    pub particle: Option<ParticleId>,
    u_removed: f64,
}

impl ExchangeTrial {
    pub fn new(box_id: BoxId) -> Self {
        Self {
            box_id,
            direction: Direction::Insert,
            n_before: 0,
            volume: 0.0,
            particle: None,
            u_removed: 0.0,
        }
    }

    pub fn propose(
        &mut self,
        state: &mut TrialState,
        system: &mut System,
        rng: &mut SimRng,
    ) -> Result<bool, EngineError> {
        let sim_box = box_ref(system, self.box_id)?;
        self.n_before = sim_box.len();
        self.volume = sim_box.volume();
        self.u_removed = 0.0;
        self.direction = if rng.r#gen::<f64>() < 0.5 {
            Direction::Insert
        } else {
            Direction::Delete
        };

        match self.direction {
            Direction::Insert => {
                let position = sim_box.random_position(rng);
                let particle = box_mut(system, self.box_id)?.add_particle(Particle::new(position));
                state.stage(
                    InverseDelta::RemoveParticle {
                        box_id: self.box_id,
                        particle,
                    },
                    [particle],
                );
                self.particle = Some(particle);
            }
            Direction::Delete => {
                let Some(particle) = sim_box.random_particle(rng) else {
                    return Ok(false);
                };
                self.u_removed = system.potential().particle_energy(sim_box, particle);
                state.stage(InverseDelta::Nothing, [particle]);
                self.particle = Some(particle);
            }
        }
        Ok(true)
    }

    pub fn n_after(&self) -> usize {
        match self.direction {
            Direction::Insert => self.n_before + 1,
            Direction::Delete => self.n_before.saturating_sub(1),
        }
    }

    /// The unbiased grand-canonical ratio `V/(N+1)` or `N/V`.
    pub fn base_a(&self) -> f64 {
        match self.direction {
            Direction::Insert => self.volume / (self.n_before + 1) as f64,
            Direction::Delete => self.n_before as f64 / self.volume,
        }
    }

    /// Evaluates `u_new - u_old` of the trial and schedules the bookkeeping update.
    pub fn energy_change(
        &mut self,
        state: &mut TrialState,
        system: &System,
        name: &str,
    ) -> Result<f64, EngineError> {
        let particle = self.particle.ok_or(EngineError::NoPendingTrial {
            name: name.to_string(),
        })?;
        let delta = match self.direction {
            Direction::Insert => {
                let u_new = particle_energy(system, self.box_id, particle)?;
                if is_overlap(u_new) { f64::INFINITY } else { u_new }
            }
            Direction::Delete => -self.u_removed,
        };
        state.set_energy_change(delta);
        state.record_energy(self.box_id, delta);
        Ok(delta)
    }

    /// Carries out a deferred deletion. Insertions are already in place.
    pub fn apply(&self, system: &mut System) -> Result<(), EngineError> {
        if let (Direction::Delete, Some(particle)) = (self.direction, self.particle) {
            box_mut(system, self.box_id)?
                .remove_particle(particle)
                .ok_or(EngineError::ParticleNotFound {
                    box_id: self.box_id,
                    particle,
                })?;
        }
        Ok(())
    }
}

/// Grand-canonical insertion/deletion at chemical potential `mu`.
///
/// `A` is `V/(N+1)` for an insertion and `N/V` for a deletion; `B` is
/// `-dU + mu` and `-dU - mu` respectively.
#[derive(Debug)]
pub struct InsertDeleteMove {
    trial: ExchangeTrial,
    mu: f64,
    tracker: AcceptanceTracker,
    state: TrialState,
}

impl InsertDeleteMove {
    pub fn new(box_id: BoxId, mu: f64) -> Self {
        Self {
            trial: ExchangeTrial::new(box_id),
            mu,
            tracker: AcceptanceTracker::new(),
            state: TrialState::new(),
        }
    }

    pub fn chemical_potential(&self) -> f64 {
        self.mu
    }

    pub fn set_chemical_potential(&mut self, mu: f64) {
        self.mu = mu;
    }

    pub fn direction(&self) -> Direction {
        self.trial.direction
    }
}

impl Move for InsertDeleteMove {
    fn name(&self) -> &str {
        NAME
    }

    fn do_trial(&mut self, system: &mut System, rng: &mut SimRng) -> Result<bool, EngineError> {
        self.state.begin(NAME)?;
        let proposed = self.trial.propose(&mut self.state, system, rng);
        self.state.settle(proposed)
    }

    fn a(&self) -> f64 {
        self.trial.base_a()
    }

    fn b(&mut self, system: &System) -> Result<f64, EngineError> {
        let delta = self.trial.energy_change(&mut self.state, system, NAME)?;
        Ok(match self.trial.direction {
            Direction::Insert => -delta + self.mu,
            Direction::Delete => -delta - self.mu,
        })
    }

    fn accept_notify(&mut self, system: &mut System) -> Result<Commit, EngineError> {
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
