use super::{InverseDelta, Move, TrialState, box_len, box_mut, box_ref, particle_energy};
use crate::core::forcefield::potentials::is_overlap;
use crate::core::models::ids::{BoxId, ParticleId};
use crate::core::models::system::System;
use crate::core::utils::geometry::random_displacement;
use crate::engine::SimRng;
use crate::engine::config::{ConfigError, StepSizeConfig};
use crate::engine::error::EngineError;
use crate::engine::tracker::AcceptanceTracker;
use std::any::Any;

const NAME: &str = "displacement";

/// Translates one uniformly chosen particle by a random vector whose components
/// are uniform in `[-step, step)`, then wraps it back into the box.
#[derive(Debug)]
pub struct DisplacementMove {
    box_id: BoxId,
    tracker: AcceptanceTracker,
    state: TrialState,
    particle: Option<ParticleId>,
    u_old: f64,
}

impl DisplacementMove {
    pub fn new(box_id: BoxId, step: &StepSizeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            box_id,
            tracker: AcceptanceTracker::with_step_size(step)?,
            state: TrialState::new(),
            particle: None,
            u_old: 0.0,
        })
    }

    pub fn box_id(&self) -> BoxId {
        self.box_id
    }

    fn propose(&mut self, system: &mut System, rng: &mut SimRng) -> Result<bool, EngineError> {
        let sim_box = box_ref(system, self.box_id)?;
        let Some(particle) = sim_box.random_particle(rng) else {
            return Ok(false);
        };
        self.u_old = system.potential().particle_energy(sim_box, particle);

        let old = sim_box
            .particle(particle)
            .ok_or(EngineError::ParticleNotFound {
                box_id: self.box_id,
                particle,
            })?
            .position;
        let step = self.tracker.step_size().unwrap_or(0.0);
        let new = sim_box.wrap(&(old + random_displacement(rng, step)));

        if let Some(p) = box_mut(system, self.box_id)?.particle_mut(particle) {
            p.position = new;
        }
        self.state.stage(
            InverseDelta::Position {
                box_id: self.box_id,
                particle,
                position: old,
            },
            [particle],
        );
        self.particle = Some(particle);
        Ok(true)
    }
}

impl Move for DisplacementMove {
    fn name(&self) -> &str {
        NAME
    }

    fn do_trial(&mut self, system: &mut System, rng: &mut SimRng) -> Result<bool, EngineError> {
        self.state.begin(NAME)?;
        let proposed = self.propose(system, rng);
        self.state.settle(proposed)
    }

    fn a(&self) -> f64 {
        1.0
    }

    fn b(&mut self, system: &System) -> Result<f64, EngineError> {
        let particle = self.particle.ok_or(EngineError::NoPendingTrial {
            name: NAME.to_string(),
        })?;
        let u_new = particle_energy(system, self.box_id, particle)?;
        if is_overlap(u_new) {
            self.state.set_energy_change(f64::INFINITY);
            return Ok(f64::NEG_INFINITY);
        }
        let delta = u_new - self.u_old;
        self.state.set_energy_change(delta);
        self.state.record_energy(self.box_id, delta);
        Ok(-delta)
    }

    fn particle_count(&self, system: &System) -> usize {
        box_len(system, self.box_id)
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
