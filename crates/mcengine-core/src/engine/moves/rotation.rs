use super::{InverseDelta, Move, TrialState, box_len, box_mut, box_ref, particle_energy};
use crate::core::forcefield::potentials::is_overlap;
use crate::core::models::ids::{BoxId, ParticleId};
use crate::core::models::system::System;
use crate::core::utils::geometry::random_rotation;
use crate::engine::SimRng;
use crate::engine::config::{ConfigError, StepSizeConfig};
use crate::engine::error::EngineError;
use crate::engine::tracker::AcceptanceTracker;
use std::any::Any;

const NAME: &str = "rotation";

/// Rotates one uniformly chosen rigid body about a random axis by an angle
/// uniform in `[-step, step)` radians.
#[derive(Debug)]
pub struct RotationMove {
    box_id: BoxId,
    tracker: AcceptanceTracker,
    state: TrialState,
    particle: Option<ParticleId>,
    u_old: f64,
}

impl RotationMove {
    /// Creates the move; the step-size upper bound is capped at pi.
    pub fn new(box_id: BoxId, step: &StepSizeConfig) -> Result<Self, ConfigError> {
        let step = StepSizeConfig {
            max: step.max.min(std::f64::consts::PI),
            ..step.clone()
        };
        Ok(Self {
            box_id,
            tracker: AcceptanceTracker::with_step_size(&step)?,
            state: TrialState::new(),
            particle: None,
            u_old: 0.0,
        })
    }

    fn propose(&mut self, system: &mut System, rng: &mut SimRng) -> Result<bool, EngineError> {
        let sim_box = box_ref(system, self.box_id)?;
        let Some(particle) = sim_box.random_particle(rng) else {
            return Ok(false);
        };
        self.u_old = system.potential().particle_energy(sim_box, particle);

        let step = self.tracker.step_size().unwrap_or(0.0);
        let rotation = random_rotation(rng, step);
        let body = box_mut(system, self.box_id)?
            .particle_mut(particle)
            .ok_or(EngineError::ParticleNotFound {
                box_id: self.box_id,
                particle,
            })?;
        let old = body.orientation;
        body.orientation = rotation * old;

        self.state.stage(
            InverseDelta::Orientation {
                box_id: self.box_id,
                particle,
                orientation: old,
            },
            [particle],
        );
        self.particle = Some(particle);
        Ok(true)
    }
}

impl Move for RotationMove {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::energy::IdealGas;
    use crate::engine::moves::testing::{assert_reject_restores, lattice_system, seeded_rng};

    #[test]
    fn reject_restores_orientation_exactly() {
        let (mut system, box_id) = lattice_system(IdealGas, 8, 4.0);
        let mut mv = RotationMove::new(box_id, &StepSizeConfig::bounded(1.0, 0.0, 3.0)).unwrap();
        let mut rng = seeded_rng(21);
        assert_eq!(
            assert_reject_restores(&mut mv, &mut system, &[box_id], &mut rng, 100),
            100
        );
    }

    #[test]
    fn accepted_rotation_changes_only_orientation() {
        let (mut system, box_id) = lattice_system(IdealGas, 8, 4.0);
        let before = system.sim_box(box_id).unwrap().snapshot();
        let mut mv = RotationMove::new(box_id, &StepSizeConfig::bounded(1.0, 0.0, 3.0)).unwrap();
        let mut rng = seeded_rng(22);
        assert!(mv.do_trial(&mut system, &mut rng).unwrap());
        assert_eq!(mv.b(&system).unwrap(), 0.0);
        mv.accept_notify(&mut system).unwrap();

        let after = system.sim_box(box_id).unwrap().snapshot();
        let moved = mv.affected_particles()[0];
        for ((id, old), (_, new)) in before.particles.iter().zip(after.particles.iter()) {
            assert_eq!(old.position, new.position);
            if *id != moved {
                assert_eq!(old.orientation, new.orientation);
            }
        }
    }

    #[test]
    fn step_bound_is_capped_at_pi() {
        let (_, box_id) = lattice_system(IdealGas, 1, 4.0);
        let mv = RotationMove::new(box_id, &StepSizeConfig::bounded(1.0, 0.0, 10.0)).unwrap();
        let (_, max) = mv.tracker().step_controller().unwrap().bounds();
        assert_eq!(max, std::f64::consts::PI);
    }
}
