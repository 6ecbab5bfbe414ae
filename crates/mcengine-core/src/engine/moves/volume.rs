use super::{InverseDelta, Move, TrialState, box_energy, box_len, box_mut, box_ref};
use crate::core::forcefield::potentials::is_overlap;
use crate::core::models::ids::BoxId;
use crate::core::models::system::System;
use crate::engine::SimRng;
use crate::engine::config::{ConfigError, StepSizeConfig};
use crate::engine::error::EngineError;
use crate::engine::tracker::AcceptanceTracker;
use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::any::Any;

const NAME: &str = "volume";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeScaling {
    /// All three edges scale by the same factor.
    #[default]
    Isotropic,
    /// One randomly chosen edge is rescaled; the others are kept.
    Anisotropic,
}

/// Constant-pressure box rescaling with a random walk in `ln V`.
///
/// A trial draws `d ln V` uniformly in `[-step, step)` and scales all
/// coordinates affinely. Sampling in `ln V` contributes the Jacobian
/// `exp((N + 1) d ln V)` to `A`; `B` is `-(dU + P dV)`.
#[derive(Debug)]
pub struct VolumeMove {
    box_id: BoxId,
    pressure: f64,
    scaling: VolumeScaling,
    tracker: AcceptanceTracker,
    state: TrialState,
    n: usize,
    ln_volume_ratio: f64,
    volume_old: f64,
    u_old: f64,
}

impl VolumeMove {
    pub fn new(
        box_id: BoxId,
        pressure: f64,
        scaling: VolumeScaling,
        step: &StepSizeConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            box_id,
            pressure,
            scaling,
            tracker: AcceptanceTracker::with_step_size(step)?,
            state: TrialState::new(),
            n: 0,
            ln_volume_ratio: 0.0,
            volume_old: 0.0,
            u_old: 0.0,
        })
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn set_pressure(&mut self, pressure: f64) {
        self.pressure = pressure;
    }

    fn propose(&mut self, system: &mut System, rng: &mut SimRng) -> Result<bool, EngineError> {
        let sim_box = box_ref(system, self.box_id)?;
        self.n = sim_box.len();
        self.volume_old = sim_box.volume();
        self.u_old = system.potential().total_energy(sim_box);

        let step = self.tracker.step_size().unwrap_or(0.0);
        let ln_ratio = step * (2.0 * rng.r#gen::<f64>() - 1.0);
        let mut new_lengths: Vector3<f64> = *sim_box.lengths();
        match self.scaling {
            VolumeScaling::Isotropic => new_lengths *= (ln_ratio / 3.0).exp(),
            VolumeScaling::Anisotropic => new_lengths[rng.gen_range(0..3)] *= ln_ratio.exp(),
        }
        let (lengths, positions) = sim_box.geometry();
        let affected: Vec<_> = positions.iter().map(|&(id, _)| id).collect();

        let sim_box = box_mut(system, self.box_id)?;
        sim_box.scale_to(new_lengths);
        self.ln_volume_ratio = (sim_box.volume() / self.volume_old).ln();

        self.state.stage(
            InverseDelta::Geometry {
                box_id: self.box_id,
                lengths,
                positions,
            },
            affected,
        );
        Ok(true)
    }
}

impl Move for VolumeMove {
    fn name(&self) -> &str {
        NAME
    }

    fn do_trial(&mut self, system: &mut System, rng: &mut SimRng) -> Result<bool, EngineError> {
        self.state.begin(NAME)?;
        let proposed = self.propose(system, rng);
        self.state.settle(proposed)
    }

    fn a(&self) -> f64 {
        ((self.n + 1) as f64 * self.ln_volume_ratio).exp()
    }

    fn b(&mut self, system: &System) -> Result<f64, EngineError> {
        let u_new = box_energy(system, self.box_id)?;
        if is_overlap(u_new) {
            self.state.set_energy_change(f64::INFINITY);
            return Ok(f64::NEG_INFINITY);
        }
        let delta = u_new - self.u_old;
        let volume_new = box_ref(system, self.box_id)?.volume();
        self.state.set_energy_change(delta);
        self.state.record_energy(self.box_id, delta);
        Ok(-(delta + self.pressure * (volume_new - self.volume_old)))
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
    use crate::core::forcefield::energy::{IdealGas, LennardJones};
    use crate::engine::moves::testing::{assert_reject_restores, lattice_system, seeded_rng};

    #[test]
    fn isotropic_reject_restores_geometry_exactly() {
        let (mut system, box_id) = lattice_system(LennardJones::new(1.0, 1.0, 2.5), 27, 6.0);
        let mut mv = VolumeMove::new(
            box_id,
            1.0,
            VolumeScaling::Isotropic,
            &StepSizeConfig::bounded(0.1, 0.0, 1.0),
        )
        .unwrap();
        let mut rng = seeded_rng(31);
        assert_eq!(
            assert_reject_restores(&mut mv, &mut system, &[box_id], &mut rng, 100),
            100
        );
    }

    #[test]
    fn anisotropic_reject_restores_geometry_exactly() {
        let (mut system, box_id) = lattice_system(IdealGas, 27, 6.0);
        let mut mv = VolumeMove::new(
            box_id,
            1.0,
            VolumeScaling::Anisotropic,
            &StepSizeConfig::bounded(0.2, 0.0, 1.0),
        )
        .unwrap();
        let mut rng = seeded_rng(32);
        assert_reject_restores(&mut mv, &mut system, &[box_id], &mut rng, 100);
    }

    #[test]
    fn anisotropic_trial_changes_exactly_one_edge() {
        let (mut system, box_id) = lattice_system(IdealGas, 8, 6.0);
        let mut mv = VolumeMove::new(
            box_id,
            1.0,
            VolumeScaling::Anisotropic,
            &StepSizeConfig::bounded(0.2, 0.0, 1.0),
        )
        .unwrap();
        let mut rng = seeded_rng(33);
        assert!(mv.do_trial(&mut system, &mut rng).unwrap());
        let lengths = *system.sim_box(box_id).unwrap().lengths();
        let changed = lengths.iter().filter(|&&l| l != 6.0).count();
        assert_eq!(changed, 1);
        mv.reject_notify(&mut system).unwrap();
    }

    #[test]
    fn ideal_gas_acceptance_factors_match_analytic_form() {
        let (mut system, box_id) = lattice_system(IdealGas, 10, 5.0);
        let pressure = 0.3;
        let mut mv = VolumeMove::new(
            box_id,
            pressure,
            VolumeScaling::Isotropic,
            &StepSizeConfig::bounded(0.5, 0.0, 1.0),
        )
        .unwrap();
        let mut rng = seeded_rng(34);
        assert!(mv.do_trial(&mut system, &mut rng).unwrap());
        let v_new = system.sim_box(box_id).unwrap().volume();
        let ratio = v_new / 125.0;

        assert!((mv.a() - ratio.powi(11)).abs() < 1e-9 * ratio.powi(11));
        let b = mv.b(&system).unwrap();
        assert!((b + pressure * (v_new - 125.0)).abs() < 1e-9);
        assert_eq!(mv.energy_change(), 0.0);
        mv.reject_notify(&mut system).unwrap();
        assert_eq!(system.sim_box(box_id).unwrap().volume(), 125.0);
    }
}
