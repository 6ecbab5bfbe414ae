use super::exchange::{distinct_boxes, resynchronize};
use super::{Commit, InverseDelta, Move, TrialState, box_len, box_ref};
use crate::core::models::ids::BoxId;
use crate::core::models::system::System;
use crate::engine::SimRng;
use crate::engine::config::ConfigError;
use crate::engine::error::EngineError;
use crate::engine::tracker::AcceptanceTracker;
use std::any::Any;

const NAME: &str = "configuration-swap";

/// Replica-exchange swap of the complete configurations of two boxes held at
/// different temperatures.
///
/// `A = exp((1/T1 - 1/T2)(U1 - U2))` with the bookkeeping energies before the
/// swap, and `B = 0`. Energies travel with their configurations, so the swap
/// itself never changes any stored energy.
#[derive(Debug)]
pub struct ConfigurationSwapMove {
    boxes: [BoxId; 2],
    temperatures: [f64; 2],
    tracker: AcceptanceTracker,
    state: TrialState,
    energies: [f64; 2],
}

impl ConfigurationSwapMove {
    pub fn new(
        first: BoxId,
        second: BoxId,
        temperatures: [f64; 2],
    ) -> Result<Self, ConfigError> {
        for temperature in temperatures {
            if !(temperature.is_finite() && temperature > 0.0) {
                return Err(ConfigError::InvalidValue {
                    name: "temperatures",
                    reason: format!("must be finite and positive, got {}", temperature),
                });
            }
        }
        Ok(Self {
            boxes: distinct_boxes(first, second)?,
            temperatures,
            tracker: AcceptanceTracker::new(),
            state: TrialState::new(),
            energies: [0.0; 2],
        })
    }

    pub fn boxes(&self) -> [BoxId; 2] {
        self.boxes
    }

    pub fn temperatures(&self) -> [f64; 2] {
        self.temperatures
    }

    fn propose(&mut self, system: &mut System) -> Result<bool, EngineError> {
        let mut affected = Vec::new();
        for (i, &box_id) in self.boxes.iter().enumerate() {
            let sim_box = box_ref(system, box_id)?;
            self.energies[i] = sim_box.energy();
            affected.extend_from_slice(sim_box.particle_ids());
        }
        let [first, second] = self.boxes;
        if !system.swap_configurations(first, second) {
            return Err(EngineError::Internal(format!(
                "cannot swap boxes {:?} and {:?}",
                first, second
            )));
        }
        self.state.stage(InverseDelta::SwapConfigurations { first, second }, affected);
        Ok(true)
    }
}

impl Move for ConfigurationSwapMove {
    fn name(&self) -> &str {
        NAME
    }

    fn do_trial(&mut self, system: &mut System, _rng: &mut SimRng) -> Result<bool, EngineError> {
        self.state.begin(NAME)?;
        let proposed = self.propose(system);
        self.state.settle(proposed)
    }

    fn a(&self) -> f64 {
        let [t1, t2] = self.temperatures;
        let [u1, u2] = self.energies;
        ((1.0 / t1 - 1.0 / t2) * (u1 - u2)).exp()
    }

    fn b(&mut self, _system: &System) -> Result<f64, EngineError> {
        self.state.set_energy_change(0.0);
        Ok(0.0)
    }

    fn accept_notify(&mut self, system: &mut System) -> Result<Commit, EngineError> {
        self.state.commit(system, NAME)?;
        resynchronize(system, self.boxes, NAME)?;
        Ok(Commit::Applied)
    }

    fn particle_count(&self, system: &System) -> usize {
        self.boxes.iter().map(|&id| box_len(system, id)).sum()
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
    use crate::core::forcefield::energy::LennardJones;
    use crate::core::models::sim_box::SimBox;
    use crate::engine::moves::testing::{assert_reject_restores, seeded_rng};

    fn replicas() -> (System, BoxId, BoxId) {
        let mut system = System::new(LennardJones::new(1.0, 1.0, 2.0));
        let mut hot = SimBox::cubic(5.0);
        hot.fill_lattice(12);
        let mut cold = SimBox::cubic(4.5);
        cold.fill_lattice(20);
        let a = system.add_box(hot);
        let b = system.add_box(cold);
        (system, a, b)
    }

    #[test]
    fn reject_restores_both_replicas_exactly() {
        let (mut system, a, b) = replicas();
        let mut mv = ConfigurationSwapMove::new(a, b, [1.0, 2.0]).unwrap();
        let mut rng = seeded_rng(81);
        assert_eq!(
            assert_reject_restores(&mut mv, &mut system, &[a, b], &mut rng, 10),
            10
        );
    }

    #[test]
    fn acceptance_factor_uses_inverse_temperature_difference() {
        let (mut system, a, b) = replicas();
        let u1 = system.sim_box(a).unwrap().energy();
        let u2 = system.sim_box(b).unwrap().energy();
        let mut mv = ConfigurationSwapMove::new(a, b, [0.8, 1.6]).unwrap();
        let mut rng = seeded_rng(82);
        assert!(mv.do_trial(&mut system, &mut rng).unwrap());
        assert_eq!(mv.b(&system).unwrap(), 0.0);
        let expected = ((1.0 / 0.8 - 1.0 / 1.6) * (u1 - u2)).exp();
        assert!((mv.a() - expected).abs() <= 1e-12 * expected.max(1.0));
        mv.reject_notify(&mut system).unwrap();
    }

    #[test]
    fn equal_temperatures_always_accept() {
        let (mut system, a, b) = replicas();
        let mut mv = ConfigurationSwapMove::new(a, b, [1.5, 1.5]).unwrap();
        let mut rng = seeded_rng(83);
        assert!(mv.do_trial(&mut system, &mut rng).unwrap());
        assert_eq!(mv.a(), 1.0);
        mv.reject_notify(&mut system).unwrap();
    }

    #[test]
    fn commit_exchanges_configurations_and_energies() {
        let (mut system, a, b) = replicas();
        let before_a = system.sim_box(a).unwrap().snapshot();
        let before_b = system.sim_box(b).unwrap().snapshot();
        let u1 = system.sim_box(a).unwrap().energy();
        let mut mv = ConfigurationSwapMove::new(a, b, [1.0, 2.0]).unwrap();
        let mut rng = seeded_rng(84);
        assert!(mv.do_trial(&mut system, &mut rng).unwrap());
        mv.b(&system).unwrap();
        assert_eq!(mv.accept_notify(&mut system).unwrap(), Commit::Applied);
        assert_eq!(system.sim_box(a).unwrap().snapshot(), before_b);
        assert_eq!(system.sim_box(b).unwrap().snapshot(), before_a);
        assert!((system.sim_box(b).unwrap().energy() - u1).abs() < 1e-9 * u1.abs().max(1.0));
        assert_eq!(mv.particle_count(&system), 32);
    }

    #[test]
    fn rejects_non_positive_temperatures() {
        let (_, a, b) = replicas();
        assert!(ConfigurationSwapMove::new(a, b, [0.0, 1.0]).is_err());
        assert!(ConfigurationSwapMove::new(a, b, [1.0, f64::NAN]).is_err());
    }

    #[test]
    fn every_particle_of_both_replicas_is_affected() {
        let (mut system, a, b) = replicas();
        let mut ids: Vec<_> = system.sim_box(a).unwrap().particle_ids().to_vec();
        ids.extend_from_slice(system.sim_box(b).unwrap().particle_ids());
        let mut mv = ConfigurationSwapMove::new(a, b, [1.0, 2.0]).unwrap();
        let mut rng = seeded_rng(85);
        assert!(mv.do_trial(&mut system, &mut rng).unwrap());
        mv.b(&system).unwrap();
        assert_eq!(mv.affected_particles().len(), 32);
        assert_eq!(mv.affected_particles(), ids.as_slice());
        mv.reject_notify(&mut system).unwrap();
        assert!(!mv.state().is_pending());
    }
}
