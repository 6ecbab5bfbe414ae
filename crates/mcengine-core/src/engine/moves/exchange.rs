use super::{
    Commit, InverseDelta, Move, TrialState, box_energy, box_len, box_mut, box_ref, particle_energy,
};
use crate::core::forcefield::potentials::is_overlap;
use crate::core::models::ids::{BoxId, ParticleId};
use crate::core::models::particle::Particle;
use crate::core::models::system::System;
use crate::engine::SimRng;
use crate::engine::config::{ConfigError, StepSizeConfig};
use crate::engine::error::EngineError;
use crate::engine::tracker::AcceptanceTracker;
use rand::Rng;
use std::any::Any;
use tracing::error;

const MOLECULE_EXCHANGE: &str = "molecule-exchange";
const VOLUME_EXCHANGE: &str = "volume-exchange";

pub(super) fn distinct_boxes(first: BoxId, second: BoxId) -> Result<[BoxId; 2], ConfigError> {
    if first == second {
        return Err(ConfigError::InvalidValue {
            name: "boxes",
            reason: "exchange moves need two distinct boxes".to_string(),
        });
    }
    Ok([first, second])
}

/// Re-evaluates both boxes after a committed two-box trial.
///
/// An energy the evaluator cannot represent means the bookkeeping of both boxes
/// is unknown, so sampling must stop.
pub(super) fn resynchronize(
    system: &mut System,
    boxes: [BoxId; 2],
    name: &str,
) -> Result<(), EngineError> {
    for box_id in boxes {
        let energy = system
            .refresh_energy(box_id)
            .ok_or(EngineError::BoxNotFound(box_id))?;
        if !energy.is_finite() || is_overlap(energy) {
            error!(box_id = ?box_id, energy, "Inconsistent energy after committing '{}'", name);
            return Err(EngineError::FatalInconsistency {
                name: name.to_string(),
                reason: format!("box {:?} has energy {} after commit", box_id, energy),
            });
        }
    }
    Ok(())
}

/// Gibbs-ensemble transfer of one particle from a random donor box to the other.
///
/// The particle keeps its orientation and is placed at a uniformly random
/// position in the acceptor. `A = N_d V_a / ((N_a + 1) V_d)` and
/// `B = -(u_new - u_old)`. The copy in the acceptor exists during the trial; the
/// original is removed from the donor only on commit.
#[derive(Debug)]
pub struct MoleculeExchangeMove {
    boxes: [BoxId; 2],
    tracker: AcceptanceTracker,
    state: TrialState,
    donor: usize,
    removed: Option<ParticleId>,
    inserted: Option<ParticleId>,
    n_donor: usize,
    n_acceptor: usize,
    v_donor: f64,
    v_acceptor: f64,
    u_old: f64,
}

impl MoleculeExchangeMove {
    pub fn new(first: BoxId, second: BoxId) -> Result<Self, ConfigError> {
        Ok(Self {
            boxes: distinct_boxes(first, second)?,
            tracker: AcceptanceTracker::new(),
            state: TrialState::new(),
            donor: 0,
            removed: None,
            inserted: None,
            n_donor: 0,
            n_acceptor: 0,
            v_donor: 0.0,
            v_acceptor: 0.0,
            u_old: 0.0,
        })
    }

    pub fn boxes(&self) -> [BoxId; 2] {
        self.boxes
    }

    fn donor_box(&self) -> BoxId {
        self.boxes[self.donor]
    }

    fn acceptor_box(&self) -> BoxId {
        self.boxes[1 - self.donor]
    }

    fn propose(&mut self, system: &mut System, rng: &mut SimRng) -> Result<bool, EngineError> {
        self.donor = rng.gen_range(0..2);
        let (donor_id, acceptor_id) = (self.donor_box(), self.acceptor_box());

        let donor = box_ref(system, donor_id)?;
        let Some(removed) = donor.random_particle(rng) else {
            return Ok(false);
        };
        let orientation = donor
            .particle(removed)
            .ok_or(EngineError::ParticleNotFound {
                box_id: donor_id,
                particle: removed,
            })?
            .orientation;
        self.u_old = system.potential().particle_energy(donor, removed);
        self.n_donor = donor.len();
        self.v_donor = donor.volume();

        let acceptor = box_ref(system, acceptor_id)?;
        self.n_acceptor = acceptor.len();
        self.v_acceptor = acceptor.volume();
        let position = acceptor.random_position(rng);

        let inserted = box_mut(system, acceptor_id)?
            .add_particle(Particle::with_orientation(position, orientation));
        self.state.stage(
            InverseDelta::RemoveParticle {
                box_id: acceptor_id,
                particle: inserted,
            },
            [removed, inserted],
        );
        self.removed = Some(removed);
        self.inserted = Some(inserted);
        Ok(true)
    }
}

impl Move for MoleculeExchangeMove {
    fn name(&self) -> &str {
        MOLECULE_EXCHANGE
    }

    fn do_trial(&mut self, system: &mut System, rng: &mut SimRng) -> Result<bool, EngineError> {
        self.state.begin(MOLECULE_EXCHANGE)?;
        let proposed = self.propose(system, rng);
        self.state.settle(proposed)
    }

    fn a(&self) -> f64 {
        (self.n_donor as f64 * self.v_acceptor) / ((self.n_acceptor + 1) as f64 * self.v_donor)
    }

    fn b(&mut self, system: &System) -> Result<f64, EngineError> {
        let inserted = self.inserted.ok_or(EngineError::NoPendingTrial {
            name: MOLECULE_EXCHANGE.to_string(),
        })?;
        let u_new = particle_energy(system, self.acceptor_box(), inserted)?;
        if is_overlap(u_new) {
            self.state.set_energy_change(f64::INFINITY);
            return Ok(f64::NEG_INFINITY);
        }
        let delta = u_new - self.u_old;
        self.state.set_energy_change(delta);
        self.state.record_energy(self.donor_box(), -self.u_old);
        self.state.record_energy(self.acceptor_box(), u_new);
        Ok(-delta)
    }

    fn accept_notify(&mut self, system: &mut System) -> Result<Commit, EngineError> {
        let removed = self.removed.ok_or(EngineError::NoPendingTrial {
            name: MOLECULE_EXCHANGE.to_string(),
        })?;
        let donor_id = self.donor_box();
        box_mut(system, donor_id)?
            .remove_particle(removed)
            .ok_or(EngineError::ParticleNotFound {
                box_id: donor_id,
                particle: removed,
            })?;
        self.state.commit(system, MOLECULE_EXCHANGE)?;
        resynchronize(system, self.boxes, MOLECULE_EXCHANGE)?;
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

/// Gibbs-ensemble volume exchange at fixed total volume.
///
/// The trial walks `ln(V1/V2)` by a uniform step in `[-step, step)` and rescales
/// both boxes isotropically. `A = (V1'/V1)^(N1+1) (V2'/V2)^(N2+1)` and
/// `B = -(dU1 + dU2)`.
#[derive(Debug)]
pub struct VolumeExchangeMove {
    boxes: [BoxId; 2],
    tracker: AcceptanceTracker,
    state: TrialState,
    n: [usize; 2],
    ln_volume_ratio: [f64; 2],
    u_old: [f64; 2],
}

impl VolumeExchangeMove {
    pub fn new(first: BoxId, second: BoxId, step: &StepSizeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            boxes: distinct_boxes(first, second)?,
            tracker: AcceptanceTracker::with_step_size(step)?,
            state: TrialState::new(),
            n: [0; 2],
            ln_volume_ratio: [0.0; 2],
            u_old: [0.0; 2],
        })
    }

    fn propose(&mut self, system: &mut System, rng: &mut SimRng) -> Result<bool, EngineError> {
        let mut volumes = [0.0; 2];
        for (i, &box_id) in self.boxes.iter().enumerate() {
            let sim_box = box_ref(system, box_id)?;
            self.n[i] = sim_box.len();
            volumes[i] = sim_box.volume();
            self.u_old[i] = system.potential().total_energy(sim_box);
        }

        let step = self.tracker.step_size().unwrap_or(0.0);
        let total = volumes[0] + volumes[1];
        let ratio = volumes[0] / volumes[1] * (step * (2.0 * rng.r#gen::<f64>() - 1.0)).exp();
        let second_new = total / (1.0 + ratio);
        let targets = [total - second_new, second_new];

        let mut deltas = Vec::with_capacity(2);
        let mut affected = Vec::new();
        for (i, &box_id) in self.boxes.iter().enumerate() {
            let sim_box = box_mut(system, box_id)?;
            let (lengths, positions) = sim_box.geometry();
            affected.extend(positions.iter().map(|&(id, _)| id));
            sim_box.scale_to(lengths * (targets[i] / volumes[i]).cbrt());
            self.ln_volume_ratio[i] = (sim_box.volume() / volumes[i]).ln();
            deltas.push(InverseDelta::Geometry {
                box_id,
                lengths,
                positions,
            });
        }
        self.state.stage(InverseDelta::Compound(deltas), affected);
        Ok(true)
    }
}

impl Move for VolumeExchangeMove {
    fn name(&self) -> &str {
        VOLUME_EXCHANGE
    }

    fn do_trial(&mut self, system: &mut System, rng: &mut SimRng) -> Result<bool, EngineError> {
        self.state.begin(VOLUME_EXCHANGE)?;
        let proposed = self.propose(system, rng);
        self.state.settle(proposed)
    }

    fn a(&self) -> f64 {
        self.n
            .iter()
            .zip(self.ln_volume_ratio.iter())
            .map(|(&n, &ln_ratio)| (n + 1) as f64 * ln_ratio)
            .sum::<f64>()
            .exp()
    }

    fn b(&mut self, system: &System) -> Result<f64, EngineError> {
        let mut total = 0.0;
        for (i, &box_id) in self.boxes.iter().enumerate() {
            let u_new = box_energy(system, box_id)?;
            if is_overlap(u_new) {
                self.state.set_energy_change(f64::INFINITY);
                return Ok(f64::NEG_INFINITY);
            }
            let delta = u_new - self.u_old[i];
            self.state.record_energy(box_id, delta);
            total += delta;
        }
        self.state.set_energy_change(total);
        Ok(-total)
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
    use crate::core::forcefield::energy::{EnergyTarget, IdealGas, LennardJones};
    use crate::core::models::sim_box::SimBox;
    use crate::engine::moves::testing::{assert_reject_restores, seeded_rng};

    fn two_boxes(potential_lj: bool, n: [usize; 2], lengths: [f64; 2]) -> (System, BoxId, BoxId) {
        let mut system = if potential_lj {
            System::new(LennardJones::new(1.0, 1.0, 2.0))
        } else {
            System::new(IdealGas)
        };
        let mut first = SimBox::cubic(lengths[0]);
        first.fill_lattice(n[0]);
        let mut second = SimBox::cubic(lengths[1]);
        second.fill_lattice(n[1]);
        let a = system.add_box(first);
        let b = system.add_box(second);
        (system, a, b)
    }

    mod molecule_exchange {
        use super::*;

        #[test]
        fn reject_restores_both_boxes_exactly() {
            let (mut system, a, b) = two_boxes(true, [12, 8], [5.0, 4.5]);
            let mut mv = MoleculeExchangeMove::new(a, b).unwrap();
            let mut rng = seeded_rng(61);
            assert_eq!(
                assert_reject_restores(&mut mv, &mut system, &[a, b], &mut rng, 100),
                100
            );
        }

        #[test]
        fn same_box_twice_is_a_configuration_error() {
            let (_, a, _) = two_boxes(false, [1, 1], [3.0, 3.0]);
            assert!(MoleculeExchangeMove::new(a, a).is_err());
        }

        #[test]
        fn acceptance_factor_uses_donor_and_acceptor_populations() {
            let (mut system, a, b) = two_boxes(false, [6, 2], [4.0, 2.0]);
            let mut mv = MoleculeExchangeMove::new(a, b).unwrap();
            let mut rng = seeded_rng(62);
            for _ in 0..20 {
                assert!(mv.do_trial(&mut system, &mut rng).unwrap());
                let expected = if mv.donor_box() == a {
                    6.0 * 8.0 / (3.0 * 64.0)
                } else {
                    2.0 * 64.0 / (7.0 * 8.0)
                };
                assert!((mv.a() - expected).abs() < 1e-12);
                mv.reject_notify(&mut system).unwrap();
            }
        }

        #[test]
        fn commit_moves_one_particle_and_resynchronizes_energies() {
            let (mut system, a, b) = two_boxes(true, [12, 8], [5.0, 4.5]);
            let mut mv = MoleculeExchangeMove::new(a, b).unwrap();
            let mut rng = seeded_rng(63);
            let mut committed = 0;
            while committed < 5 {
                assert!(mv.do_trial(&mut system, &mut rng).unwrap());
                if mv.b(&system).unwrap() == f64::NEG_INFINITY {
                    mv.reject_notify(&mut system).unwrap();
                    continue;
                }
                mv.accept_notify(&mut system).unwrap();
                committed += 1;
            }
            let total = system.sim_box(a).unwrap().len() + system.sim_box(b).unwrap().len();
            assert_eq!(total, 20);
            for id in [a, b] {
                let exact = system.scalar_energy(id, EnergyTarget::All).unwrap();
                assert_eq!(system.sim_box(id).unwrap().energy(), exact);
            }
        }

        #[test]
        fn empty_donor_yields_no_trial() {
            let (mut system, a, b) = two_boxes(false, [0, 0], [3.0, 3.0]);
            let mut mv = MoleculeExchangeMove::new(a, b).unwrap();
            let mut rng = seeded_rng(64);
            assert!(!mv.do_trial(&mut system, &mut rng).unwrap());
            assert!(!mv.state().is_pending());
        }
    }

    mod volume_exchange {
        use super::*;

        #[test]
        fn reject_restores_both_boxes_exactly() {
            let (mut system, a, b) = two_boxes(true, [12, 8], [5.0, 4.5]);
            let mut mv =
                VolumeExchangeMove::new(a, b, &StepSizeConfig::bounded(0.2, 0.0, 2.0)).unwrap();
            let mut rng = seeded_rng(71);
            assert_eq!(
                assert_reject_restores(&mut mv, &mut system, &[a, b], &mut rng, 100),
                100
            );
        }

        #[test]
        fn total_volume_is_conserved() {
            let (mut system, a, b) = two_boxes(false, [5, 5], [4.0, 3.0]);
            let total = 64.0 + 27.0;
            let mut mv =
                VolumeExchangeMove::new(a, b, &StepSizeConfig::bounded(0.5, 0.0, 2.0)).unwrap();
            let mut rng = seeded_rng(72);
            for _ in 0..20 {
                assert!(mv.do_trial(&mut system, &mut rng).unwrap());
                mv.b(&system).unwrap();
                mv.accept_notify(&mut system).unwrap();
                let sum = system.sim_box(a).unwrap().volume() + system.sim_box(b).unwrap().volume();
                assert!((sum - total).abs() < 1e-9);
            }
        }

        #[test]
        fn ideal_gas_acceptance_matches_volume_ratios() {
            let (mut system, a, b) = two_boxes(false, [4, 7], [4.0, 3.0]);
            let mut mv =
                VolumeExchangeMove::new(a, b, &StepSizeConfig::bounded(0.5, 0.0, 2.0)).unwrap();
            let mut rng = seeded_rng(73);
            assert!(mv.do_trial(&mut system, &mut rng).unwrap());
            let r1 = system.sim_box(a).unwrap().volume() / 64.0;
            let r2 = system.sim_box(b).unwrap().volume() / 27.0;
            let expected = r1.powi(5) * r2.powi(8);
            assert!((mv.a() - expected).abs() < 1e-9 * expected);
            assert_eq!(mv.b(&system).unwrap(), 0.0);
            mv.reject_notify(&mut system).unwrap();
        }
    }
}
