use super::Move;
use crate::core::forcefield::energy::Potential;
use crate::core::models::ids::BoxId;
use crate::core::models::sim_box::{BoxSnapshot, SimBox};
use crate::core::models::system::System;
use crate::engine::SimRng;
use rand::SeedableRng;

pub(crate) fn seeded_rng(seed: u64) -> SimRng {
    SimRng::seed_from_u64(seed)
}

pub(crate) fn lattice_system(
    potential: impl Potential + 'static,
    count: usize,
    length: f64,
) -> (System, BoxId) {
    let mut system = System::new(potential);
    let mut sim_box = SimBox::cubic(length);
    sim_box.fill_lattice(count);
    let box_id = system.add_box(sim_box);
    (system, box_id)
}

fn capture(system: &System, boxes: &[BoxId]) -> Vec<(BoxSnapshot, u64)> {
    boxes
        .iter()
        .map(|&id| {
            let sim_box = system.sim_box(id).unwrap();
            (sim_box.snapshot(), sim_box.energy().to_bits())
        })
        .collect()
}

/// Runs `trials` proposals that are all rejected and checks that every box is
/// bit-identical to its state before each trial.
///
/// Returns the number of trials that were actually proposed.
pub(crate) fn assert_reject_restores(
    mv: &mut dyn Move,
    system: &mut System,
    boxes: &[BoxId],
    rng: &mut SimRng,
    trials: usize,
) -> usize {
    let mut proposed = 0;
    for _ in 0..trials {
        let before = capture(system, boxes);
        if mv.do_trial(system, rng).unwrap() {
            proposed += 1;
            mv.b(system).unwrap();
            let _ = mv.a();
            mv.reject_notify(system).unwrap();
        }
        assert_eq!(capture(system, boxes), before, "move '{}' did not revert exactly", mv.name());
        assert!(!mv.state().is_pending());
    }
    proposed
}
