use super::ids::BoxId;
use super::sim_box::SimBox;
use crate::core::forcefield::energy::{EnergyTarget, Potential};
use slotmap::SlotMap;

/// All simulation boxes of a run together with the energy evaluator they share.
///
/// Moves never own boxes; they hold a [`BoxId`] and borrow the box through the
/// system for the duration of a single trial.
#[derive(Debug)]
pub struct System {
    /// Primary storage for boxes using a slot map for efficient ID management.
    boxes: SlotMap<BoxId, SimBox>,
    /// Energy evaluator applied to every box.
    potential: Box<dyn Potential>,
}

impl System {
    pub fn new(potential: impl Potential + 'static) -> Self {
        Self::with_potential(Box::new(potential))
    }

    pub fn with_potential(potential: Box<dyn Potential>) -> Self {
        Self {
            boxes: SlotMap::with_key(),
            potential,
        }
    }

    /// Adds a box to the system and initializes its bookkeeping energy.
    ///
    /// # Arguments
    ///
    /// * `sim_box` - The box to add. Its stored energy is overwritten with a full
    ///   evaluation of the current configuration.
    ///
    /// # Return
    ///
    /// The ID assigned to the box.
    pub fn add_box(&mut self, mut sim_box: SimBox) -> BoxId {
        let energy = self.potential.total_energy(&sim_box);
        sim_box.set_energy(energy);
        self.boxes.insert(sim_box)
    }

    pub fn sim_box(&self, id: BoxId) -> Option<&SimBox> {
        self.boxes.get(id)
    }

    pub fn sim_box_mut(&mut self, id: BoxId) -> Option<&mut SimBox> {
        self.boxes.get_mut(id)
    }

    pub fn boxes_iter(&self) -> impl Iterator<Item = (BoxId, &SimBox)> {
        self.boxes.iter()
    }

    pub fn potential(&self) -> &dyn Potential {
        self.potential.as_ref()
    }

    /// Evaluates the energy of part of a box's configuration.
    ///
    /// # Return
    ///
    /// Returns `None` if the box does not exist.
    pub fn scalar_energy(&self, id: BoxId, target: EnergyTarget) -> Option<f64> {
        self.boxes
            .get(id)
            .map(|sim_box| self.potential.scalar_energy(sim_box, target))
    }

    /// Re-evaluates a box's total energy and stores it as the bookkeeping value.
    pub fn refresh_energy(&mut self, id: BoxId) -> Option<f64> {
        let energy = self.potential.total_energy(self.boxes.get(id)?);
        self.boxes.get_mut(id)?.set_energy(energy);
        Some(energy)
    }

    /// Borrows two distinct boxes mutably at the same time.
    ///
    /// Returns `None` if either box is missing or both IDs are equal.
    pub fn box_pair_mut(&mut self, first: BoxId, second: BoxId) -> Option<[&mut SimBox; 2]> {
        self.boxes.get_disjoint_mut([first, second])
    }

    /// Exchanges the complete configurations of two boxes.
    ///
    /// Geometry, particles and bookkeeping energy move together, so swapping
    /// twice restores the original assignment exactly.
    pub fn swap_configurations(&mut self, first: BoxId, second: BoxId) -> bool {
        match self.box_pair_mut(first, second) {
            Some([a, b]) => {
                std::mem::swap(a, b);
                true
            }
            None => false,
        }
    }
}
