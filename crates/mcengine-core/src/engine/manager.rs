use super::SimRng;
use super::config::MoveConfig;
use super::error::EngineError;
use super::moves::Move;
use crate::core::models::ids::MoveId;
use crate::core::models::system::System;
use rand::Rng;
use slotmap::SlotMap;
use tracing::{debug, trace};

/// A registered move together with its selection weights.
#[derive(Debug)]
pub struct ManagerEntry {
    mv: Box<dyn Move>,
    frequency: u32,
    per_particle: bool,
    /// `frequency`, multiplied by the live particle count for per-particle moves.
    full_frequency: u64,
    selection_count: u64,
}

impl ManagerEntry {
    pub fn mcmove(&self) -> &dyn Move {
        self.mv.as_ref()
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn is_per_particle(&self) -> bool {
        self.per_particle
    }

    pub fn full_frequency(&self) -> u64 {
        self.full_frequency
    }

    pub fn selection_count(&self) -> u64 {
        self.selection_count
    }

    fn recompute(&mut self, system: &System) {
        let scale = if self.per_particle {
            self.mv.particle_count(system) as u64
        } else {
            1
        };
        self.full_frequency = u64::from(self.frequency) * scale;
    }
}

/// Weighted collection of moves from which one is drawn per step.
///
/// A move is selected with probability `full_frequency / total`. Entries keep
/// their registration order, which fixes the walk order of the cumulative sum
/// and therefore makes selection reproducible under a fixed seed.
#[derive(Debug, Default)]
pub struct MoveManager {
    entries: SlotMap<MoveId, ManagerEntry>,
    order: Vec<MoveId>,
    total_frequency: u64,
}

impl MoveManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a move and recomputes all selection weights.
    pub fn add_move(
        &mut self,
        mv: impl Move + 'static,
        config: MoveConfig,
        system: &System,
    ) -> MoveId {
        let name = mv.name().to_string();
        let id = self.entries.insert(ManagerEntry {
            mv: Box::new(mv),
            frequency: config.frequency,
            per_particle: config.per_particle,
            full_frequency: 0,
            selection_count: 0,
        });
        self.order.push(id);
        self.recompute_frequencies(system);
        debug!(
            mcmove = %name,
            frequency = config.frequency,
            per_particle = config.per_particle,
            "Registered move"
        );
        id
    }

    /// Unregisters a move and hands it back to the caller.
    pub fn remove_move(
        &mut self,
        id: MoveId,
        system: &System,
    ) -> Result<Box<dyn Move>, EngineError> {
        let entry = self
            .entries
            .remove(id)
            .ok_or(EngineError::MoveNotFound(id))?;
        self.order.retain(|&other| other != id);
        self.recompute_frequencies(system);
        Ok(entry.mv)
    }

    pub fn recompute_frequencies(&mut self, system: &System) {
        self.total_frequency = 0;
        for entry in self.entries.values_mut() {
            entry.recompute(system);
            self.total_frequency += entry.full_frequency;
        }
    }

    pub fn total_frequency(&self) -> u64 {
        self.total_frequency
    }

    /// Draws one move proportionally to its effective frequency.
    ///
    /// Per-particle weights follow the live particle count, so they are refreshed
    /// before every draw when any such move is registered.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoSelectableMoves`] if every effective frequency is
    /// zero.
    pub fn select_move(&mut self, system: &System, rng: &mut SimRng) -> Result<MoveId, EngineError> {
        if self.entries.values().any(|entry| entry.per_particle) {
            self.recompute_frequencies(system);
        }
        if self.total_frequency == 0 {
            return Err(EngineError::NoSelectableMoves);
        }

        let draw = rng.gen_range(0..self.total_frequency);
        let mut cumulative = 0;
        for &id in &self.order {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            cumulative += entry.full_frequency;
            if cumulative > draw {
                entry.selection_count += 1;
                trace!(mcmove = entry.mv.name(), draw, "Selected move");
                return Ok(id);
            }
        }
        Err(EngineError::Internal(format!(
            "selection walk ended at {} without reaching draw {}",
            cumulative, draw
        )))
    }

    /// Switches step-size tuning of every move on or off.
    pub fn set_equilibrating(&mut self, equilibrating: bool) {
        for entry in self.entries.values_mut() {
            entry.mv.tracker_mut().set_tunable(equilibrating);
        }
    }

    /// Clears every tracker's counters and every selection count.
    ///
    /// Step sizes and frequencies are kept.
    pub fn reset_statistics(&mut self) {
        for entry in self.entries.values_mut() {
            entry.selection_count = 0;
            entry.mv.tracker_mut().reset();
        }
    }

    pub fn get(&self, id: MoveId) -> Option<&dyn Move> {
        self.entries.get(id).map(|entry| entry.mv.as_ref())
    }

    pub fn get_mut(&mut self, id: MoveId) -> Option<&mut (dyn Move + 'static)> {
        self.entries.get_mut(id).map(|entry| entry.mv.as_mut())
    }

    pub fn entry(&self, id: MoveId) -> Option<&ManagerEntry> {
        self.entries.get(id)
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (MoveId, &ManagerEntry)> {
        self.order
            .iter()
            .filter_map(|&id| self.entries.get(id).map(|entry| (id, entry)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
