use super::ids::ParticleId;
use super::particle::Particle;
use nalgebra::{Point3, Vector3};
use rand::Rng;
use slotmap::SlotMap;

/// A complete, comparable copy of a box's mutable geometry and particle state.
///
/// Two snapshots compare equal only if every coordinate, orientation and box
/// length is bit-identical and the particles appear in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSnapshot {
    pub lengths: Vector3<f64>,
    pub particles: Vec<(ParticleId, Particle)>,
}

/// An orthorhombic, fully periodic simulation box.
///
/// The box owns its particles and keeps them in a stable insertion order so that
/// uniform random selection by index is reproducible under a fixed seed. It also
/// carries the bookkeeping total potential energy, which moves update as trials
/// are committed.
#[derive(Debug, Clone)]
pub struct SimBox {
    /// Edge lengths along x, y and z.
    lengths: Vector3<f64>,
    /// Primary storage for particles using a slot map for stable IDs.
    particles: SlotMap<ParticleId, Particle>,
    /// Insertion order of the live particles.
    order: Vec<ParticleId>,
    /// Bookkeeping total potential energy of the current configuration.
    energy: f64,
}

impl SimBox {
    /// Creates an empty box with the given edge lengths.
    ///
    /// # Arguments
    ///
    /// * `lengths` - Edge lengths along x, y and z; all must be positive.
    pub fn new(lengths: Vector3<f64>) -> Self {
        Self {
            lengths,
            particles: SlotMap::with_key(),
            order: Vec::new(),
            energy: 0.0,
        }
    }

    pub fn cubic(length: f64) -> Self {
        Self::new(Vector3::repeat(length))
    }

    pub fn lengths(&self) -> &Vector3<f64> {
        &self.lengths
    }

    pub fn volume(&self) -> f64 {
        self.lengths.x * self.lengths.y * self.lengths.z
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: ParticleId) -> bool {
        self.particles.contains_key(id)
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(id)
    }

    pub fn particle_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.particles.get_mut(id)
    }

    /// Returns the IDs of all live particles in insertion order.
    pub fn particle_ids(&self) -> &[ParticleId] {
        &self.order
    }

    /// Returns an iterator over all particles in insertion order.
    ///
    /// # Return
    ///
    /// An iterator yielding `(ParticleId, &Particle)` pairs.
    pub fn particles_iter(&self) -> impl Iterator<Item = (ParticleId, &Particle)> {
        self.order
            .iter()
            .filter_map(|&id| self.particles.get(id).map(|p| (id, p)))
    }

    /// Adds a particle to the box and appends it to the insertion order.
    ///
    /// # Arguments
    ///
    /// * `particle` - The particle to add. Its position is stored as given.
    ///
    /// # Return
    ///
    /// The ID assigned to the new particle.
    pub fn add_particle(&mut self, particle: Particle) -> ParticleId {
        let id = self.particles.insert(particle);
        self.order.push(id);
        id
    }

    /// Removes a particle from the box.
    ///
    /// The relative order of the remaining particles is preserved, so removing
    /// the most recently added particle restores the previous order exactly.
    ///
    /// # Arguments
    ///
    /// * `id` - The particle to remove.
    ///
    /// # Return
    ///
    /// Returns the removed particle, or `None` if it was not in this box.
    pub fn remove_particle(&mut self, id: ParticleId) -> Option<Particle> {
        let particle = self.particles.remove(id)?;
        if let Some(index) = self.order.iter().rposition(|&other| other == id) {
            self.order.remove(index);
        }
        Some(particle)
    }

    /// Draws a position uniformly inside the box.
    pub fn random_position(&self, rng: &mut impl Rng) -> Point3<f64> {
        Point3::new(
            rng.r#gen::<f64>() * self.lengths.x,
            rng.r#gen::<f64>() * self.lengths.y,
            rng.r#gen::<f64>() * self.lengths.z,
        )
    }

    /// Picks a live particle uniformly at random, or `None` if the box is empty.
    pub fn random_particle(&self, rng: &mut impl Rng) -> Option<ParticleId> {
        if self.order.is_empty() {
            return None;
        }
        Some(self.order[rng.gen_range(0..self.order.len())])
    }

    /// Maps a point back into the primary image `[0, L)` along every axis.
    pub fn wrap(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(point.coords.zip_map(&self.lengths, |x, l| x - l * (x / l).floor()))
    }

    /// Applies the minimum-image convention to a separation vector.
    pub fn minimum_image(&self, delta: &Vector3<f64>) -> Vector3<f64> {
        delta.zip_map(&self.lengths, |d, l| d - l * (d / l).round())
    }

    /// Resizes the box and scales every particle position affinely with it.
    ///
    /// Orientations are untouched.
    pub fn scale_to(&mut self, new_lengths: Vector3<f64>) {
        let factors = new_lengths.component_div(&self.lengths);
        for &id in &self.order {
            if let Some(particle) = self.particles.get_mut(id) {
                particle.position = Point3::from(particle.position.coords.component_mul(&factors));
            }
        }
        self.lengths = new_lengths;
    }

    /// Captures the box lengths and every particle position in insertion order.
    pub fn geometry(&self) -> (Vector3<f64>, Vec<(ParticleId, Point3<f64>)>) {
        let positions = self
            .particles_iter()
            .map(|(id, particle)| (id, particle.position))
            .collect();
        (self.lengths, positions)
    }

    /// Restores a geometry previously captured with [`SimBox::geometry`].
    ///
    /// # Return
    ///
    /// Returns the first particle ID that is no longer present, if any.
    pub fn restore_geometry(
        &mut self,
        lengths: Vector3<f64>,
        positions: &[(ParticleId, Point3<f64>)],
    ) -> Result<(), ParticleId> {
        self.lengths = lengths;
        for &(id, position) in positions {
            self.particles.get_mut(id).ok_or(id)?.position = position;
        }
        Ok(())
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn set_energy(&mut self, energy: f64) {
        self.energy = energy;
    }

    pub fn add_energy(&mut self, delta: f64) {
        self.energy += delta;
    }

    pub fn snapshot(&self) -> BoxSnapshot {
        BoxSnapshot {
            lengths: self.lengths,
            particles: self
                .particles_iter()
                .map(|(id, particle)| (id, particle.clone()))
                .collect(),
        }
    }

    /// Fills the box with `count` particles on a simple cubic lattice.
    ///
    /// Sites are centered in their lattice cells, so no two particles are closer
    /// than the smallest lattice spacing.
    ///
    /// # Return
    ///
    /// The IDs of the new particles in placement order.
    pub fn fill_lattice(&mut self, count: usize) -> Vec<ParticleId> {
        if count == 0 {
            return Vec::new();
        }
        let per_side = (count as f64).cbrt().ceil() as usize;
        let spacing = self.lengths / per_side as f64;

        let mut ids = Vec::with_capacity(count);
        'outer: for i in 0..per_side {
            for j in 0..per_side {
                for k in 0..per_side {
                    if ids.len() == count {
                        break 'outer;
                    }
                    let site = Point3::new(
                        (i as f64 + 0.5) * spacing.x,
                        (j as f64 + 0.5) * spacing.y,
                        (k as f64 + 0.5) * spacing.z,
                    );
                    ids.push(self.add_particle(Particle::new(site)));
                }
            }
        }
        ids
    }
}
