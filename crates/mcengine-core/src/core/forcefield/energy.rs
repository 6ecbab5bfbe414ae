use super::potentials;
use crate::core::models::ids::ParticleId;
use crate::core::models::sim_box::SimBox;
use std::fmt;

/// Selects which part of a box's configuration an energy evaluation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyTarget {
    /// Every pair interaction in the box.
    All,
    /// All interactions between one particle and the rest of the box.
    Particle(ParticleId),
}

/// An energy evaluator for the configurations held in a [`SimBox`].
///
/// Implementors only need to supply a pair function; the provided methods sum it
/// under the minimum-image convention. Evaluators that know the answer without a
/// pair sum (for example an ideal gas) override the provided methods directly.
pub trait Potential: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Interaction energy of a pair separated by `sqrt(dist_sq)`.
    fn pair_energy(&self, dist_sq: f64) -> f64;

    /// Squared distance beyond which pairs do not interact.
    fn cutoff_sq(&self) -> f64 {
        f64::INFINITY
    }

    fn scalar_energy(&self, sim_box: &SimBox, target: EnergyTarget) -> f64 {
        match target {
            EnergyTarget::All => self.total_energy(sim_box),
            EnergyTarget::Particle(id) => self.particle_energy(sim_box, id),
        }
    }

    /// Energy of one particle with every other particle in the box.
    ///
    /// Returns zero for a particle that is not in the box.
    fn particle_energy(&self, sim_box: &SimBox, id: ParticleId) -> f64 {
        let Some(center) = sim_box.particle(id) else {
            return 0.0;
        };
        let cutoff_sq = self.cutoff_sq();
        sim_box
            .particles_iter()
            .filter(|&(other_id, _)| other_id != id)
            .map(|(_, other)| {
                let d = sim_box.minimum_image(&(other.position - center.position));
                let dist_sq = d.norm_squared();
                if dist_sq < cutoff_sq {
                    self.pair_energy(dist_sq)
                } else {
                    0.0
                }
            })
            .sum()
    }

    fn total_energy(&self, sim_box: &SimBox) -> f64 {
        let cutoff_sq = self.cutoff_sq();
        let particles: Vec<_> = sim_box.particles_iter().map(|(_, p)| p.position).collect();
        let mut total = 0.0;
        for (i, a) in particles.iter().enumerate() {
            for b in &particles[i + 1..] {
                let dist_sq = sim_box.minimum_image(&(b - a)).norm_squared();
                if dist_sq < cutoff_sq {
                    total += self.pair_energy(dist_sq);
                }
            }
        }
        total
    }
}

/// Non-interacting particles; every configuration has zero energy.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdealGas;

impl Potential for IdealGas {
    fn name(&self) -> &'static str {
        "ideal-gas"
    }

    fn pair_energy(&self, _dist_sq: f64) -> f64 {
        0.0
    }

    fn particle_energy(&self, _sim_box: &SimBox, _id: ParticleId) -> f64 {
        0.0
    }

    fn total_energy(&self, _sim_box: &SimBox) -> f64 {
        0.0
    }
}

/// Truncated (unshifted) 12-6 Lennard-Jones fluid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJones {
    pub epsilon: f64,
    pub sigma: f64,
    pub cutoff: f64,
}

impl LennardJones {
    pub fn new(epsilon: f64, sigma: f64, cutoff: f64) -> Self {
        Self {
            epsilon,
            sigma,
            cutoff,
        }
    }
}

impl Potential for LennardJones {
    fn name(&self) -> &'static str {
        "lennard-jones"
    }

    fn pair_energy(&self, dist_sq: f64) -> f64 {
        potentials::lennard_jones_12_6(dist_sq, self.sigma, self.epsilon)
    }

    fn cutoff_sq(&self) -> f64 {
        self.cutoff * self.cutoff
    }
}

/// Hard spheres of diameter `sigma`; overlapping pairs have infinite energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardSphere {
    pub sigma: f64,
}

impl HardSphere {
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }
}

impl Potential for HardSphere {
    fn name(&self) -> &'static str {
        "hard-sphere"
    }

    fn pair_energy(&self, dist_sq: f64) -> f64 {
        potentials::hard_sphere(dist_sq, self.sigma)
    }

    fn cutoff_sq(&self) -> f64 {
        self.sigma * self.sigma
    }
}
