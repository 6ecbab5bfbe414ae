//! # Core Models Module
//!
//! Data structures for the configurations sampled by the engine.
//!
//! ## Overview
//!
//! A [`system::System`] owns one or more periodic [`sim_box::SimBox`] containers and
//! the energy evaluator shared by all of them. Boxes own their
//! [`particle::Particle`]s and expose exactly the mutation API trial moves need:
//! add/remove a particle, translate or rotate it, rescale the box, draw random
//! positions, and apply periodic wrapping.
//!
//! ## Key Components
//!
//! - [`ids`] - Slot-map key types for particles, boxes and moves
//! - [`particle`] - Rigid-body particle with position and orientation
//! - [`sim_box`] - Orthorhombic periodic container with bookkeeping energy
//! - [`system`] - The set of boxes plus the energy evaluator
//!
//! ## Usage
//!
//! ```ignore
//! use mcengine::core::forcefield::energy::LennardJones;
//! use mcengine::core::models::{sim_box::SimBox, system::System};
//!
//! let mut system = System::new(LennardJones::new(1.0, 1.0, 2.5));
//! let mut sim_box = SimBox::cubic(10.0);
//! sim_box.fill_lattice(64);
//! let box_id = system.add_box(sim_box);
//! ```

pub mod ids;
pub mod particle;
pub mod sim_box;
pub mod system;
