//! # Forcefield Module
//!
//! Reference energy evaluators consumed by the trial moves.
//!
//! ## Overview
//!
//! Every move computes `u_old` and `u_new` through the [`energy::Potential`] trait,
//! either for a single particle or for a whole box. The pair functions in
//! [`potentials`] follow a common convention: a coincident or overlapping pair
//! returns a very large (or infinite) energy instead of an error, and anything at
//! or above [`potentials::OVERLAP_THRESHOLD`] counts as a physical overlap whose
//! Boltzmann factor saturates to zero.
//!
//! ## Key Components
//!
//! - [`potentials`] - Inline pair functions and the overlap sentinel
//! - [`energy`] - The `Potential` trait and the `IdealGas`, `LennardJones` and `HardSphere` models

pub mod energy;
pub mod potentials;
