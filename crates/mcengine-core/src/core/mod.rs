//! # Core Module
//!
//! This module provides the collaborators the Monte Carlo engine operates on:
//! particle containers, energy evaluators and numerical utilities.
//!
//! ## Overview
//!
//! Nothing in `core` knows about trials, acceptance or bias. It offers the
//! container mutation API (add/remove, translate/rotate, rescale, random position,
//! periodic wrapping), a scalar energy evaluator, and the interpolation routine
//! used by the overlap estimator.
//!
//! ## Architecture
//!
//! - **Configuration Representation** ([`models`]) - Particles, periodic boxes and the system that owns them
//! - **Energy Evaluation** ([`forcefield`]) - Pair potentials and the `Potential` trait
//! - **Numerical Utilities** ([`utils`]) - Random geometry and Akima spline interpolation
//!
//! ## Key Capabilities
//!
//! - **Stable particle identities** through slot-map keys that survive removals
//! - **Bit-exact geometry capture and restore** for reversible trial moves
//! - **Overlap-aware energies** that saturate instead of failing

pub mod forcefield;
pub mod models;
pub mod utils;
