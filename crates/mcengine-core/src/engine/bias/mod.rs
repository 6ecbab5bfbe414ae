//! # Bias Module
//!
//! Particle-number bias for the biased insertion/deletion move.
//!
//! - [`table`] - The per-particle-number `ln_bias` table with linear extension
//! - [`overlap`] - Overlap-sampling estimator of adjacent free-energy ratios
//! - [`action`] - Periodic rebuild of the table from the estimated ratios
//!
//! The three pieces form a feedback loop driven by the integrator: the
//! estimator listens to trial events, the action runs every few thousand steps,
//! and the move reads the rebuilt table on its next trial.

pub mod action;
pub mod overlap;
pub mod table;
