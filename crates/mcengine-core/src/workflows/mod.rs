//! # Workflows Module
//!
//! High-level entry points that assemble a system, its moves and the bias
//! subsystem from a single configuration and drive a complete simulation.
//!
//! ## Overview
//!
//! A workflow owns the whole run: it validates the configuration, builds the
//! box and the potential, registers moves and listeners, runs equilibration
//! and production phases, and collects the results into a serializable report.
//! Progress is reported through [`crate::engine::progress::ProgressReporter`].
//!
//! - **Grand-Canonical Workflow** ([`grand_canonical`]) - Biased insertion/deletion
//!   sampling of a particle-number window with on-the-fly bias refinement.

pub mod grand_canonical;
