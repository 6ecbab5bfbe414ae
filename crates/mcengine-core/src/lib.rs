//! # mcengine
//!
//! A Monte Carlo trial/acceptance engine for particle simulations in periodic
//! boxes, with adaptive step sizes and flat-histogram particle-number biasing.
//!
//! ## Architectural Philosophy
//!
//! The library keeps three layers with a one-way dependency between them.
//!
//! - **[`core`]: The Foundation.** Particles, boxes and the [`core::models::system::System`]
//!   that owns them, pair potentials with energy bookkeeping, and small numeric
//!   utilities such as periodic geometry and Akima interpolation.
//!
//! - **[`engine`]: The Logic Core.** The [`engine::moves::Move`] trait and its
//!   variants, acceptance statistics and step-size control, weighted move
//!   selection, the Metropolis integrator with its trial events, and the
//!   overlap-sampling bias subsystem.
//!
//! - **[`workflows`]: The Public API.** Complete simulations assembled from a
//!   single configuration, such as biased grand-canonical sampling.

pub mod core;
pub mod engine;
pub mod workflows;
