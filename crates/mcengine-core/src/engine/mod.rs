//! # Engine Module
//!
//! The Monte Carlo trial/acceptance engine: moves, their selection, adaptive
//! step sizes, the Metropolis driver and the particle-number bias subsystem.
//!
//! ## Overview
//!
//! One simulation step runs entirely inside [`integrator::IntegratorMc::do_step`]:
//!
//! ```text
//! MoveManager::select_move -> Move::do_trial -> Move::b, Move::a
//!   -> min(1, A exp(B/T)) -> AcceptanceTracker::update_counts
//!   -> Move::accept_notify | Move::reject_notify -> TrialEventBus -> StepActions
//! ```
//!
//! Everything is single-threaded and synchronous. Listeners see each trial
//! before the next one starts, and the only randomness comes from the explicit
//! [`SimRng`] owned by the integrator.
//!
//! ## Architecture
//!
//! - **Moves** ([`moves`]) - The [`moves::Move`] trait, exact inverse deltas and all variants
//! - **Step Sizes** ([`tracker`]) - Acceptance statistics and the damped step-size controller
//! - **Selection** ([`manager`]) - Weighted, optionally per-particle move selection
//! - **Events** ([`events`]) - Synchronous trial lifecycle notifications
//! - **Driver** ([`integrator`]) - The Metropolis loop and periodic step actions
//! - **Bias** ([`bias`]) - Bias table, overlap estimator and bias rebuild
//! - **Configuration** ([`config`]) - Serializable parameters with validation and builders
//! - **Progress Monitoring** ([`progress`]) - Progress callbacks for long-running workflows
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod bias;
pub mod config;
pub mod error;
pub mod events;
pub mod integrator;
pub mod manager;
pub mod moves;
pub mod progress;
pub mod tracker;

/// The random number generator threaded through every stochastic decision.
pub type SimRng = rand::rngs::StdRng;
