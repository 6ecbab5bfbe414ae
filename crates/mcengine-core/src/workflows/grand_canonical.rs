use crate::core::forcefield::potentials::is_overlap;
use crate::core::models::ids::{BoxId, MoveId};
use crate::core::models::sim_box::SimBox;
use crate::core::models::system::System;
use crate::engine::bias::action::BiasAction;
use crate::engine::bias::overlap::OverlapListener;
use crate::engine::bias::table::BiasTable;
use crate::engine::config::GrandCanonicalConfig;
use crate::engine::error::EngineError;
use crate::engine::integrator::{IntegratorMc, StepTally};
use crate::engine::manager::MoveManager;
use crate::engine::moves::Move;
use crate::engine::moves::biased::BiasedInsertDeleteMove;
use crate::engine::moves::displacement::DisplacementMove;
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::Vector3;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{info, instrument, warn};

/// Acceptance statistics of one registered move over the production phase.
#[derive(Debug, Clone, Serialize)]
pub struct MoveSummary {
    pub name: String,
    pub selections: u64,
    pub trials: u64,
    pub accepted: u64,
    pub acceptance_ratio: Option<f64>,
    pub mean_acceptance_probability: Option<f64>,
    pub step_size: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrandCanonicalResult {
    /// Estimated `Q(N+1)/Q(N)` for every sampled pair.
    pub ratios: Vec<f64>,
    /// Production-phase visits per particle number.
    pub n_histogram: Vec<u64>,
    pub mean_particles: f64,
    pub mean_energy: f64,
    pub final_particles: usize,
    /// Final bias table, stored for `N = 0..=max_n`.
    pub bias: BiasTable,
    pub equilibration: StepTally,
    pub production: StepTally,
    pub moves: Vec<MoveSummary>,
}

/// Accumulates production-phase observables.
#[derive(Debug, Default)]
struct Sampler {
    histogram: Vec<u64>,
    samples: u64,
    particle_sum: f64,
    energy_sum: f64,
}

impl Sampler {
    fn observe(&mut self, sim_box: &SimBox) {
        let n = sim_box.len();
        if self.histogram.len() <= n {
            self.histogram.resize(n + 1, 0);
        }
        self.histogram[n] += 1;
        self.samples += 1;
        self.particle_sum += n as f64;
        self.energy_sum += sim_box.energy();
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.samples == 0 {
            f64::NAN
        } else {
            sum / self.samples as f64
        }
    }
}

/// Runs a biased grand-canonical simulation of one periodic box.
///
/// The box starts with `window.fixed_n` particles on a cubic lattice. The
/// biased insertion/deletion move samples the particle-number window while the
/// overlap estimator and the periodic bias rebuild flatten the walk across it.
/// Step sizes are tuned during equilibration and frozen for production.
#[instrument(skip_all, name = "grand_canonical_workflow")]
pub fn run(
    config: &GrandCanonicalConfig,
    reporter: &ProgressReporter,
) -> Result<GrandCanonicalResult, EngineError> {
    // === Phase 0: Setup ===
    reporter.report(Progress::PhaseStart { name: "Setup" });
    config.validate()?;
    info!(
        temperature = config.temperature,
        mu = config.chemical_potential,
        fixed_n = config.window.fixed_n,
        max_delta_n = config.window.max_delta_n,
        "Setting up grand-canonical run."
    );

    let (system, box_id) = build_system(config);
    let mut integrator =
        IntegratorMc::new(system, MoveManager::new(), config.temperature, config.seed)?;
    if let Some(displacement) = &config.displacement {
        integrator.add_move(
            DisplacementMove::new(box_id, &displacement.step)?,
            displacement.selection,
        );
    }
    let biased_id = integrator.add_move(
        BiasedInsertDeleteMove::new(
            box_id,
            config.chemical_potential,
            config.temperature,
            config.window,
        ),
        config.insert_delete,
    );

    let overlap = Rc::new(RefCell::new(OverlapListener::new(
        biased_id,
        &config.overlap,
    )?));
    integrator.subscribe(Rc::clone(&overlap) as _);
    integrator.add_action(BiasAction::new(
        biased_id,
        Rc::clone(&overlap),
        &config.bias_update,
    )?);
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Equilibration ===
    reporter.report(Progress::PhaseStart {
        name: "Equilibration",
    });
    info!(steps = config.equilibration_steps, "Starting equilibration.");
    integrator.set_equilibrating(true);
    let equilibration = integrator.run(config.equilibration_steps, reporter, |_, _| {})?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Production ===
    reporter.report(Progress::PhaseStart { name: "Production" });
    info!(steps = config.production_steps, "Starting production.");
    integrator.set_equilibrating(false);
    integrator.manager_mut().reset_statistics();
    let mut sampler = Sampler::default();
    let production = integrator.run(config.production_steps, reporter, |_, system| {
        if let Some(sim_box) = system.sim_box(box_id) {
            sampler.observe(sim_box);
        }
    })?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Results ===
    let result = finalize(
        &integrator,
        &overlap.borrow(),
        biased_id,
        box_id,
        sampler,
        equilibration,
        production,
    )?;
    info!(
        final_particles = result.final_particles,
        mean_particles = result.mean_particles,
        "Workflow complete."
    );
    Ok(result)
}

fn build_system(config: &GrandCanonicalConfig) -> (System, BoxId) {
    let mut system = System::with_potential(config.potential.build());
    let mut sim_box = SimBox::new(Vector3::from(config.box_lengths));
    sim_box.fill_lattice(config.window.fixed_n);
    let box_id = system.add_box(sim_box);

    if let Some(energy) = system.sim_box(box_id).map(SimBox::energy) {
        if is_overlap(energy) {
            warn!(
                energy,
                "Initial lattice overlaps; the box may be too dense for the chosen potential."
            );
        }
    }
    (system, box_id)
}

fn finalize(
    integrator: &IntegratorMc,
    overlap: &OverlapListener,
    biased_id: MoveId,
    box_id: BoxId,
    sampler: Sampler,
    equilibration: StepTally,
    production: StepTally,
) -> Result<GrandCanonicalResult, EngineError> {
    let manager = integrator.manager();
    let mv = manager
        .get(biased_id)
        .ok_or(EngineError::MoveNotFound(biased_id))?;
    let biased = mv
        .as_any()
        .downcast_ref::<BiasedInsertDeleteMove>()
        .ok_or_else(|| EngineError::MoveTypeMismatch {
            name: mv.name().to_string(),
            expected: "biased insertion/deletion move",
        })?;

    let moves = manager
        .iter()
        .map(|(_, entry)| {
            let tracker = entry.mcmove().tracker();
            MoveSummary {
                name: entry.mcmove().name().to_string(),
                selections: entry.selection_count(),
                trials: tracker.n_trials(),
                accepted: tracker.n_accept(),
                acceptance_ratio: tracker.acceptance_ratio(),
                mean_acceptance_probability: tracker.mean_chi(),
                step_size: tracker.step_size(),
            }
        })
        .collect();

    let final_particles = integrator
        .system()
        .sim_box(box_id)
        .ok_or(EngineError::BoxNotFound(box_id))?
        .len();

    Ok(GrandCanonicalResult {
        bias: biased.bias_table().clone(),
        ratios: overlap.ratios(),
        mean_particles: sampler.mean(sampler.particle_sum),
        mean_energy: sampler.mean(sampler.energy_sum),
        n_histogram: sampler.histogram,
        final_particles,
        equilibration,
        production,
        moves,
    })
}
