use super::overlap::OverlapListener;
use super::table::BiasTable;
use crate::core::models::ids::MoveId;
use crate::core::models::system::System;
use crate::engine::config::{BiasUpdateConfig, ConfigError, ParticleWindow, UpperExtrapolation};
use crate::engine::error::EngineError;
use crate::engine::integrator::StepAction;
use crate::engine::manager::MoveManager;
use crate::engine::moves::Move;
use crate::engine::moves::biased::BiasedInsertDeleteMove;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, instrument, warn};

/// Inputs of one bias rebuild.
#[derive(Debug, Clone, Copy)]
pub struct BiasRebuild<'a> {
    /// `ratios[n]` estimates `Q(n+1)/Q(n)`.
    pub ratios: &'a [f64],
    pub window: ParticleWindow,
    /// Particle number whose current bias value is kept.
    pub anchor: usize,
    /// `mu / T`.
    pub nominal_slope: f64,
    pub lower_wall: f64,
    pub upper: UpperExtrapolation,
}

/// Rebuilds `table` so that the biased walk is flat inside the window.
///
/// Inside the window `ln_bias[n+1] - ln_bias[n] = mu/T - ln(ratio[n])`, chained
/// outward from the anchor. Below the window every missing particle costs
/// `mu/T`, and the first step below additionally subtracts `lower_wall`. Above
/// the window the table stops at `max_n` and extends with the chosen slope.
/// NaN ratios propagate into the table.
///
/// # Return
///
/// The number of in-window steps that were NaN.
pub fn rebuild_bias(table: &mut BiasTable, rebuild: &BiasRebuild<'_>) -> usize {
    let window = rebuild.window;
    let (min_n, max_n) = (window.min_n(), window.max_n());
    let anchor = window.clamp(rebuild.anchor);
    let step = |n: usize| {
        let ratio = rebuild.ratios.get(n).copied().unwrap_or(f64::NAN);
        rebuild.nominal_slope - ratio.ln()
    };
    let nan_steps = (min_n..max_n).filter(|&n| step(n).is_nan()).count();

    let anchor_value = table.value(anchor);
    table.set(anchor, anchor_value);
    for n in anchor..max_n {
        let next = table.value(n) + step(n);
        table.set(n + 1, next);
    }
    for n in (min_n..anchor).rev() {
        let below = table.value(n + 1) - step(n);
        table.set(n, below);
    }
    for n in (0..min_n).rev() {
        let mut below = table.value(n + 1) - rebuild.nominal_slope;
        if n + 1 == min_n {
            below -= rebuild.lower_wall;
        }
        table.set(n, below);
    }

    table.truncate(max_n + 1);
    let slope = match rebuild.upper {
        UpperExtrapolation::ChemicalPotential => rebuild.nominal_slope,
        UpperExtrapolation::LastSlope if max_n > min_n => step(max_n - 1),
        UpperExtrapolation::LastSlope => rebuild.nominal_slope,
    };
    table.set_slope(slope);
    nan_steps
}

/// Periodically turns the overlap estimates into a new bias table for the
/// target [`BiasedInsertDeleteMove`].
#[derive(Debug)]
pub struct BiasAction {
    target: MoveId,
    overlap: Rc<RefCell<OverlapListener>>,
    config: BiasUpdateConfig,
}

impl BiasAction {
    pub fn new(
        target: MoveId,
        overlap: Rc<RefCell<OverlapListener>>,
        config: &BiasUpdateConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            target,
            overlap,
            config: config.clone(),
        })
    }

    pub fn target(&self) -> MoveId {
        self.target
    }

    /// Rebuilds the target move's bias, anchored at the live particle count.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MoveNotFound`] or [`EngineError::MoveTypeMismatch`]
    /// if the target is missing or is not a biased insertion/deletion move.
    #[instrument(skip_all, name = "bias_update")]
    pub fn update(&self, manager: &mut MoveManager, system: &System) -> Result<(), EngineError> {
        let ratios = self
            .overlap
            .try_borrow()
            .map_err(|_| EngineError::Internal("overlap estimator is borrowed".to_string()))?
            .ratios();

        let mv = manager
            .get_mut(self.target)
            .ok_or(EngineError::MoveNotFound(self.target))?;
        let name = mv.name().to_string();
        let anchor = mv.particle_count(system);
        let biased = mv
            .as_any_mut()
            .downcast_mut::<BiasedInsertDeleteMove>()
            .ok_or(EngineError::MoveTypeMismatch {
                name,
                expected: "biased insertion/deletion move",
            })?;

        let rebuild = BiasRebuild {
            ratios: &ratios,
            window: biased.window(),
            anchor,
            nominal_slope: biased.chemical_potential() / biased.temperature(),
            lower_wall: self.config.lower_wall,
            upper: self.config.upper,
        };
        let nan_steps = rebuild_bias(biased.bias_table_mut(), &rebuild);
        if nan_steps > 0 {
            warn!(
                nan_steps,
                "Bias table contains NaN entries; some particle-number pairs lack overlap samples"
            );
        }
        debug!(
            anchor,
            entries = biased.bias_table().len(),
            slope = biased.bias_table().slope(),
            "Rebuilt bias table"
        );
        Ok(())
    }
}

impl StepAction for BiasAction {
    fn name(&self) -> &str {
        "bias-update"
    }

    fn interval(&self) -> u64 {
        self.config.interval
    }

    fn perform(
        &mut self,
        _step: u64,
        system: &System,
        manager: &mut MoveManager,
    ) -> Result<(), EngineError> {
        self.update(manager, system)
    }
}
