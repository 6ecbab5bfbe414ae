use crate::core::forcefield::energy::{HardSphere, IdealGas, LennardJones, Potential};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

fn check(condition: bool, name: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            name,
            reason: reason.into(),
        })
    }
}

/// Parameters of a move's adaptive step-size controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepSizeConfig {
    pub initial: f64,
    pub min: f64,
    pub max: f64,
    /// Trials between two adjustments.
    pub adjust_interval: u64,
    /// Relative change applied per adjustment.
    pub adjust_step: f64,
    /// Tuning switches itself off once damping shrinks `adjust_step` below this.
    pub min_adjust_step: f64,
    pub acceptance_target: f64,
    pub tunable: bool,
}

impl Default for StepSizeConfig {
    fn default() -> Self {
        Self {
            initial: 1.0,
            min: 0.0,
            max: f64::INFINITY,
            adjust_interval: 100,
            adjust_step: 0.05,
            min_adjust_step: 0.0,
            acceptance_target: 0.5,
            tunable: true,
        }
    }
}

impl StepSizeConfig {
    pub fn bounded(initial: f64, min: f64, max: f64) -> Self {
        Self {
            initial,
            min,
            max,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check(
            self.min.is_finite() && self.min >= 0.0,
            "min",
            format!("must be a finite, non-negative number, got {}", self.min),
        )?;
        check(
            self.min <= self.initial && self.initial <= self.max,
            "initial",
            format!(
                "must lie within [{}, {}], got {}",
                self.min, self.max, self.initial
            ),
        )?;
        check(self.adjust_interval > 0, "adjust_interval", "must be positive")?;
        check(
            self.adjust_step > 0.0 && self.adjust_step < 1.0,
            "adjust_step",
            format!("must lie in (0, 1), got {}", self.adjust_step),
        )?;
        check(
            self.min_adjust_step >= 0.0,
            "min_adjust_step",
            "must be non-negative",
        )?;
        check(
            self.acceptance_target > 0.0 && self.acceptance_target < 1.0,
            "acceptance_target",
            format!("must lie in (0, 1), got {}", self.acceptance_target),
        )
    }
}

/// How often the manager selects a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MoveConfig {
    pub frequency: u32,
    /// Multiply `frequency` by the live particle count of the move's box(es).
    pub per_particle: bool,
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            frequency: 100,
            per_particle: false,
        }
    }
}

impl MoveConfig {
    pub fn new(frequency: u32) -> Self {
        Self {
            frequency,
            per_particle: false,
        }
    }

    pub fn per_particle(frequency: u32) -> Self {
        Self {
            frequency,
            per_particle: true,
        }
    }
}

/// The admissible particle-number window `[fixed_n - max_delta_n, fixed_n + max_delta_n]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParticleWindow {
    pub fixed_n: usize,
    pub max_delta_n: usize,
}

impl ParticleWindow {
    pub fn new(fixed_n: usize, max_delta_n: usize) -> Self {
        Self {
            fixed_n,
            max_delta_n,
        }
    }

    pub fn min_n(&self) -> usize {
        self.fixed_n.saturating_sub(self.max_delta_n)
    }

    pub fn max_n(&self) -> usize {
        self.fixed_n + self.max_delta_n
    }

    pub fn contains(&self, n: usize) -> bool {
        (self.min_n()..=self.max_n()).contains(&n)
    }

    pub fn clamp(&self, n: usize) -> usize {
        n.clamp(self.min_n(), self.max_n())
    }
}

/// Grid of trial bias parameters used by the overlap estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlapConfig {
    pub num_alpha: usize,
    pub alpha_center: f64,
    /// Half-width of the grid in `ln(alpha)`.
    pub alpha_span: f64,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            num_alpha: 11,
            alpha_center: 1.0,
            alpha_span: 2.0,
        }
    }
}

impl OverlapConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(self.num_alpha >= 2, "num_alpha", "at least two grid points are required")?;
        check(
            self.alpha_center.is_finite() && self.alpha_center > 0.0,
            "alpha_center",
            format!("must be finite and positive, got {}", self.alpha_center),
        )?;
        check(
            self.alpha_span.is_finite() && self.alpha_span > 0.0,
            "alpha_span",
            format!("must be finite and positive, got {}", self.alpha_span),
        )
    }

    /// The log-spaced grid `ln a_i = ln center + span * (2i/(n-1) - 1)`.
    pub fn alpha_grid(&self) -> Vec<f64> {
        let last = (self.num_alpha - 1) as f64;
        let ln_center = self.alpha_center.ln();
        (0..self.num_alpha)
            .map(|i| (ln_center + self.alpha_span * (2.0 * i as f64 / last - 1.0)).exp())
            .collect()
    }
}

/// Slope used for the bias table above the sampled window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpperExtrapolation {
    /// Nominal chemical potential slope `mu / T`.
    #[default]
    ChemicalPotential,
    /// The last per-particle step computed inside the window.
    LastSlope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BiasUpdateConfig {
    /// Steps between two bias rebuilds.
    pub interval: u64,
    /// Extra `ln` penalty applied at the first particle number below the window.
    pub lower_wall: f64,
    pub upper: UpperExtrapolation,
}

impl Default for BiasUpdateConfig {
    fn default() -> Self {
        Self {
            interval: 10_000,
            lower_wall: 10.0,
            upper: UpperExtrapolation::default(),
        }
    }
}

impl BiasUpdateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(self.interval > 0, "interval", "must be positive")?;
        check(
            self.lower_wall.is_finite(),
            "lower_wall",
            format!("must be finite, got {}", self.lower_wall),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PotentialConfig {
    #[default]
    IdealGas,
    LennardJones { epsilon: f64, sigma: f64, cutoff: f64 },
    HardSphere { sigma: f64 },
}

impl PotentialConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::IdealGas => Ok(()),
            Self::LennardJones {
                epsilon,
                sigma,
                cutoff,
            } => {
                check(epsilon.is_finite(), "epsilon", "must be finite")?;
                check(sigma > 0.0, "sigma", "must be positive")?;
                check(cutoff > 0.0, "cutoff", "must be positive")
            }
            Self::HardSphere { sigma } => check(sigma > 0.0, "sigma", "must be positive"),
        }
    }

    pub fn build(&self) -> Box<dyn Potential> {
        match *self {
            Self::IdealGas => Box::new(IdealGas),
            Self::LennardJones {
                epsilon,
                sigma,
                cutoff,
            } => Box::new(LennardJones::new(epsilon, sigma, cutoff)),
            Self::HardSphere { sigma } => Box::new(HardSphere::new(sigma)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisplacementConfig {
    pub selection: MoveConfig,
    pub step: StepSizeConfig,
}

impl Default for DisplacementConfig {
    fn default() -> Self {
        Self {
            selection: MoveConfig::per_particle(1),
            step: StepSizeConfig::bounded(0.5, 0.0, 5.0),
        }
    }
}

/// Complete description of a biased grand-canonical sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrandCanonicalConfig {
    pub temperature: f64,
    pub chemical_potential: f64,
    pub box_lengths: [f64; 3],
    pub potential: PotentialConfig,
    pub window: ParticleWindow,
    pub insert_delete: MoveConfig,
    pub displacement: Option<DisplacementConfig>,
    pub overlap: OverlapConfig,
    pub bias_update: BiasUpdateConfig,
    pub equilibration_steps: u64,
    pub production_steps: u64,
    pub seed: u64,
}

impl GrandCanonicalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(
            self.temperature.is_finite() && self.temperature > 0.0,
            "temperature",
            format!("must be finite and positive, got {}", self.temperature),
        )?;
        check(
            self.chemical_potential.is_finite(),
            "chemical_potential",
            "must be finite",
        )?;
        check(
            self.box_lengths.iter().all(|l| l.is_finite() && *l > 0.0),
            "box_lengths",
            format!("all lengths must be finite and positive, got {:?}", self.box_lengths),
        )?;
        check(
            self.window.max_n() > self.window.min_n(),
            "window",
            "the window must span at least two particle numbers",
        )?;
        self.potential.validate()?;
        self.overlap.validate()?;
        self.bias_update.validate()?;
        if let Some(displacement) = &self.displacement {
            displacement.step.validate()?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct GrandCanonicalConfigBuilder {
    temperature: Option<f64>,
    chemical_potential: Option<f64>,
    box_lengths: Option<[f64; 3]>,
    potential: Option<PotentialConfig>,
    window: Option<ParticleWindow>,
    insert_delete: Option<MoveConfig>,
    displacement: Option<DisplacementConfig>,
    overlap: Option<OverlapConfig>,
    bias_update: Option<BiasUpdateConfig>,
    equilibration_steps: Option<u64>,
    production_steps: Option<u64>,
    seed: Option<u64>,
}

impl GrandCanonicalConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
    pub fn chemical_potential(mut self, mu: f64) -> Self {
        self.chemical_potential = Some(mu);
        self
    }
    pub fn box_lengths(mut self, lengths: [f64; 3]) -> Self {
        self.box_lengths = Some(lengths);
        self
    }
    pub fn potential(mut self, potential: PotentialConfig) -> Self {
        self.potential = Some(potential);
        self
    }
    pub fn window(mut self, window: ParticleWindow) -> Self {
        self.window = Some(window);
        self
    }
    pub fn insert_delete(mut self, selection: MoveConfig) -> Self {
        self.insert_delete = Some(selection);
        self
    }
    pub fn displacement(mut self, displacement: DisplacementConfig) -> Self {
        self.displacement = Some(displacement);
        self
    }
    pub fn overlap(mut self, overlap: OverlapConfig) -> Self {
        self.overlap = Some(overlap);
        self
    }
    pub fn bias_update(mut self, bias_update: BiasUpdateConfig) -> Self {
        self.bias_update = Some(bias_update);
        self
    }
    pub fn equilibration_steps(mut self, steps: u64) -> Self {
        self.equilibration_steps = Some(steps);
        self
    }
    pub fn production_steps(mut self, steps: u64) -> Self {
        self.production_steps = Some(steps);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<GrandCanonicalConfig, ConfigError> {
        let config = GrandCanonicalConfig {
            temperature: self
                .temperature
                .ok_or(ConfigError::MissingParameter("temperature"))?,
            chemical_potential: self
                .chemical_potential
                .ok_or(ConfigError::MissingParameter("chemical_potential"))?,
            box_lengths: self
                .box_lengths
                .ok_or(ConfigError::MissingParameter("box_lengths"))?,
            window: self.window.ok_or(ConfigError::MissingParameter("window"))?,
            potential: self.potential.unwrap_or_default(),
            insert_delete: self.insert_delete.unwrap_or_default(),
            displacement: self.displacement,
            overlap: self.overlap.unwrap_or_default(),
            bias_update: self.bias_update.unwrap_or_default(),
            equilibration_steps: self.equilibration_steps.unwrap_or(10_000),
            production_steps: self.production_steps.unwrap_or(100_000),
            seed: self.seed.unwrap_or(0),
        };
        config.validate()?;
        Ok(config)
    }
}
