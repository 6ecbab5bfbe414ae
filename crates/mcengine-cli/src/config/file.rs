use crate::error::{CliError, Result};
use mcengine::engine::config as core_config;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileUpperExtrapolation {
    ChemicalPotential,
    LastSlope,
}

impl From<FileUpperExtrapolation> for core_config::UpperExtrapolation {
    fn from(p: FileUpperExtrapolation) -> Self {
        match p {
            FileUpperExtrapolation::ChemicalPotential => Self::ChemicalPotential,
            FileUpperExtrapolation::LastSlope => Self::LastSlope,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "type", deny_unknown_fields)]
pub enum FilePotential {
    IdealGas,
    LennardJones { epsilon: f64, sigma: f64, cutoff: f64 },
    HardSphere { sigma: f64 },
}

impl From<FilePotential> for core_config::PotentialConfig {
    fn from(p: FilePotential) -> Self {
        match p {
            FilePotential::IdealGas => Self::IdealGas,
            FilePotential::LennardJones {
                epsilon,
                sigma,
                cutoff,
            } => Self::LennardJones {
                epsilon,
                sigma,
                cutoff,
            },
            FilePotential::HardSphere { sigma } => Self::HardSphere { sigma },
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSystemConfig {
    pub temperature: Option<f64>,
    pub chemical_potential: Option<f64>,
    pub box_lengths: Option<[f64; 3]>,
    pub potential: Option<FilePotential>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileWindowConfig {
    pub fixed_n: Option<usize>,
    pub max_delta_n: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileInsertDeleteConfig {
    pub frequency: Option<u32>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileDisplacementConfig {
    pub enabled: Option<bool>,
    pub frequency: Option<u32>,
    pub per_particle: Option<bool>,
    pub initial_step: Option<f64>,
    pub min_step: Option<f64>,
    pub max_step: Option<f64>,
    pub adjust_interval: Option<u64>,
    pub acceptance_target: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileMovesConfig {
    pub insert_delete: Option<FileInsertDeleteConfig>,
    pub displacement: Option<FileDisplacementConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileOverlapConfig {
    pub num_alpha: Option<usize>,
    pub alpha_center: Option<f64>,
    pub alpha_span: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileBiasConfig {
    pub update_interval: Option<u64>,
    pub lower_wall: Option<f64>,
    pub upper_extrapolation: Option<FileUpperExtrapolation>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileRunConfig {
    pub equilibration_steps: Option<u64>,
    pub production_steps: Option<u64>,
    pub seed: Option<u64>,
}

/// The on-disk configuration, with every value optional.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub system: Option<FileSystemConfig>,
    pub window: Option<FileWindowConfig>,
    pub moves: Option<FileMovesConfig>,
    pub overlap: Option<FileOverlapConfig>,
    pub bias: Option<FileBiasConfig>,
    pub run: Option<FileRunConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
