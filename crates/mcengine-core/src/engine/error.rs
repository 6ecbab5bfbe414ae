use super::config::ConfigError;
use crate::core::models::ids::{BoxId, MoveId, ParticleId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Box not found in system: {0:?}")]
    BoxNotFound(BoxId),

    #[error("Particle {particle:?} not found in box {box_id:?}")]
    ParticleNotFound {
        box_id: BoxId,
        particle: ParticleId,
    },

    #[error("Move not registered with the manager: {0:?}")]
    MoveNotFound(MoveId),

    #[error("Move '{name}' was asked for a new trial before the previous one was resolved")]
    TrialInProgress { name: String },

    #[error("Move '{name}' has no pending trial to resolve")]
    NoPendingTrial { name: String },

    #[error("No move has a positive effective frequency")]
    NoSelectableMoves,

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Move '{name}' is not a {expected}")]
    MoveTypeMismatch {
        name: String,
        expected: &'static str,
    },

    #[error("Fatal inconsistency while committing '{name}': {reason}")]
    FatalInconsistency { name: String, reason: String },

    #[error("Failed to export bias table: {0}")]
    Export(#[from] csv::Error),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
