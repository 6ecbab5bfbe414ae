use crate::core::models::ids::{BoxId, ParticleId};
use crate::core::models::system::System;
use crate::engine::error::EngineError;
use nalgebra::{Point3, UnitQuaternion, Vector3};

/// An exact description of how to undo one trial perturbation.
///
/// Every move produces one of these while proposing its trial, and rejection
/// does nothing but apply it. Values are stored, never recomputed, so applying
/// the delta restores the pre-trial state bit for bit.
#[derive(Debug, Clone, PartialEq)]
pub enum InverseDelta {
    /// The trial left the configuration untouched until acceptance.
    Nothing,
    Position {
        box_id: BoxId,
        particle: ParticleId,
        position: Point3<f64>,
    },
    Orientation {
        box_id: BoxId,
        particle: ParticleId,
        orientation: UnitQuaternion<f64>,
    },
    /// Box lengths and every particle position captured before a rescale.
    Geometry {
        box_id: BoxId,
        lengths: Vector3<f64>,
        positions: Vec<(ParticleId, Point3<f64>)>,
    },
    /// Removes a particle that the trial inserted.
    RemoveParticle { box_id: BoxId, particle: ParticleId },
    SwapConfigurations { first: BoxId, second: BoxId },
    /// Several deltas, undone in reverse order.
    Compound(Vec<InverseDelta>),
}

impl InverseDelta {
    pub fn revert(self, system: &mut System) -> Result<(), EngineError> {
        match self {
            Self::Nothing => Ok(()),
            Self::Position {
                box_id,
                particle,
                position,
            } => {
                let sim_box = system
                    .sim_box_mut(box_id)
                    .ok_or(EngineError::BoxNotFound(box_id))?;
                sim_box
                    .particle_mut(particle)
                    .ok_or(EngineError::ParticleNotFound { box_id, particle })?
                    .position = position;
                Ok(())
            }
            Self::Orientation {
                box_id,
                particle,
                orientation,
            } => {
                let sim_box = system
                    .sim_box_mut(box_id)
                    .ok_or(EngineError::BoxNotFound(box_id))?;
                sim_box
                    .particle_mut(particle)
                    .ok_or(EngineError::ParticleNotFound { box_id, particle })?
                    .orientation = orientation;
                Ok(())
            }
            Self::Geometry {
                box_id,
                lengths,
                positions,
            } => system
                .sim_box_mut(box_id)
                .ok_or(EngineError::BoxNotFound(box_id))?
                .restore_geometry(lengths, &positions)
                .map_err(|particle| EngineError::ParticleNotFound { box_id, particle }),
            Self::RemoveParticle { box_id, particle } => {
                system
                    .sim_box_mut(box_id)
                    .ok_or(EngineError::BoxNotFound(box_id))?
                    .remove_particle(particle)
                    .ok_or(EngineError::ParticleNotFound { box_id, particle })?;
                Ok(())
            }
            Self::SwapConfigurations { first, second } => {
                if system.swap_configurations(first, second) {
                    Ok(())
                } else {
                    Err(EngineError::Internal(format!(
                        "Cannot swap configurations of {:?} and {:?}",
                        first, second
                    )))
                }
            }
            Self::Compound(deltas) => {
                for delta in deltas.into_iter().rev() {
                    delta.revert(system)?;
                }
                Ok(())
            }
        }
    }
}
