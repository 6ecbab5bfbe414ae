use nalgebra::{Point3, UnitQuaternion};

/// A rigid body tracked by a simulation box.
///
/// Point-like species simply never have their orientation touched; moves that
/// rotate bodies operate on `orientation` and leave `position` alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Particle {
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            orientation: UnitQuaternion::identity(),
        }
    }

    pub fn with_orientation(position: Point3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }
}
