use nalgebra::{Unit, UnitQuaternion, Vector3};
use rand::Rng;
use rand_distr::{Distribution, UnitSphere};

pub fn random_unit_vector(rng: &mut impl Rng) -> Unit<Vector3<f64>> {
    let [x, y, z]: [f64; 3] = UnitSphere.sample(rng);
    Unit::new_normalize(Vector3::new(x, y, z))
}

/// Draws a rotation about a uniformly random axis with an angle uniform in
/// `[-max_angle, max_angle)`.
pub fn random_rotation(rng: &mut impl Rng, max_angle: f64) -> UnitQuaternion<f64> {
    let axis = random_unit_vector(rng);
    let angle = max_angle * (2.0 * rng.r#gen::<f64>() - 1.0);
    UnitQuaternion::from_axis_angle(&axis, angle)
}

/// Draws a displacement with every component uniform in `[-max, max)`.
pub fn random_displacement(rng: &mut impl Rng, max: f64) -> Vector3<f64> {
    Vector3::from_fn(|_, _| max * (2.0 * rng.r#gen::<f64>() - 1.0))
}
