/// Energy returned for a pair that sits on top of each other.
pub const OVERLAP_ENERGY: f64 = 1e10;

/// Energies at or above this value are treated as a physical overlap.
pub const OVERLAP_THRESHOLD: f64 = 1e8;

#[inline]
pub fn lennard_jones_12_6(dist_sq: f64, sigma: f64, epsilon: f64) -> f64 {
    if dist_sq < 1e-12 {
        return OVERLAP_ENERGY;
    }
    let s2 = sigma * sigma / dist_sq;
    let s6 = s2 * s2 * s2;
    4.0 * epsilon * (s6 * s6 - s6)
}

#[inline]
pub fn hard_sphere(dist_sq: f64, sigma: f64) -> f64 {
    if dist_sq < sigma * sigma {
        f64::INFINITY
    } else {
        0.0
    }
}

#[inline]
pub fn is_overlap(energy: f64) -> bool {
    energy >= OVERLAP_THRESHOLD
}
