use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SplineError {
    #[error("At least two nodes are required, got {0}")]
    TooFewNodes(usize),
    #[error("Node arrays differ in length: {x} abscissae, {y} ordinates")]
    LengthMismatch { x: usize, y: usize },
    #[error("Abscissae must be strictly increasing (violated at node {0})")]
    NotIncreasing(usize),
}

/// Akima's locally weighted cubic interpolant.
///
/// Node slopes are weighted averages of the neighbouring secant slopes, so a
/// single outlier only bends the curve in its immediate neighbourhood. The end
/// intervals use two extrapolated secants on each side. Evaluation outside the
/// node range extends the first or last cubic piece.
#[derive(Debug, Clone)]
pub struct AkimaSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Derivative at each node.
    t: Vec<f64>,
}

impl AkimaSpline {
    /// Builds the spline through `(x[i], y[i])`.
    ///
    /// # Errors
    ///
    /// Returns [`SplineError`] if fewer than two nodes are given, the arrays differ
    /// in length, or `x` is not strictly increasing.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self, SplineError> {
        if x.len() != y.len() {
            return Err(SplineError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        let n = x.len();
        if n < 2 {
            return Err(SplineError::TooFewNodes(n));
        }
        if let Some(i) = (1..n).find(|&i| !(x[i] > x[i - 1])) {
            return Err(SplineError::NotIncreasing(i));
        }

        let secants: Vec<f64> = (0..n - 1)
            .map(|i| (y[i + 1] - y[i]) / (x[i + 1] - x[i]))
            .collect();

        let t = if n == 2 {
            vec![secants[0]; 2]
        } else {
            node_slopes(&secants)
        };

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            t,
        })
    }

    pub fn evaluate(&self, at: f64) -> f64 {
        let last = self.x.len() - 2;
        let i = self.x[1..=last].partition_point(|&node| node <= at);

        let h = self.x[i + 1] - self.x[i];
        let m = (self.y[i + 1] - self.y[i]) / h;
        let (t0, t1) = (self.t[i], self.t[i + 1]);
        let c2 = (3.0 * m - 2.0 * t0 - t1) / h;
        let c3 = (t0 + t1 - 2.0 * m) / (h * h);

        let dx = at - self.x[i];
        self.y[i] + dx * (t0 + dx * (c2 + dx * c3))
    }
}

/// Akima node derivatives from `n - 1 >= 2` secant slopes.
fn node_slopes(secants: &[f64]) -> Vec<f64> {
    let k = secants.len();
    // Two ghost secants on each side: m[-2], m[-1], m[0..k], m[k], m[k+1].
    let mut m = Vec::with_capacity(k + 4);
    let lead1 = 2.0 * secants[0] - secants[1];
    let lead2 = 2.0 * lead1 - secants[0];
    let trail1 = 2.0 * secants[k - 1] - secants[k - 2];
    let trail2 = 2.0 * trail1 - secants[k - 1];
    m.push(lead2);
    m.push(lead1);
    m.extend_from_slice(secants);
    m.push(trail1);
    m.push(trail2);

    (0..=k)
        .map(|i| {
            let (m_l2, m_l1, m_0, m_r1) = (m[i], m[i + 1], m[i + 2], m[i + 3]);
            let w_left = (m_r1 - m_0).abs();
            let w_right = (m_l1 - m_l2).abs();
            let total = w_left + w_right;
            if total == 0.0 {
                0.5 * (m_l1 + m_0)
            } else {
                (w_left * m_l1 + w_right * m_0) / total
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-10;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn reproduces_linear_data_exactly() {
        let x = [0.0, 1.0, 2.5, 3.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v - 1.0).collect();
        let spline = AkimaSpline::new(&x, &y).unwrap();
        for at in [-1.0, 0.3, 1.7, 2.9, 4.4, 6.0] {
            assert!(f64_approx_equal(spline.evaluate(at), 2.0 * at - 1.0));
        }
    }

    #[test]
    fn passes_through_every_node() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [0.0, 0.5, 3.0, 3.2, 2.0, 8.0];
        let spline = AkimaSpline::new(&x, &y).unwrap();
        for (xi, yi) in x.iter().zip(y.iter()) {
            assert!(f64_approx_equal(spline.evaluate(*xi), *yi));
        }
    }

    #[test]
    fn two_nodes_interpolate_linearly() {
        let spline = AkimaSpline::new(&[1.0, 3.0], &[2.0, 6.0]).unwrap();
        assert!(f64_approx_equal(spline.evaluate(2.0), 4.0));
        assert!(f64_approx_equal(spline.evaluate(4.0), 8.0));
    }

    #[test]
    fn flat_region_stays_flat_next_to_a_step() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let spline = AkimaSpline::new(&x, &y).unwrap();
        assert!(f64_approx_equal(spline.evaluate(0.5), 0.0));
        assert!(f64_approx_equal(spline.evaluate(4.5), 1.0));
    }

    #[test]
    fn rejects_degenerate_input() {
        assert_eq!(
            AkimaSpline::new(&[1.0], &[1.0]).unwrap_err(),
            SplineError::TooFewNodes(1)
        );
        assert_eq!(
            AkimaSpline::new(&[1.0, 2.0], &[1.0]).unwrap_err(),
            SplineError::LengthMismatch { x: 2, y: 1 }
        );
        assert_eq!(
            AkimaSpline::new(&[1.0, 1.0, 2.0], &[0.0, 1.0, 2.0]).unwrap_err(),
            SplineError::NotIncreasing(1)
        );
    }
}
