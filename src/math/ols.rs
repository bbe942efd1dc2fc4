//! Ordinary least squares.
//!
//! Trend lines are fitted as `y_i = a + b * i` over the 0-based row index.
//! The design matrix is tall (n × 2), so we solve through SVD rather than a
//! square-system decomposition; SVD also returns the minimum-norm solution
//! for the rank-deficient single-row case (`b = 0`, `a = y_0`).

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Straight line over the row index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearFit {
    pub fn predict(&self, index: usize) -> f64 {
        self.intercept + self.slope * index as f64
    }

    /// Fitted values for indices `0..n`.
    pub fn fitted(&self, n: usize) -> Vec<f64> {
        (0..n).map(|i| self.predict(i)).collect()
    }
}

/// Fit `values[i] ≈ intercept + slope * i`.
pub fn fit_linear_trend(values: &[f64]) -> Option<LinearFit> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let n = values.len();
    let x = DMatrix::from_fn(n, 2, |row, col| if col == 0 { 1.0 } else { row as f64 });
    let y = DVector::from_column_slice(values);

    let beta = solve_least_squares(&x, &y)?;
    Some(LinearFit {
        intercept: beta[0],
        slope: beta[1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn linear_trend_recovers_ramp() {
        let values: Vec<f64> = (10..100).map(f64::from).collect();
        let fit = fit_linear_trend(&values).unwrap();
        assert!((fit.intercept - 10.0).abs() < 1e-8);
        assert!((fit.slope - 1.0).abs() < 1e-10);
        assert!((fit.predict(89) - 99.0).abs() < 1e-8);
    }

    #[test]
    fn single_point_is_flat() {
        let fit = fit_linear_trend(&[4.0]).unwrap();
        assert!((fit.intercept - 4.0).abs() < 1e-10);
        assert!(fit.slope.abs() < 1e-10);
    }

    #[test]
    fn rejects_empty_or_non_finite() {
        assert!(fit_linear_trend(&[]).is_none());
        assert!(fit_linear_trend(&[1.0, f64::NAN]).is_none());
    }
}
