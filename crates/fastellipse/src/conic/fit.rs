//! Direct least-squares ellipse fitting (Fitzgibbon et al., 1999).

use nalgebra::{Cholesky, DMatrix, Matrix6, SymmetricEigen, Vector6};

use super::types::{ConicCoeffs, EllipseParams};
use crate::error::FitError;

/// Relative ridge added to the scatter matrix so the Cholesky factor exists
/// for exactly sampled or very short point sets.
const SCATTER_RIDGE: f64 = 1e-13;

/// The ellipse eigenvalue must exceed this fraction of the largest
/// eigenvalue magnitude; smaller ones belong to the null space of C.
const EIGEN_REL_ZERO: f64 = 1e-12;

/// Fit a general conic to `points` under the ellipse constraint
/// B² − 4AC < 0.
///
/// The generalized problem S a = λ C a is reduced through the Cholesky
/// factor S = L Lᵀ to the symmetric problem L⁻¹ C L⁻ᵀ v = μ v. C has
/// inertia (1 negative, 2 positive, 3 zero), so the ellipse solution is the
/// smallest μ. The three null-space μ only carry rounding noise of either
/// sign and are not ordered.
///
/// The returned coefficients are scaled to unit norm with A + C > 0.
pub fn fit_conic_direct(points: &[[f64; 2]]) -> Result<ConicCoeffs, FitError> {
    let n = points.len();
    if n < 6 {
        return Err(FitError::InsufficientGeometry);
    }

    let ([mean_x, mean_y], scale) = normalization_params(points);

    let mut d = DMatrix::<f64>::zeros(n, 6);
    for (i, &[px, py]) in points.iter().enumerate() {
        let x = (px - mean_x) * scale;
        let y = (py - mean_y) * scale;
        d[(i, 0)] = x * x;
        d[(i, 1)] = x * y;
        d[(i, 2)] = y * y;
        d[(i, 3)] = x;
        d[(i, 4)] = y;
        d[(i, 5)] = 1.0;
    }

    let mut s: Matrix6<f64> = (d.transpose() * &d).fixed_view::<6, 6>(0, 0).into_owned();
    let ridge = SCATTER_RIDGE * s.trace();
    for i in 0..6 {
        s[(i, i)] += ridge;
    }

    let l = Cholesky::new(s).ok_or(FitError::SingularMatrix)?.l();
    let l_inv = l.try_inverse().ok_or(FitError::SingularMatrix)?;

    // aᵀ C a = B² − 4AC
    let mut c = Matrix6::<f64>::zeros();
    c[(0, 2)] = -2.0;
    c[(2, 0)] = -2.0;
    c[(1, 1)] = 1.0;

    let system = l_inv * c * l_inv.transpose();
    let system = (system + system.transpose()) * 0.5;
    let eigen = SymmetricEigen::new(system);

    let k = eigen.eigenvalues.imin();
    let mu = eigen.eigenvalues[k];
    if mu.is_nan() || mu >= -EIGEN_REL_ZERO * eigen.eigenvalues.amax() {
        return Err(FitError::DegenerateConic);
    }

    let v: Vector6<f64> = eigen.eigenvectors.column(k).into_owned();
    let sol = l_inv.transpose() * v;
    let norm = sol.norm();
    if !norm.is_finite() || norm == 0.0 {
        return Err(FitError::DegenerateConic);
    }
    let sol = sol / norm;

    let conic = ConicCoeffs(denormalize_conic(&sol, [mean_x, mean_y], scale)).with_positive_trace();
    if !conic.is_ellipse() {
        return Err(FitError::DegenerateConic);
    }
    Ok(conic)
}

/// Fit an ellipse and return geometric parameters with `a >= b`.
pub fn fit_ellipse_direct(points: &[[f64; 2]]) -> Result<EllipseParams, FitError> {
    let ellipse = fit_conic_direct(points)?.to_ellipse()?;
    if !ellipse.is_finite() {
        return Err(FitError::DegenerateConic);
    }
    Ok(ellipse)
}

/// Point-set centroid and the isotropic scale that maps the mean distance
/// from it to √2.
pub(crate) fn normalization_params(points: &[[f64; 2]]) -> ([f64; 2], f64) {
    let inv_n = 1.0 / points.len() as f64;
    let centroid = points
        .iter()
        .fold([0.0, 0.0], |acc, p| [acc[0] + p[0], acc[1] + p[1]]);
    let centroid = [centroid[0] * inv_n, centroid[1] * inv_n];

    let spread = points
        .iter()
        .map(|p| (p[0] - centroid[0]).hypot(p[1] - centroid[1]))
        .sum::<f64>()
        * inv_n;

    let scale = if spread > 1e-15 {
        std::f64::consts::SQRT_2 / spread
    } else {
        1.0
    };
    (centroid, scale)
}

/// Substitute u = s(x − cx), v = s(y − cy) into
/// A'u² + B'uv + C'v² + D'u + E'v + F' and expand in x and y.
fn denormalize_conic(q: &Vector6<f64>, centroid: [f64; 2], s: f64) -> [f64; 6] {
    let [cx, cy] = centroid;
    let quad = [q[0] * s * s, q[1] * s * s, q[2] * s * s];
    let lin = [q[3] * s, q[4] * s];

    // quadratic part evaluated at the centroid, and its gradient
    let q_c = quad[0] * cx * cx + quad[1] * cx * cy + quad[2] * cy * cy;
    let grad = [
        2.0 * quad[0] * cx + quad[1] * cy,
        quad[1] * cx + 2.0 * quad[2] * cy,
    ];

    [
        quad[0],
        quad[1],
        quad[2],
        lin[0] - grad[0],
        lin[1] - grad[1],
        q_c - lin[0] * cx - lin[1] * cy + q[5],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::prelude::*;

    fn make_test_ellipse() -> EllipseParams {
        EllipseParams::from_axes(100.0, 80.0, 30.0, 15.0, 0.3)
    }

    #[test]
    fn exact_samples_are_recovered() {
        let truth = make_test_ellipse();
        let pts = truth.sample_points(40);
        let fit = fit_ellipse_direct(&pts).unwrap();

        assert_relative_eq!(fit.x, truth.x, epsilon = 1e-6);
        assert_relative_eq!(fit.y, truth.y, epsilon = 1e-6);
        assert_relative_eq!(fit.a, 30.0, epsilon = 1e-6);
        assert_relative_eq!(fit.b, 15.0, epsilon = 1e-6);
        assert_relative_eq!(fit.a_axis_angle(), 0.3, epsilon = 1e-6);
    }

    #[test]
    fn fitted_conic_passes_through_samples() {
        let pts = make_test_ellipse().sample_points(24);
        let conic = fit_conic_direct(&pts).unwrap();
        assert!(conic.is_ellipse());
        assert!(conic.0[0] + conic.0[2] > 0.0);
        for [x, y] in &pts {
            assert!(conic.algebraic_distance(*x, *y).abs() < 1e-6);
        }
    }

    #[test]
    fn partial_arc_is_enough() {
        let truth = EllipseParams::from_axes(150.0, 120.0, 60.0, 30.0, 0.0);
        let pts: Vec<[f64; 2]> = truth
            .sample_points(90)
            .into_iter()
            .take(30)
            .collect();
        let fit = fit_ellipse_direct(&pts).unwrap();
        assert_relative_eq!(fit.x, 150.0, epsilon = 1e-3);
        assert_relative_eq!(fit.y, 120.0, epsilon = 1e-3);
        assert_relative_eq!(fit.a, 60.0, epsilon = 1e-3);
        assert_relative_eq!(fit.b, 30.0, epsilon = 1e-3);
    }

    #[test]
    fn noisy_samples_stay_close() {
        let truth = EllipseParams::from_axes(200.0, 150.0, 60.0, 30.0, -0.6);
        let mut rng = StdRng::seed_from_u64(7);
        let pts: Vec<[f64; 2]> = truth
            .sample_points(200)
            .into_iter()
            .map(|[x, y]| [x + rng.gen_range(-0.5..0.5), y + rng.gen_range(-0.5..0.5)])
            .collect();

        let fit = fit_ellipse_direct(&pts).unwrap();
        assert!((fit.x - truth.x).abs() < 0.5, "cx {}", fit.x);
        assert!((fit.y - truth.y).abs() < 0.5, "cy {}", fit.y);
        assert!((fit.a - truth.a).abs() < 1.0, "a {}", fit.a);
        assert!((fit.b - truth.b).abs() < 1.0, "b {}", fit.b);
        assert!((fit.a_axis_angle() - truth.a_axis_angle()).abs() < 0.05);
    }

    #[test]
    fn semi_axes_are_ordered() {
        for angle in [0.0, 0.5, 1.0, 1.5, -0.8] {
            let truth = EllipseParams::from_axes(50.0, 50.0, 20.0, 35.0, angle);
            let fit = fit_ellipse_direct(&truth.sample_points(30)).unwrap();
            assert!(fit.a >= fit.b);
            assert_relative_eq!(fit.a, 35.0, epsilon = 1e-6);
            assert_relative_eq!(fit.b, 20.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn rotated_ellipses_fit_at_any_angle() {
        for (a, b) in [(40.0, 25.0), (60.0, 30.0)] {
            for k in -6..=6 {
                let angle = k as f64 * 0.25;
                let truth = EllipseParams::from_axes(120.0, 90.0, a, b, angle);
                let fit = fit_ellipse_direct(&truth.sample_points(48))
                    .unwrap_or_else(|e| panic!("angle {angle}: {e}"));
                assert_relative_eq!(fit.x, 120.0, epsilon = 1e-6);
                assert_relative_eq!(fit.y, 90.0, epsilon = 1e-6);
                assert_relative_eq!(fit.a, a, epsilon = 1e-6);
                assert_relative_eq!(fit.b, b, epsilon = 1e-6);
                assert_relative_eq!(fit.a_axis_angle(), angle, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn too_few_points() {
        let pts = vec![[1.0, 2.0], [3.0, 4.0], [5.0, 1.0], [0.0, 0.0], [2.0, 2.0]];
        assert_eq!(fit_conic_direct(&pts), Err(FitError::InsufficientGeometry));
    }

    #[test]
    fn normalization_centers_and_scales() {
        let pts = [[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]];
        let ([mx, my], s) = normalization_params(&pts);
        assert_relative_eq!(mx, 2.0);
        assert_relative_eq!(my, 1.0);
        assert_relative_eq!(s * 5f64.sqrt(), std::f64::consts::SQRT_2, epsilon = 1e-12);
    }
}
