//! Conic coefficients and geometric ellipse parameters.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

use crate::error::FitError;

/// General conic: A x² + B xy + C y² + D x + E y + F = 0.
/// Stored as [A, B, C, D, E, F].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConicCoeffs(pub [f64; 6]);

/// Ellipse in pixel coordinates.
///
/// `t` is the direction of the `b` semi-axis, measured from +x towards +y
/// (image rows grow downwards), in (−π/2, π/2]. The `a` semi-axis runs
/// perpendicular to it. Ellipses produced by the fitter have `a >= b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseParams {
    pub x: f64,
    pub y: f64,
    pub a: f64,
    pub b: f64,
    pub t: f64,
}

// ── Conic → ellipse ────────────────────────────────────────────────────────

impl ConicCoeffs {
    /// Algebraic distance of a point (x, y) to this conic.
    pub fn algebraic_distance(&self, x: f64, y: f64) -> f64 {
        let [a, b, c, d, e, f] = self.0;
        a * x * x + b * x * y + c * y * y + d * x + e * y + f
    }

    /// Check whether the conic represents an ellipse (discriminant B²−4AC < 0).
    pub fn is_ellipse(&self) -> bool {
        let [a, b, c, ..] = self.0;
        b * b - 4.0 * a * c < 0.0
    }

    /// Same conic scaled so that A + C > 0.
    pub(crate) fn with_positive_trace(self) -> Self {
        if self.0[0] + self.0[2] < 0.0 {
            Self(self.0.map(|v| -v))
        } else {
            self
        }
    }

    /// Center, orientation and semi-axes from the conic invariants
    /// (Bronstein normal form).
    pub fn to_ellipse(self) -> Result<EllipseParams, FitError> {
        let [a, b2, c, d2, e2, f] = self.0;
        let (b, d, e) = (b2 / 2.0, d2 / 2.0, e2 / 2.0);

        let delta = a * c - b * b;
        if delta == 0.0 {
            return Err(FitError::DegenerateConic);
        }
        let big_delta = a * c * f + 2.0 * b * e * d - a * e * e - b * b * f - c * d * d;

        let x = (b * e - c * d) / delta;
        let y = (b * d - a * e) / delta;
        let t = normalize_angle((2.0 * b).atan2(a - c) / 2.0);

        let root = ((a - c) * (a - c) + 4.0 * b * b).sqrt();
        let l1 = (a + c + root) / 2.0;
        let l2 = (a + c - root) / 2.0;
        if l1 == 0.0 || l2 == 0.0 {
            return Err(FitError::DegenerateConic);
        }

        let ratio = big_delta / delta;
        let along_t = -ratio / l1;
        let across_t = -ratio / l2;
        if along_t < 0.0 || across_t < 0.0 {
            return Err(FitError::DegenerateConic);
        }

        Ok(EllipseParams {
            x,
            y,
            a: across_t.sqrt(),
            b: along_t.sqrt(),
            t,
        })
    }
}

// ── Ellipse utilities ──────────────────────────────────────────────────────

impl EllipseParams {
    /// Build from center, semi-axes and the direction of the `a` axis.
    ///
    /// The longer axis becomes `a`.
    pub fn from_axes(x: f64, y: f64, a: f64, b: f64, a_angle: f64) -> Self {
        let (a, b, a_angle) = if a >= b {
            (a, b, a_angle)
        } else {
            (b, a, a_angle + FRAC_PI_2)
        };
        Self {
            x,
            y,
            a,
            b,
            t: normalize_angle(a_angle + FRAC_PI_2),
        }
    }

    /// Direction of the `a` axis in (−π/2, π/2].
    pub fn a_axis_angle(&self) -> f64 {
        normalize_angle(self.t - FRAC_PI_2)
    }

    pub fn semi_major(&self) -> f64 {
        self.a.max(self.b)
    }

    pub fn semi_minor(&self) -> f64 {
        self.a.min(self.b)
    }

    /// Ramanujan style circumference approximation π(1.5(a+b) − √(ab)).
    pub fn circumference(&self) -> f64 {
        PI * (1.5 * (self.a + self.b) - (self.a * self.b).sqrt())
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.a.is_finite()
            && self.b.is_finite()
            && self.t.is_finite()
    }

    /// Angle of the `a` axis in the y-up frame used by the residual and
    /// tangent checks.
    fn frame_angle(&self) -> f64 {
        let t = if self.t.to_degrees() < -89.5 {
            -self.t
        } else {
            self.t
        };
        FRAC_PI_2 - t
    }

    /// Point in the ellipse frame (`a` along the first coordinate, y up).
    fn to_frame(&self, px: f64, py: f64) -> (f64, f64) {
        let phi = self.frame_angle();
        let (sin, cos) = phi.sin_cos();
        let x = px - self.x;
        let y = self.y - py;
        (x * cos + y * sin, -x * sin + y * cos)
    }

    /// |(X/a)² + (Y/b)² − 1| of a pixel in the ellipse frame.
    pub fn residual(&self, px: f64, py: f64) -> f64 {
        let (u, v) = self.to_frame(px, py);
        let (xu, yv) = (u / self.a, v / self.b);
        (xu * xu + yv * yv - 1.0).abs()
    }

    /// Direction of the ellipse tangent at the point of the ellipse closest
    /// in angle to (px, py), in (−π/2, π/2], y up.
    pub fn tangent_at(&self, px: f64, py: f64) -> f64 {
        let (u, v) = self.to_frame(px, py);
        let bbx = self.b * self.b * u;
        let aay = self.a * self.a * v;
        let tangent = if aay == 0.0 {
            if bbx >= 0.0 {
                -FRAC_PI_2
            } else {
                FRAC_PI_2
            }
        } else {
            (-bbx / aay).atan() + self.frame_angle()
        };
        if tangent > FRAC_PI_2 {
            tangent - PI
        } else {
            tangent
        }
    }

    /// Sample `n` points on the ellipse boundary.
    pub fn sample_points(&self, n: usize) -> Vec<[f64; 2]> {
        let (sin_a, cos_a) = self.a_axis_angle().sin_cos();
        (0..n)
            .map(|i| {
                let s = 2.0 * PI * (i as f64) / (n as f64);
                let pa = self.a * s.cos();
                let pb = self.b * s.sin();
                [self.x + cos_a * pa - sin_a * pb, self.y + sin_a * pa + cos_a * pb]
            })
            .collect()
    }

    /// Convert back to conic coefficients.
    pub fn to_conic(&self) -> ConicCoeffs {
        let (sin_a, cos_a) = self.a_axis_angle().sin_cos();
        let a2 = self.a * self.a;
        let b2 = self.b * self.b;

        let ca = cos_a * cos_a / a2 + sin_a * sin_a / b2;
        let cb = 2.0 * cos_a * sin_a * (1.0 / a2 - 1.0 / b2);
        let cc = sin_a * sin_a / a2 + cos_a * cos_a / b2;
        let cd = -2.0 * ca * self.x - cb * self.y;
        let ce = -cb * self.x - 2.0 * cc * self.y;
        let cf = ca * self.x * self.x + cb * self.x * self.y + cc * self.y * self.y - 1.0;

        ConicCoeffs([ca, cb, cc, cd, ce, cf])
    }
}

/// Normalize angle to (−π/2, π/2].
pub(crate) fn normalize_angle(mut angle: f64) -> f64 {
    while angle > FRAC_PI_2 {
        angle -= PI;
    }
    while angle <= -FRAC_PI_2 {
        angle += PI;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn axis_aligned_conic_keeps_legacy_orientation() {
        // x-axis 60, y-axis 30 around (100, 100)
        let e = EllipseParams::from_axes(100.0, 100.0, 60.0, 30.0, 0.0);
        assert_relative_eq!(e.t, FRAC_PI_2, epsilon = 1e-12);

        let back = e.to_conic().to_ellipse().unwrap();
        assert_relative_eq!(back.x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(back.y, 100.0, epsilon = 1e-9);
        assert_relative_eq!(back.a, 60.0, epsilon = 1e-9);
        assert_relative_eq!(back.b, 30.0, epsilon = 1e-9);
        assert_relative_eq!(back.t, FRAC_PI_2, epsilon = 1e-9);
    }

    #[test]
    fn rotated_conic_round_trip() {
        let e = EllipseParams::from_axes(80.0, 50.0, 40.0, 12.0, 0.4);
        let back = e.to_conic().to_ellipse().unwrap();
        assert_relative_eq!(back.x, e.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, e.y, epsilon = 1e-9);
        assert_relative_eq!(back.a, 40.0, epsilon = 1e-9);
        assert_relative_eq!(back.b, 12.0, epsilon = 1e-9);
        assert_relative_eq!(back.a_axis_angle(), 0.4, epsilon = 1e-9);

        // scaling by a negative factor describes the same curve
        let flipped = ConicCoeffs(e.to_conic().0.map(|v| -2.5 * v)).with_positive_trace();
        let again = flipped.to_ellipse().unwrap();
        assert_relative_eq!(again.a, 40.0, epsilon = 1e-9);
        assert_relative_eq!(again.t, e.t, epsilon = 1e-9);
    }

    #[test]
    fn sampled_points_lie_on_the_ellipse() {
        for angle in [0.0, 0.7, -1.2, FRAC_PI_2] {
            let e = EllipseParams::from_axes(30.0, -20.0, 25.0, 10.0, angle);
            let conic = e.to_conic();
            for [x, y] in e.sample_points(64) {
                assert!(e.residual(x, y) < 1e-9, "angle {}", angle);
                assert!(conic.algebraic_distance(x, y).abs() < 1e-9);
            }
            assert!(e.residual(e.x, e.y) > 0.99);
        }
    }

    #[test]
    fn tangent_follows_the_boundary() {
        let e = EllipseParams::from_axes(0.0, 0.0, 50.0, 20.0, 0.0);
        // top and bottom vertices: horizontal tangent
        assert_relative_eq!(e.tangent_at(0.0, -20.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(e.tangent_at(0.0, 20.0), 0.0, epsilon = 1e-12);
        // right vertex: vertical tangent
        assert_relative_eq!(e.tangent_at(50.0, 0.0).abs(), FRAC_PI_2, epsilon = 1e-12);

        // generic point: compare with the numeric direction of the boundary
        let s: f64 = 0.6;
        let (x0, y0) = (50.0 * s.cos(), -20.0 * s.sin());
        let (x1, y1) = (50.0 * (s + 1e-6).cos(), -20.0 * (s + 1e-6).sin());
        let expected = (-(y1 - y0)).atan2(x1 - x0);
        let expected = normalize_angle(expected);
        assert_relative_eq!(e.tangent_at(x0, y0), expected, epsilon = 1e-5);
    }

    #[test]
    fn circumference_of_circle() {
        let c = EllipseParams::from_axes(0.0, 0.0, 10.0, 10.0, 0.0);
        assert_relative_eq!(c.circumference(), 2.0 * PI * 10.0, epsilon = 1e-12);
        assert_eq!(c.semi_major(), 10.0);
    }

    #[test]
    fn degenerate_conics_are_rejected() {
        // parabola y = x²
        let parabola = ConicCoeffs([1.0, 0.0, 0.0, 0.0, -1.0, 0.0]);
        assert_eq!(parabola.to_ellipse(), Err(FitError::DegenerateConic));
        // hyperbola x² − y² = 1
        let hyperbola = ConicCoeffs([1.0, 0.0, -1.0, 0.0, 0.0, -1.0]);
        assert_eq!(hyperbola.to_ellipse(), Err(FitError::DegenerateConic));
        assert!(!hyperbola.is_ellipse());
        // imaginary ellipse x² + y² = −1
        let imaginary = ConicCoeffs([1.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        assert_eq!(imaginary.to_ellipse(), Err(FitError::DegenerateConic));
    }
}
