//! Closed-form least-squares circle from pixel moment sums.

use crate::error::FitError;
use crate::geometry::Point;

/// Circle estimate in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: f64,
    pub y: f64,
    /// Mean squared distance of the pixels from the center.
    pub r2: f64,
}

/// Fit a circle to `pixels` by solving the 2×2 normal equations built from
/// moment sums up to third order.
///
/// Sums are accumulated as 128-bit integers, so the result does not depend
/// on the pixel order and the third-order products cannot overflow.
pub fn estimate_circle<I>(pixels: I) -> Result<Circle, FitError>
where
    I: IntoIterator<Item = Point>,
{
    let mut n = 0i128;
    let (mut xs, mut ys) = (0i128, 0i128);
    let (mut x2s, mut y2s, mut xys) = (0i128, 0i128, 0i128);
    let (mut x3s, mut y3s, mut xy2s, mut x2ys) = (0i128, 0i128, 0i128, 0i128);

    for p in pixels {
        let x = p.x as i128;
        let y = p.y as i128;
        n += 1;
        xs += x;
        ys += y;
        x2s += x * x;
        y2s += y * y;
        xys += x * y;
        x3s += x * x * x;
        y3s += y * y * y;
        xy2s += x * y * y;
        x2ys += x * x * y;
    }
    if n < 3 {
        return Err(FitError::InsufficientGeometry);
    }

    let a1 = 2.0 * (xs * xs - n * x2s) as f64;
    let b1 = 2.0 * (xs * ys - n * xys) as f64;
    let a2 = b1;
    let b2 = 2.0 * (ys * ys - n * y2s) as f64;
    let c1 = (x2s * xs - n * x3s + xs * y2s - n * xy2s) as f64;
    let c2 = (x2s * ys - n * y3s + ys * y2s - n * x2ys) as f64;

    let det = a1 * b2 - a2 * b1;
    if det == 0.0 {
        return Err(FitError::SingularMatrix);
    }
    let x = (c1 * b2 - c2 * b1) / det;
    let y = (a1 * c2 - a2 * c1) / det;

    let nf = n as f64;
    let r2 = (x2s as f64 - 2.0 * x * xs as f64 + nf * x * x + y2s as f64 - 2.0 * y * ys as f64
        + nf * y * y)
        / nf;

    Ok(Circle { x, y, r2 })
}
