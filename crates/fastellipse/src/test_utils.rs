//! Synthetic binary edge images for unit tests.

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_ellipse_mut};

const EDGE: Luma<u8> = Luma([255]);

/// One pixel wide circle outline on a black canvas.
pub(crate) fn draw_circle_outline(w: u32, h: u32, center: (i32, i32), radius: i32) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    draw_hollow_circle_mut(&mut img, center, radius, EDGE);
    img
}

/// Axis-aligned ellipse outline with semi-axes `rx` (along x) and `ry`.
pub(crate) fn draw_ellipse_outline(
    w: u32,
    h: u32,
    center: (i32, i32),
    rx: i32,
    ry: i32,
) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    draw_hollow_ellipse_mut(&mut img, center, rx, ry, EDGE);
    img
}

/// Rotated ellipse outline rendered by dense boundary sampling.
///
/// `angle` is the direction of the `a` axis in radians (image coordinates).
pub(crate) fn draw_rotated_ellipse(
    w: u32,
    h: u32,
    center: [f64; 2],
    a: f64,
    b: f64,
    angle: f64,
) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    draw_rotated_ellipse_mut(&mut img, center, a, b, angle);
    img
}

/// Draw a rotated ellipse outline onto an existing canvas; pixels outside
/// the image are skipped.
pub(crate) fn draw_rotated_ellipse_mut(
    img: &mut GrayImage,
    center: [f64; 2],
    a: f64,
    b: f64,
    angle: f64,
) {
    let (w, h) = img.dimensions();
    let (sin, cos) = angle.sin_cos();
    let steps = (8.0 * (a + b)).ceil() as usize;
    for i in 0..steps {
        let s = 2.0 * std::f64::consts::PI * i as f64 / steps as f64;
        let (pa, pb) = (a * s.cos(), b * s.sin());
        let x = (center[0] + cos * pa - sin * pb).round();
        let y = (center[1] + sin * pa + cos * pb).round();
        if x >= 0.0 && y >= 0.0 && (x as u32) < w && (y as u32) < h {
            img.put_pixel(x as u32, y as u32, EDGE);
        }
    }
}
