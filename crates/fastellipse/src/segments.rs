//! Run-length segment detection along four scan directions.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::config::SegmentConfig;
use crate::geometry::{ByLineGroup, LineGroup, Point};

/// Maximal run of foreground pixels along one scan line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// First pixel in scan order.
    pub start: Point,
    /// Last pixel in scan order.
    pub end: Point,
    /// Number of pixels.
    pub len: i32,
    /// How many lines consumed this segment.
    pub used: u32,
}

impl Segment {
    /// Pixels of the segment in scan order.
    pub fn pixels(&self, group: LineGroup) -> impl Iterator<Item = Point> {
        let (dx, dy) = group.step();
        let start = self.start;
        (0..self.len).map(move |i| Point::new(start.x + dx * i, start.y + dy * i))
    }
}

/// Run-length encode the foreground of `image` in all four directions.
pub fn detect_segments(image: &GrayImage, config: &SegmentConfig) -> ByLineGroup<Segment> {
    let mut out = ByLineGroup::default();
    for group in LineGroup::ALL {
        let segments = &mut out[group];
        for (origin, len) in scan_lines(group, image.width() as i32, image.height() as i32) {
            scan_run(image, group, origin, len, config, segments);
        }
        tracing::debug!(group = group.number(), count = segments.len(), "segments detected");
    }
    out
}

/// Start pixel and length of every scan line of a direction, in scan order.
///
/// Diagonals are enumerated from the right image border towards the left
/// one: ↘ lines start on the top row, then on the left column; ↗ lines on
/// the bottom row, then on the left column.
fn scan_lines(group: LineGroup, cols: i32, rows: i32) -> Vec<(Point, i32)> {
    if cols <= 0 || rows <= 0 {
        return Vec::new();
    }
    match group {
        LineGroup::Horizontal => (0..rows).map(|y| (Point::new(0, y), cols)).collect(),
        LineGroup::Vertical => (0..cols).map(|x| (Point::new(x, 0), rows)).collect(),
        LineGroup::DiagonalDown | LineGroup::DiagonalUp => (0..rows + cols - 1)
            .map(|a| {
                let (x0, offset) = if a < cols { (cols - 1 - a, 0) } else { (0, a - (cols - 1)) };
                let len = (rows - offset).min(cols - x0);
                let y0 = if group == LineGroup::DiagonalDown {
                    offset
                } else {
                    rows - 1 - offset
                };
                (Point::new(x0, y0), len)
            })
            .collect(),
    }
}

fn scan_run(
    image: &GrayImage,
    group: LineGroup,
    origin: Point,
    len: i32,
    config: &SegmentConfig,
    out: &mut Vec<Segment>,
) {
    let (dx, dy) = group.step();
    let tol = config.segment_tolerance;
    let at = |b: i32| Point::new(origin.x + dx * b, origin.y + dy * b);

    let mut emit = |start: Point, run: i32, b: i32| {
        if run >= config.min_segment_len {
            out.push(Segment {
                start,
                end: at(b - 1),
                len: run,
                used: 0,
            });
        }
    };

    let mut run = 0;
    let mut run_start = origin;
    let mut prev = 0i32;
    // One extra zero sample closes a run touching the image border.
    for b in 0..=len {
        let p = at(b);
        let val = if b < len {
            image.get_pixel(p.x as u32, p.y as u32)[0] as i32
        } else {
            0
        };
        if val > 0 {
            if run == 0 {
                run_start = p;
                run = 1;
            } else if val >= prev - tol && val <= prev + tol {
                run += 1;
            } else {
                // the pixel breaking the tolerance starts nothing
                emit(run_start, run, b);
                run = 0;
            }
        } else {
            emit(run_start, run, b);
            run = 0;
        }
        prev = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn image_with(w: u32, h: u32, pixels: &[(u32, u32, u8)]) -> GrayImage {
        let mut img = GrayImage::new(w, h);
        for &(x, y, v) in pixels {
            img.put_pixel(x, y, Luma([v]));
        }
        img
    }

    #[test]
    fn horizontal_run_yields_one_segment() {
        let pixels: Vec<_> = (3..10).map(|x| (x, 4, 255)).collect();
        let img = image_with(16, 8, &pixels);
        let segs = detect_segments(&img, &SegmentConfig::default());

        let h = &segs[LineGroup::Horizontal];
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].start, Point::new(3, 4));
        assert_eq!(h[0].end, Point::new(9, 4));
        assert_eq!(h[0].len, 7);
        assert!(segs[LineGroup::Vertical].is_empty());
        assert!(segs[LineGroup::DiagonalDown].is_empty());
        assert!(segs[LineGroup::DiagonalUp].is_empty());
    }

    #[test]
    fn short_runs_are_dropped() {
        let img = image_with(8, 3, &[(2, 1, 255)]);
        let cfg = SegmentConfig::default();
        assert_eq!(detect_segments(&img, &cfg).total_len(), 0);

        let cfg = SegmentConfig {
            min_segment_len: 1,
            ..cfg
        };
        let segs = detect_segments(&img, &cfg);
        assert_eq!(segs.counts(), [1, 1, 1, 1]);
    }

    #[test]
    fn run_touching_the_border_is_closed() {
        let pixels: Vec<_> = (0..6).map(|y| (5, y, 1)).collect();
        let img = image_with(6, 6, &pixels);
        let segs = detect_segments(&img, &SegmentConfig::default());
        let v = &segs[LineGroup::Vertical];
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].start, Point::new(5, 0));
        assert_eq!(v[0].end, Point::new(5, 5));
        assert_eq!(v[0].pixels(LineGroup::Vertical).count(), 6);
    }

    #[test]
    fn intensity_change_splits_runs() {
        let mut pixels: Vec<_> = (0..3).map(|x| (x, 0, 10)).collect();
        pixels.extend((3..7).map(|x| (x, 0, 20)));
        let img = image_with(10, 1, &pixels);

        let segs = detect_segments(&img, &SegmentConfig::default());
        let h = &segs[LineGroup::Horizontal];
        assert_eq!(h.len(), 2);
        assert_eq!((h[0].start.x, h[0].end.x), (0, 2));
        // the first pixel of the brighter run breaks tolerance and is lost
        assert_eq!((h[1].start.x, h[1].end.x), (4, 6));

        let tolerant = SegmentConfig {
            segment_tolerance: 10,
            ..SegmentConfig::default()
        };
        let segs = detect_segments(&img, &tolerant);
        assert_eq!(segs[LineGroup::Horizontal].len(), 1);
        assert_eq!(segs[LineGroup::Horizontal][0].len, 7);
    }

    #[test]
    fn diagonal_runs_have_expected_endpoints() {
        let down = image_with(5, 5, &[(1, 1, 255), (2, 2, 255), (3, 3, 255)]);
        let segs = detect_segments(&down, &SegmentConfig::default());
        assert_eq!(segs.counts(), [0, 0, 1, 0]);
        let s = &segs[LineGroup::DiagonalDown][0];
        assert_eq!((s.start, s.end, s.len), (Point::new(1, 1), Point::new(3, 3), 3));

        let up = image_with(5, 5, &[(1, 3, 255), (2, 2, 255), (3, 1, 255)]);
        let segs = detect_segments(&up, &SegmentConfig::default());
        assert_eq!(segs.counts(), [0, 0, 0, 1]);
        let s = &segs[LineGroup::DiagonalUp][0];
        assert_eq!((s.start, s.end, s.len), (Point::new(1, 3), Point::new(3, 1), 3));
        let walked: Vec<_> = s.pixels(LineGroup::DiagonalUp).collect();
        assert_eq!(walked, vec![Point::new(1, 3), Point::new(2, 2), Point::new(3, 1)]);
    }

    #[test]
    fn diagonal_scan_covers_non_square_images() {
        let (cols, rows) = (7, 3);
        for group in [LineGroup::DiagonalDown, LineGroup::DiagonalUp] {
            let lines = scan_lines(group, cols, rows);
            assert_eq!(lines.len(), (cols + rows - 1) as usize);
            let total: i32 = lines.iter().map(|&(_, len)| len).sum();
            assert_eq!(total, cols * rows);
            let (dx, dy) = group.step();
            for (o, len) in lines {
                let last = Point::new(o.x + dx * (len - 1), o.y + dy * (len - 1));
                assert!((0..cols).contains(&last.x) && (0..rows).contains(&last.y));
            }
        }
    }

    #[test]
    fn empty_image_has_no_segments() {
        let img = GrayImage::new(32, 24);
        assert_eq!(detect_segments(&img, &SegmentConfig::default()).total_len(), 0);
        let img = GrayImage::new(0, 0);
        assert_eq!(detect_segments(&img, &SegmentConfig::default()).total_len(), 0);
    }
}
