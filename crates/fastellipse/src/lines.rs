//! Greedy grouping of same-direction segments into straight lines.
//!
//! Segments are visited in scan order. A seed segment is extended by the
//! first unused segment found in a small window beyond the current target
//! segment, either on the "positive" side (continuing past its end) or the
//! "negative" side (continuing before its start). The first accepted pair
//! locks the slope sign for the rest of the line. An extension is rejected
//! once the longest member segment deviates from the line through the chain
//! endpoints by more than the quantization tolerance.
//!
//! The diagonal groups work in the rotated frame `X = x + y`,
//! `Y = width - 1 - x + y`, where diagonal scan lines become rows.

use serde::{Deserialize, Serialize};

use crate::config::LineConfig;
use crate::geometry::{LineGroup, Point};
use crate::segments::Segment;

/// Chain of collinear segments of one scan direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: Point,
    pub end: Point,
    /// Integer midpoint of `start` and `end`.
    pub mid: Point,
    /// Direction of the line in radians (group dependent sign convention).
    pub tangent: f64,
    /// Span along the dominant axis of the group, in pixels.
    pub len: i32,
    /// How many arcs consumed this line; reset and reused by coverage counting.
    pub used: u32,
    pub group: LineGroup,
    /// Indices into the segment list of `group`, in chain order.
    pub segments: Vec<usize>,
}

impl Line {
    /// All pixels of the member segments, in chain order.
    pub fn pixels<'a>(&'a self, segments: &'a [Segment]) -> impl Iterator<Item = Point> + 'a {
        let group = self.group;
        self.segments
            .iter()
            .flat_map(move |&s| segments[s].pixels(group))
    }
}

/// Extract all lines of one direction group and mark their segments used.
pub fn extract_lines(
    group: LineGroup,
    segments: &mut [Segment],
    config: &LineConfig,
    width: i32,
) -> Vec<Line> {
    let frame = LineFrame {
        group,
        gap: config.max_segment_gap,
        width,
    };
    let count = segments.len();
    let mut lines = Vec::new();

    let mut si = 0;
    while si < count {
        let (chain, positive) = grow_chain(&frame, segments, si, config.max_quantization_error);

        let first = &segments[chain[0]];
        let last = &segments[chain[chain.len() - 1]];
        let len = frame.span(first, last, positive);
        if len >= config.min_line_len {
            let (start, end) = frame.endpoints(first, last, positive);
            for &s in &chain {
                segments[s].used += 1;
            }
            lines.push(Line {
                start,
                end,
                mid: Point::new((start.x + end.x) / 2, (start.y + end.y) / 2),
                tangent: frame.tangent(start, end),
                len,
                used: 0,
                group,
                segments: chain,
            });
        }

        si += 1;
        while si < count && segments[si].used > 0 {
            si += 1;
        }
    }

    tracing::debug!(group = group.number(), count = lines.len(), "lines extracted");
    lines
}

/// Follow segments from seed `si`. Returns the chain and its slope sign.
fn grow_chain(
    frame: &LineFrame,
    segments: &[Segment],
    si: usize,
    max_quantization_error: f32,
) -> (Vec<usize>, bool) {
    let count = segments.len();
    let mut chain = vec![si];
    let mut positive = true;
    let mut first_candidate = true;
    let mut ss = si;
    let mut sl = si;
    let mut sq = si + 1;

    while sq < count {
        let target = &segments[ss];
        let window = frame.window(target);

        while sq < count {
            let cand = &segments[sq];
            if cand.used > 0 {
                sq += 1;
                continue;
            }
            if frame.beyond(cand, &window) {
                sq = count;
                break;
            }
            if (positive || first_candidate) && frame.fits_positive(cand, target, &window) {
                positive = true;
                break;
            }
            if (!positive || first_candidate) && frame.fits_negative(cand, target, &window) {
                positive = false;
                break;
            }
            sq += 1;
        }
        if sq == count {
            break;
        }

        if segments[sl].len < segments[sq].len {
            sl = sq;
        }
        let slope = frame.slope(&segments[si], &segments[sq], positive);
        let deviation = frame.quantization_error(slope, &segments[sl]);
        if deviation.abs() > max_quantization_error {
            if first_candidate {
                positive = true;
            }
            break;
        }
        first_candidate = false;

        chain.push(sq);
        ss = sq;
        sq += 1;
    }

    (chain, positive)
}

/// Search window around the current target segment, in the group frame.
struct Window {
    pos: i32,
    neg: i32,
    /// Scan-order coordinate past which no candidate can follow.
    limit: i32,
}

struct LineFrame {
    group: LineGroup,
    gap: i32,
    width: i32,
}

fn round_half_up(v: f32) -> i32 {
    (v + 0.5).floor() as i32
}

impl LineFrame {
    /// Row/column frame: `u` runs along the scan line, `v` across it.
    fn uv(&self, p: Point) -> (i32, i32) {
        match self.group {
            LineGroup::Vertical => (p.y, p.x),
            _ => (p.x, p.y),
        }
    }

    fn diag(&self, p: Point) -> (i32, i32) {
        p.diagonal(self.width)
    }

    fn window(&self, ss: &Segment) -> Window {
        match self.group {
            LineGroup::Horizontal | LineGroup::Vertical => {
                let (su, _) = self.uv(ss.start);
                let (eu, ev) = self.uv(ss.end);
                let neg = su - self.gap;
                let min_slope = -0.5f32 / (eu - su) as f32;
                Window {
                    pos: eu + self.gap,
                    neg,
                    limit: ev + round_half_up(min_slope * (neg - eu) as f32),
                }
            }
            LineGroup::DiagonalDown => {
                let (sx, _) = self.diag(ss.start);
                let (ex, ey) = self.diag(ss.end);
                let neg = sx - 1 - 2 * self.gap;
                let min_slope = -0.5f32 / (ex - sx) as f32;
                Window {
                    pos: ex + 1 + 2 * self.gap,
                    neg,
                    limit: ey + round_half_up(min_slope * (neg - ex) as f32),
                }
            }
            LineGroup::DiagonalUp => {
                let (_, sy) = self.diag(ss.start);
                let (ex, ey) = self.diag(ss.end);
                let neg = ey - 1 - 2 * self.gap;
                let min_slope = -0.5f32 / (sy - ey) as f32;
                Window {
                    pos: sy + 1 + 2 * self.gap,
                    neg,
                    limit: ex - round_half_up(min_slope * (neg - sy) as f32),
                }
            }
        }
    }

    fn beyond(&self, sq: &Segment, w: &Window) -> bool {
        match self.group {
            LineGroup::Horizontal | LineGroup::Vertical => self.uv(sq.start).1 > w.limit,
            LineGroup::DiagonalDown => self.diag(sq.start).1 > w.limit,
            LineGroup::DiagonalUp => self.diag(sq.start).0 < w.limit,
        }
    }

    fn fits_positive(&self, sq: &Segment, ss: &Segment, w: &Window) -> bool {
        match self.group {
            LineGroup::Horizontal | LineGroup::Vertical => {
                let u = self.uv(sq.start).0;
                u <= w.pos && u >= self.uv(ss.end).0 - ss.len / 2 + 1
            }
            LineGroup::DiagonalDown => {
                let x = self.diag(sq.start).0;
                x <= w.pos && x >= self.diag(ss.end).0 - ss.len + 1
            }
            LineGroup::DiagonalUp => {
                let y = self.diag(sq.start).1;
                y >= w.neg && y <= self.diag(ss.end).1 + ss.len - 1
            }
        }
    }

    fn fits_negative(&self, sq: &Segment, ss: &Segment, w: &Window) -> bool {
        match self.group {
            LineGroup::Horizontal | LineGroup::Vertical => {
                let u = self.uv(sq.end).0;
                u >= w.neg && u <= self.uv(ss.start).0 + ss.len / 2 - 1
            }
            LineGroup::DiagonalDown => {
                let x = self.diag(sq.end).0;
                x >= w.neg && x <= self.diag(ss.start).0 + ss.len - 1
            }
            LineGroup::DiagonalUp => {
                let y = self.diag(sq.end).1;
                y <= w.pos && y >= self.diag(ss.start).1 - ss.len + 1
            }
        }
    }

    /// Slope of the line from the seed to the candidate (across over along
    /// for rows/columns, dy/dx for diagonals).
    fn slope(&self, si: &Segment, sq: &Segment, positive: bool) -> f32 {
        let (from, to) = if positive {
            (si.start, sq.end)
        } else {
            (sq.start, si.end)
        };
        match self.group {
            LineGroup::Horizontal | LineGroup::Vertical => {
                let (fu, fv) = self.uv(from);
                let (tu, tv) = self.uv(to);
                (tv - fv) as f32 / (tu - fu) as f32
            }
            LineGroup::DiagonalDown | LineGroup::DiagonalUp => {
                (to.y - from.y) as f32 / (to.x - from.x) as f32
            }
        }
    }

    /// Deviation of the longest segment from a line with `slope`.
    fn quantization_error(&self, slope: f32, sl: &Segment) -> f32 {
        match self.group {
            LineGroup::Horizontal | LineGroup::Vertical => {
                slope * (self.uv(sl.end).0 - self.uv(sl.start).0) as f32
            }
            LineGroup::DiagonalDown | LineGroup::DiagonalUp => {
                // diagonal pixels quantize twice, hence the halving
                let at = |p: Point| p.y as f32 - slope * p.x as f32;
                0.5 * (at(sl.start) - at(sl.end))
            }
        }
    }

    fn span(&self, first: &Segment, last: &Segment, positive: bool) -> i32 {
        if !positive && self.group != LineGroup::Vertical {
            return first.end.x - last.start.x + 1;
        }
        match self.group {
            LineGroup::Horizontal => last.end.x - first.start.x + 1,
            LineGroup::Vertical if positive => last.end.y - first.start.y + 1,
            LineGroup::Vertical => first.end.y - last.start.y + 1,
            LineGroup::DiagonalDown => last.end.y - first.start.y + 1,
            LineGroup::DiagonalUp => first.start.y - last.end.y + 1,
        }
    }

    fn endpoints(&self, first: &Segment, last: &Segment, positive: bool) -> (Point, Point) {
        match (self.group, positive) {
            (LineGroup::DiagonalUp, true) => (last.end, first.start),
            (LineGroup::DiagonalUp, false) => (first.end, last.start),
            (_, true) => (first.start, last.end),
            (_, false) => (last.start, first.end),
        }
    }

    /// Columns and ↗ diagonals keep their historical mirrored direction.
    fn tangent(&self, start: Point, end: Point) -> f64 {
        let dx = (end.x - start.x) as f64;
        let dy = (end.y - start.y) as f64;
        match self.group {
            LineGroup::Horizontal | LineGroup::DiagonalDown => (-dy).atan2(dx),
            LineGroup::Vertical | LineGroup::DiagonalUp => dy.atan2(-dx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SegmentConfig;
    use crate::segments::detect_segments;
    use approx::assert_relative_eq;
    use image::{GrayImage, Luma};

    fn lines_of(img: &GrayImage, group: LineGroup, cfg: &LineConfig) -> (Vec<Line>, Vec<Segment>) {
        let mut segs = detect_segments(img, &SegmentConfig::default());
        let mut group_segs = std::mem::take(&mut segs[group]);
        let lines = extract_lines(group, &mut group_segs, cfg, img.width() as i32);
        (lines, group_segs)
    }

    fn draw_run(img: &mut GrayImage, y: u32, xs: std::ops::Range<u32>) {
        for x in xs {
            img.put_pixel(x, y, Luma([255]));
        }
    }

    #[test]
    fn touching_segments_merge_into_one_line() {
        let mut img = GrayImage::new(40, 10);
        draw_run(&mut img, 3, 0..10);
        draw_run(&mut img, 4, 10..20);

        let (lines, segs) = lines_of(&img, LineGroup::Horizontal, &LineConfig::default());
        assert_eq!(lines.len(), 1);
        let l = &lines[0];
        assert_eq!(l.segments, vec![0, 1]);
        assert_eq!(l.start, Point::new(0, 3));
        assert_eq!(l.end, Point::new(19, 4));
        assert_eq!(l.len, 20);
        assert_eq!(l.mid, Point::new(9, 3));
        assert!(segs.iter().all(|s| s.used == 1));
        assert_eq!(l.pixels(&segs).count(), 20);
    }

    #[test]
    fn gap_beyond_tolerance_splits_lines() {
        let mut img = GrayImage::new(40, 10);
        draw_run(&mut img, 3, 0..10);
        draw_run(&mut img, 4, 11..21);

        let (lines, _) = lines_of(&img, LineGroup::Horizontal, &LineConfig::default());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].segments, vec![0]);
        assert_eq!(lines[1].segments, vec![1]);

        let wider = LineConfig {
            max_segment_gap: 2,
            ..LineConfig::default()
        };
        let (lines, _) = lines_of(&img, LineGroup::Horizontal, &wider);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn negative_slope_chain_runs_right_to_left() {
        let mut img = GrayImage::new(40, 10);
        draw_run(&mut img, 3, 10..20);
        draw_run(&mut img, 4, 0..10);

        let (lines, _) = lines_of(&img, LineGroup::Horizontal, &LineConfig::default());
        assert_eq!(lines.len(), 1);
        let l = &lines[0];
        assert_eq!(l.start, Point::new(0, 4));
        assert_eq!(l.end, Point::new(19, 3));
        assert_eq!(l.len, 20);
        assert!(l.tangent > 0.0);
    }

    #[test]
    fn steep_step_exceeds_quantization_error() {
        // a short segment one row down right after a long one implies a
        // slope that moves the long segment by more than 0.74 px
        let mut img = GrayImage::new(20, 10);
        draw_run(&mut img, 3, 0..10);
        draw_run(&mut img, 4, 10..12);
        let (lines, segs) = lines_of(&img, LineGroup::Horizontal, &LineConfig::default());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].segments, vec![0]);
        assert_eq!((lines[0].start, lines[0].end), (Point::new(0, 3), Point::new(9, 3)));
        assert_eq!(segs[1].used, 0);
    }

    #[test]
    fn short_chains_are_not_lines() {
        let mut img = GrayImage::new(20, 10);
        draw_run(&mut img, 2, 3..8);
        let (lines, segs) = lines_of(&img, LineGroup::Horizontal, &LineConfig::default());
        assert!(lines.is_empty());
        assert_eq!(segs[0].used, 0);
    }

    #[test]
    fn vertical_tangent_uses_mirrored_convention() {
        let mut img = GrayImage::new(10, 30);
        for y in 2..12 {
            img.put_pixel(4, y, Luma([255]));
        }
        for y in 12..22 {
            img.put_pixel(5, y, Luma([255]));
        }
        let (lines, _) = lines_of(&img, LineGroup::Vertical, &LineConfig::default());
        assert_eq!(lines.len(), 1);
        let l = &lines[0];
        assert_eq!(l.start, Point::new(4, 2));
        assert_eq!(l.end, Point::new(5, 21));
        assert_eq!(l.len, 20);
        assert_relative_eq!(l.tangent, (19.0f64).atan2(-1.0), epsilon = 1e-12);
    }

    #[test]
    fn diagonal_lines_span_both_directions() {
        // a straight ↘ run broken into two touching diagonal segments
        let mut img = GrayImage::new(30, 30);
        for i in 0..6 {
            img.put_pixel(2 + i, 2 + i, Luma([255]));
        }
        for i in 0..6 {
            img.put_pixel(8 + i, 7 + i, Luma([255]));
        }
        let (lines, _) = lines_of(&img, LineGroup::DiagonalDown, &LineConfig::default());
        assert_eq!(lines.len(), 1);
        let l = &lines[0];
        assert_eq!(l.segments.len(), 2);
        assert_eq!(l.start, Point::new(2, 2));
        assert_eq!(l.end, Point::new(13, 12));
        assert_eq!(l.len, 12);

        let mut img = GrayImage::new(30, 30);
        for i in 0..8 {
            img.put_pixel(3 + i, 20 - i, Luma([255]));
        }
        let (lines, _) = lines_of(&img, LineGroup::DiagonalUp, &LineConfig::default());
        assert_eq!(lines.len(), 1);
        let l = &lines[0];
        // ↗ lines are stored from their upper right end
        assert_eq!(l.start, Point::new(10, 13));
        assert_eq!(l.end, Point::new(3, 20));
        assert_eq!(l.len, 8);
    }
}
