//! Circular arcs traced through chains of lines.
//!
//! Every line group feeds two octants: an arc is assigned to the one on the
//! side of its estimated circle center and its line list is reordered so
//! that all arcs of an octant run the same way around the ellipse.

mod circle;
mod trace;

pub use circle::{estimate_circle, Circle};

use serde::{Deserialize, Serialize};

use crate::config::ArcConfig;
use crate::error::FitError;
use crate::geometry::{ArcGroup, LineGroup, Point};
use crate::lines::Line;
use crate::segments::Segment;

use trace::{interior_angle, ArcFrame, Restart, TraceState};

/// Smallest accepted squared radius (10 px).
const MIN_RADIUS_SQUARED: i32 = 100;

/// Chain of lines approximating a circular arc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub start: Point,
    pub end: Point,
    /// Rounded center of the estimated circle.
    pub mid: Point,
    /// Rounded squared radius of the estimated circle.
    pub r2: i32,
    /// Direction of the first line, oriented along the arc.
    pub first_vec: Point,
    /// Direction of the last line, oriented along the arc.
    pub last_vec: Point,
    /// How many extended arcs include this arc.
    pub used: u32,
    pub group: ArcGroup,
    /// Indices into the line list of `group.line_group()`, in arc order.
    pub lines: Vec<usize>,
}

impl Arc {
    /// Pixels of all member lines.
    pub fn pixels<'a>(
        &'a self,
        lines: &'a [Line],
        segments: &'a [Segment],
    ) -> impl Iterator<Item = Point> + 'a {
        self.lines
            .iter()
            .flat_map(move |&l| lines[l].pixels(segments))
    }
}

/// Trace the lines of one group into arcs of its two octants.
///
/// Returns `(first, second)` in the order of [`LineGroup::arc_groups`].
/// Lines taken into an arc have their `used` counter incremented.
pub fn extract_arcs(
    group: LineGroup,
    lines: &mut [Line],
    segments: &[Segment],
    config: &ArcConfig,
    width: i32,
) -> (Vec<Arc>, Vec<Arc>) {
    let frame = ArcFrame {
        group,
        max_line_gap: config.max_line_gap,
        width,
    };
    let (inner_group, outer_group) = group.arc_groups();
    let mut inner = Vec::new();
    let mut outer = Vec::new();

    let count = lines.len();
    let mut si = 0;
    while si < count {
        let mut chain = trace_chain(&frame, lines, segments, si, config.max_line_tangent_error);

        match classify(&frame, lines, segments, &mut chain) {
            Ok(oriented) => {
                let arc_group = if oriented.inner {
                    inner_group
                } else {
                    outer_group
                };
                for &l in &chain {
                    lines[l].used += 1;
                }
                let first = &lines[chain[0]];
                let last = &lines[chain[chain.len() - 1]];
                let (first_vec, last_vec) = if arc_group.is_leading() {
                    (first.end - first.start, last.end - last.start)
                } else {
                    (first.start - first.end, last.start - last.end)
                };
                let arc = Arc {
                    start: oriented.start,
                    end: oriented.end,
                    mid: oriented.center,
                    r2: oriented.r2,
                    first_vec,
                    last_vec,
                    used: 0,
                    group: arc_group,
                    lines: chain,
                };
                if oriented.inner {
                    inner.push(arc);
                } else {
                    outer.push(arc);
                }
            }
            Err(err) => {
                tracing::trace!(seed = si, lines = chain.len(), %err, "arc candidate dropped");
            }
        }

        si += 1;
        while si < count && lines[si].used > 0 {
            si += 1;
        }
    }

    tracing::debug!(
        group = group.number(),
        inner = inner.len(),
        outer = outer.len(),
        "arcs extracted"
    );
    (inner, outer)
}

/// Follow lines from seed `si` through all sweeps of the trace.
fn trace_chain(
    frame: &ArcFrame,
    lines: &[Line],
    segments: &[Segment],
    si: usize,
    max_tangent_error: f32,
) -> Vec<usize> {
    let count = lines.len() as isize;
    let in_range = |i: isize| (0..count).contains(&i);

    let mut chain = vec![si];
    let mut state = TraceState::BackwardDown;
    let mut ss = si;
    let mut sq = si as isize + 1;
    let mut last_fit: Option<usize> = None;

    loop {
        let window = frame.window(&lines[ss], state);
        while in_range(sq) {
            let cand = &lines[sq as usize];
            if frame.outside(&window, cand) {
                sq = -1;
                break;
            }
            if frame.rejects(&window, cand, &lines[ss], state) {
                sq += state.step();
                continue;
            }
            break;
        }

        if !in_range(sq) {
            let Some((next, restart)) = state.next() else {
                break;
            };
            state = next;
            match restart {
                Restart::LastFit => {
                    if let Some(l) = last_fit {
                        ss = l;
                        sq = l as isize + state.step();
                    }
                }
                Restart::Seed | Restart::SeedReversed => {
                    ss = si;
                    sq = si as isize + state.step();
                    last_fit = None;
                    if restart == Restart::SeedReversed {
                        chain.reverse();
                    }
                }
            }
            continue;
        }

        let q = sq as usize;
        let (target, cand) = (&lines[ss], &lines[q]);
        let angle = interior_angle(target.tangent, cand.tangent);
        if (135.0..=180.0).contains(&angle) {
            chain.push(q);
            let tangents_fit = chain_circle(lines, segments, &chain)
                .map(|c| {
                    let err = |l: &Line| (frame.circle_tangent(&c, l.mid) - l.tangent).to_degrees();
                    let max = max_tangent_error as f64;
                    err(target).abs() <= max && err(cand).abs() <= max
                })
                .unwrap_or(false);
            if tangents_fit {
                ss = q;
                last_fit = Some(q);
            } else {
                chain.pop();
            }
        }
        sq += state.step();
    }

    chain
}

fn chain_circle(lines: &[Line], segments: &[Segment], chain: &[usize]) -> Result<Circle, FitError> {
    estimate_circle(chain.iter().flat_map(|&l| lines[l].pixels(segments)))
}

/// A validated chain in canonical orientation.
struct Oriented {
    /// Belongs to the first octant of the line group.
    inner: bool,
    start: Point,
    end: Point,
    center: Point,
    r2: i32,
}

/// Validate a traced chain, pick its octant and orient it.
fn classify(
    frame: &ArcFrame,
    lines: &[Line],
    segments: &[Segment],
    chain: &mut Vec<usize>,
) -> Result<Oriented, FitError> {
    let circle = chain_circle(lines, segments, chain)?;
    let round = |v: f64| (v + 0.5).floor() as i32;
    let (cx, cy, r2) = (round(circle.x), round(circle.y), round(circle.r2));
    if r2 < MIN_RADIUS_SQUARED || chain.len() < 2 {
        return Err(FitError::InsufficientGeometry);
    }

    if frame.group == LineGroup::DiagonalUp {
        chain.reverse();
    }
    let p1 = lines[chain[0]].start;
    let p2 = lines[chain[chain.len() - 1]].end;

    let (inner, reverse) = match frame.group {
        LineGroup::Horizontal => {
            if cy >= p1.y {
                (true, p1.x > p2.x)
            } else {
                (false, p1.x < p2.x)
            }
        }
        LineGroup::Vertical => {
            if cx <= p1.x {
                (true, p1.y > p2.y)
            } else {
                (false, p1.y < p2.y)
            }
        }
        LineGroup::DiagonalDown => {
            let (x1, y1) = p1.diagonal(frame.width);
            let (x2, _) = p2.diagonal(frame.width);
            let (_, cyd) = Point::new(cx, cy).diagonal(frame.width);
            if cyd >= y1 {
                (true, x1 > x2)
            } else {
                (false, x1 < x2)
            }
        }
        LineGroup::DiagonalUp => {
            let (x1, y1) = p1.diagonal(frame.width);
            let (_, y2) = p2.diagonal(frame.width);
            let (cxd, _) = Point::new(cx, cy).diagonal(frame.width);
            if cxd <= x1 {
                (true, y1 > y2)
            } else {
                (false, y1 < y2)
            }
        }
    };

    let (start, end) = if reverse {
        chain.reverse();
        (p2, p1)
    } else {
        (p1, p2)
    };
    Ok(Oriented {
        inner,
        start,
        end,
        center: Point::new(cx, cy),
        r2,
    })
}
