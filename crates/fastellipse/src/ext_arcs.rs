//! Extended elliptic arcs: triples of arcs from three adjacent octants.
//!
//! For every arc B of octant g, candidate predecessors A (octant g−1) and
//! successors C (octant g+1) are collected by proximity, chord direction,
//! gap direction and convexity tests. Every surviving (A, B, C) triple gets a
//! direct ellipse fit over all of its pixels, which is then validated
//! against the tangents of the base lines and, optionally, against the
//! line-beam through the intersection of the outermost base lines.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use crate::arcs::Arc;
use crate::config::ExtendedArcConfig;
use crate::conic::{fit_ellipse_direct, EllipseParams};
use crate::error::FitError;
use crate::geometry::{ArcGroup, ByArcGroup, ByLineGroup, Point};
use crate::lines::Line;
use crate::segments::Segment;

/// Stand-in slope for vertical lines.
const INFINITE_SLOPE: f64 = 999_999_999.0;

/// Read-only view of the primitives extended arcs refer to.
#[derive(Debug, Clone, Copy)]
pub struct ArcContext<'a> {
    pub segments: &'a ByLineGroup<Segment>,
    pub lines: &'a ByLineGroup<Line>,
    pub arcs: &'a ByArcGroup<Arc>,
}

impl<'a> ArcContext<'a> {
    /// Lines an arc indexes into.
    pub fn lines_of(&self, arc: &Arc) -> &'a [Line] {
        &self.lines[arc.group.line_group()]
    }

    /// All pixels of `arcs`, duplicates included, as fit input.
    pub fn points<'b, I>(&self, arcs: I) -> Vec<[f64; 2]>
    where
        I: IntoIterator<Item = &'b Arc>,
    {
        let mut out = Vec::new();
        for arc in arcs {
            let lg = arc.group.line_group();
            out.extend(
                arc.pixels(&self.lines[lg], &self.segments[lg])
                    .map(|p| [p.x as f64, p.y as f64]),
            );
        }
        out
    }
}

/// Line through the tangent intersection of the first and last base line
/// and the midpoint of their centers. For an ellipse it passes through the
/// ellipse center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineBeam {
    /// Intersection of the two base lines.
    pub ix: f64,
    pub iy: f64,
    pub slope: f64,
}

impl LineBeam {
    /// Signed distance of (x, y) from the beam (Hesse normal form).
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        line_point_distance(x, y, self.ix, self.iy, self.slope)
    }
}

/// Three arcs of adjacent octants with the ellipse fitted through them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedArc {
    #[serde(flatten)]
    pub params: EllipseParams,
    /// Absent when the two base lines are parallel.
    pub line_beam: Option<LineBeam>,
    /// How many merge steps touched this extended arc.
    pub used: u32,
    /// Octant of the middle arc.
    pub group: ArcGroup,
    /// Indices into the arc lists of `group.neighborhood()`.
    pub arcs: [usize; 3],
}

impl ExtendedArc {
    pub fn base_arcs<'a>(&self, arcs: &'a ByArcGroup<Arc>) -> [&'a Arc; 3] {
        let [g0, g1, g2] = self.group.neighborhood();
        [
            &arcs[g0][self.arcs[0]],
            &arcs[g1][self.arcs[1]],
            &arcs[g2][self.arcs[2]],
        ]
    }

    /// `(octant, index)` of every base arc.
    pub fn base_refs(&self) -> impl Iterator<Item = (ArcGroup, usize)> {
        self.group.neighborhood().into_iter().zip(self.arcs)
    }
}

// ── Builder ────────────────────────────────────────────────────────────────

/// Build extended arcs for all octants, in octant order.
///
/// Every emitted extended arc increments `used` on its three base arcs.
pub fn build_extended_arcs(
    segments: &ByLineGroup<Segment>,
    lines: &ByLineGroup<Line>,
    arcs: &mut ByArcGroup<Arc>,
    config: &ExtendedArcConfig,
) -> Vec<ExtendedArc> {
    let mut out = Vec::new();
    {
        let ctx = ArcContext {
            segments,
            lines,
            arcs: &*arcs,
        };
        for group in ArcGroup::ALL {
            let before = out.len();
            build_group(&ctx, group, config, &mut out);
            tracing::debug!(
                group = group.number(),
                count = out.len() - before,
                "extended arcs built"
            );
        }
    }

    for ext in &out {
        let [g0, g1, g2] = ext.group.neighborhood();
        arcs[g0][ext.arcs[0]].used += 1;
        arcs[g1][ext.arcs[1]].used += 1;
        arcs[g2][ext.arcs[2]].used += 1;
    }
    out
}

fn build_group(
    ctx: &ArcContext,
    group: ArcGroup,
    config: &ExtendedArcConfig,
    out: &mut Vec<ExtendedArc>,
) {
    let [grp_a, grp_b, grp_c] = group.neighborhood();
    let (arcs_a, arcs_b, arcs_c) = (&ctx.arcs[grp_a], &ctx.arcs[grp_b], &ctx.arcs[grp_c]);
    let max_mismatches = config.max_interior_angle_mismatches;

    for (b, arc_b) in arcs_b.iter().enumerate() {
        let list_a: Vec<usize> = arcs_a
            .iter()
            .enumerate()
            .filter(|(_, arc_a)| {
                arcs_connect(arc_a, arc_b, arc_b, arc_a.end, config)
                    && interior_angle_mismatches(ctx, arc_a, arc_b, max_mismatches)
                        <= max_mismatches
            })
            .map(|(a, _)| a)
            .collect();
        if list_a.is_empty() {
            continue;
        }

        let list_c: Vec<usize> = arcs_c
            .iter()
            .enumerate()
            .filter(|(_, arc_c)| {
                arcs_connect(arc_b, arc_c, arc_b, arc_c.start, config)
                    && interior_angle_mismatches(ctx, arc_b, arc_c, max_mismatches)
                        <= max_mismatches
            })
            .map(|(c, _)| c)
            .collect();
        if list_c.is_empty() {
            continue;
        }

        for &a in &list_a {
            let arc_a = &arcs_a[a];
            for &c in &list_c {
                let arc_c = &arcs_c[c];
                if interior_angle_mismatches(ctx, arc_a, arc_c, max_mismatches) > max_mismatches {
                    continue;
                }

                let base = [arc_a, arc_b, arc_c];
                let params = match fit_ellipse_direct(&ctx.points(base)) {
                    Ok(p) => p,
                    Err(err) => {
                        tracing::trace!(group = group.number(), a, b, c, %err, "triple fit failed");
                        continue;
                    }
                };

                if tangent_mismatches(ctx, base, &params, config) > config.max_tangent_errors {
                    continue;
                }

                let lines_a = ctx.lines_of(arc_a);
                let lines_c = ctx.lines_of(arc_c);
                let (Some(&first), Some(&last)) = (arc_a.lines.first(), arc_c.lines.last()) else {
                    continue;
                };
                let beam = line_beam_center_distance(&lines_a[first], &lines_c[last], params.x, params.y);
                let beam_ok = beam
                    .map(|(_, d)| d.abs() < config.max_line_beam_center_mismatch as f64)
                    .unwrap_or(false);
                if !beam_ok && config.validation_stage.checks_line_beam() {
                    continue;
                }

                out.push(ExtendedArc {
                    params,
                    line_beam: beam.map(|(lb, _)| lb),
                    used: 0,
                    group,
                    arcs: [a, b, c],
                });
            }
        }
    }
}

/// Proximity and direction tests between two consecutive arcs.
///
/// `middle` is the arc whose circle is used for the overlap test and
/// `probe` the endpoint of the other arc checked against it.
fn arcs_connect(
    first: &Arc,
    second: &Arc,
    middle: &Arc,
    probe: Point,
    config: &ExtendedArcConfig,
) -> bool {
    let gap = second.start - first.end;
    let max_gap = config.max_arc_gap;
    if gap.x.abs() > max_gap || gap.y.abs() > max_gap {
        return false;
    }

    let chord = first.end - first.start;
    let starts = second.start - first.start;
    let ratio = starts.norm() / chord.norm();
    if ratio < config.min_arc_distance_ratio as f64 {
        return false;
    }
    if vector_angle(chord, starts) > config.max_arc_distance_angle as f64 {
        return false;
    }

    let min_dist = config.min_gap_angle_distance;
    if gap.x.abs() > min_dist || gap.y.abs() > min_dist {
        let max_angle = config.max_gap_angle as f64;
        let angle_first = vector_angle(first.last_vec, gap);
        let angle_second = vector_angle(second.first_vec, gap);
        if angle_first > max_angle || angle_second > max_angle {
            // antiparallel ends: the arcs overlap, accept if they share a circle
            if angle_first > 180.0 - max_angle || angle_second > 180.0 - max_angle {
                let d = (probe - middle.mid).norm() - (middle.r2 as f64).sqrt();
                if d.abs() > config.max_arc_overlap_gap as f64 {
                    return false;
                }
            } else {
                return false;
            }
        }
    }
    true
}

/// Angle between two integer vectors in degrees; NaN for zero vectors.
fn vector_angle(u: Point, v: Point) -> f64 {
    let denom = ((u.norm_squared() as f64) * (v.norm_squared() as f64)).sqrt();
    (u.dot(v) as f64 / denom).acos().to_degrees()
}

// ── Shared validation checks ───────────────────────────────────────────────

/// Count line pairs of `first` and `second` that violate convexity.
///
/// For every pair, the vector between the line starts has to point to the
/// inner side of both lines. Pairs whose start distance is shorter than the
/// line of `first` are skipped. Counting stops once `max` is exceeded.
pub fn interior_angle_mismatches(ctx: &ArcContext, first: &Arc, second: &Arc, max: usize) -> usize {
    let lines_a = ctx.lines_of(first);
    let lines_b = ctx.lines_of(second);
    let oriented = |line: &Line, leading: bool| {
        if leading {
            (line.start, line.end)
        } else {
            (line.end, line.start)
        }
    };

    let mut mismatches = 0;
    'outer: for &ib in &second.lines {
        let (b_start, b_end) = oriented(&lines_b[ib], second.group.is_leading());
        for &ia in &first.lines {
            let (a_start, a_end) = oriented(&lines_a[ia], first.group.is_leading());

            // y up
            let a = (
                (a_end.x - a_start.x) as f64,
                -((a_end.y - a_start.y) as f64),
            );
            let b = (
                (b_end.x - b_start.x) as f64,
                -((b_end.y - b_start.y) as f64),
            );
            let an = (a.1, -a.0);
            let bn = (b.1, -b.0);
            let ab = (
                (b_start.x - a_start.x) as f64,
                -((b_start.y - a_start.y) as f64),
            );
            let ba = (-ab.0, -ab.1);

            let ab_len2 = ab.0 * ab.0 + ab.1 * ab.1;
            let th1 = ((ab.0 * an.0 + ab.1 * an.1) / (ab_len2 * (an.0 * an.0 + an.1 * an.1)).sqrt())
                .acos();
            let th2 = ((ba.0 * bn.0 + ba.1 * bn.1) / (ab_len2 * (bn.0 * bn.0 + bn.1 * bn.1)).sqrt())
                .acos();

            let a_len = (a.0 * a.0 + a.1 * a.1).sqrt();
            if ab_len2.sqrt() / a_len < 1.0 {
                continue;
            }
            if th1 > FRAC_PI_2 || th2 > FRAC_PI_2 {
                mismatches += 1;
            }
            if mismatches > max {
                break 'outer;
            }
        }
    }
    mismatches
}

/// Count base lines whose direction disagrees with the ellipse tangent at
/// their midpoint by more than `max_arc_tangent_error` degrees.
///
/// Only counted when the validation stage includes tangents; counting stops
/// once `max_tangent_errors` is exceeded.
pub fn tangent_mismatches(
    ctx: &ArcContext,
    base: [&Arc; 3],
    params: &EllipseParams,
    config: &ExtendedArcConfig,
) -> usize {
    let max_err = config.max_arc_tangent_error as f64;
    let mut mismatches = 0;
    for arc in base {
        let lines = ctx.lines_of(arc);
        // vertical lines carry tangents in [0, π]
        let vertical = matches!(arc.group, ArcGroup::Right | ArcGroup::Left);
        for &l in &arc.lines {
            let line = &lines[l];
            let mut ell = params.tangent_at(line.mid.x as f64, line.mid.y as f64);
            if vertical && ell < 0.0 {
                ell += PI;
            }

            let mut err = (ell - line.tangent).to_degrees();
            if err > 178.0 && err < 182.0 {
                err -= 180.0;
            } else if err < -178.0 && err > -182.0 {
                err += 180.0;
            }

            if err.abs() > max_err {
                if config.validation_stage.checks_tangents() {
                    mismatches += 1;
                }
                if mismatches > config.max_tangent_errors {
                    return mismatches;
                }
            }
        }
    }
    mismatches
}

/// Largest ellipse-equation residual over the six arc endpoints.
pub fn point_mismatch(base: [&Arc; 3], params: &EllipseParams) -> f64 {
    base.iter()
        .flat_map(|arc| [arc.start, arc.end])
        .map(|p| params.residual(p.x as f64, p.y as f64))
        .fold(0.0, f64::max)
}

fn slope(dx: f64, dy: f64) -> f64 {
    if dx == 0.0 && dy > 0.0 {
        INFINITE_SLOPE
    } else if dx == 0.0 && dy < 0.0 {
        -INFINITE_SLOPE
    } else {
        dy / dx
    }
}

/// Intersect the first and last base line and measure how far (x, y) lies
/// from the beam through the intersection and the midpoint of the two line
/// centers. `None` for parallel lines.
pub fn line_beam_center_distance(
    first: &Line,
    last: &Line,
    x: f64,
    y: f64,
) -> Option<(LineBeam, f64)> {
    let (x1, y1) = (first.mid.x as f64, first.mid.y as f64);
    let (x2, y2) = (last.mid.x as f64, last.mid.y as f64);
    let m1 = slope(
        (first.end.x - first.start.x) as f64,
        (first.end.y - first.start.y) as f64,
    );
    let m2 = slope(
        (last.end.x - last.start.x) as f64,
        (last.end.y - last.start.y) as f64,
    );

    let cx = (x1 + x2) / 2.0;
    let cy = (y1 + y2) / 2.0;

    let det0 = m2 - m1;
    if det0 == 0.0 {
        return None;
    }
    let c1 = y1 - x1 * m1;
    let c2 = y2 - x2 * m2;
    let ix = (c1 - c2) / det0;
    let iy = (c1 * m2 - m1 * c2) / det0;

    let beam = LineBeam {
        ix,
        iy,
        slope: slope(cx - ix, cy - iy),
    };
    Some((beam, beam.distance_to(x, y)))
}

/// Signed distance of (tx, ty) from the line through (lx, ly) with slope `m`.
pub fn line_point_distance(tx: f64, ty: f64, lx: f64, ly: f64, m: f64) -> f64 {
    let c = ly - lx * m;
    let mut u = 1.0 / (m * m + 1.0).sqrt();
    if c > 0.0 {
        u = -u;
    }
    (m * tx - ty + c) * u
}

/// Direct fit over every pixel of the given extended arcs.
pub(crate) fn fit_extended_arcs(
    ctx: &ArcContext,
    ext_arcs: &[ExtendedArc],
    members: &[usize],
) -> Result<EllipseParams, FitError> {
    let points = ctx.points(
        members
            .iter()
            .flat_map(|&m| ext_arcs[m].base_arcs(ctx.arcs)),
    );
    fit_ellipse_direct(&points)
}
