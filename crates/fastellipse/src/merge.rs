//! Grouping of extended arcs into ellipses.
//!
//! 1. Extended arcs sharing a base arc are merged greedily; each candidate
//!    has to agree with the current estimate, which is refitted at most once
//!    per octant.
//! 2. Still unused extended arcs are offered to the ellipses of step 1.
//! 3. The rest is merged by proximity of center and semi-axes.
//!
//! An ellipse is kept only if the edge pixels of its base lines cover more
//! than `min_coverage` of its circumference.

use serde::{Deserialize, Serialize};

use crate::arcs::Arc;
use crate::config::{ExtendedArcConfig, MergeConfig};
use crate::conic::EllipseParams;
use crate::error::FitError;
use crate::ext_arcs::{
    fit_extended_arcs, point_mismatch, tangent_mismatches, ArcContext, ExtendedArc,
};
use crate::geometry::{ByArcGroup, ByLineGroup};
use crate::lines::Line;
use crate::segments::Segment;

/// A detected ellipse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    #[serde(flatten)]
    pub params: EllipseParams,
    /// Base line pixels over the approximate circumference.
    pub coverage: f64,
    /// Indices into the extended arc list.
    pub merged_arcs: Vec<usize>,
}

/// Run all three merge phases.
///
/// Updates `used` on the extended arcs and recounts `used` on the base
/// lines of every ellipse whose coverage is computed.
pub fn merge_ellipses(
    ext_arcs: &mut [ExtendedArc],
    segments: &ByLineGroup<Segment>,
    lines: &mut ByLineGroup<Line>,
    arcs: &ByArcGroup<Arc>,
    ext_config: &ExtendedArcConfig,
    config: &MergeConfig,
) -> Vec<Ellipse> {
    let mut merger = Merger {
        ext_arcs,
        segments,
        lines,
        arcs,
        ext_config,
        config,
    };

    let mut ellipses = merger.merge_shared_arcs();
    let from_shared = ellipses.len();
    merger.absorb_unused(&mut ellipses);
    merger.merge_by_proximity(&mut ellipses);

    tracing::debug!(
        shared = from_shared,
        proximity = ellipses.len() - from_shared,
        "ellipses merged"
    );
    ellipses
}

struct Merger<'a> {
    ext_arcs: &'a mut [ExtendedArc],
    segments: &'a ByLineGroup<Segment>,
    lines: &'a mut ByLineGroup<Line>,
    arcs: &'a ByArcGroup<Arc>,
    ext_config: &'a ExtendedArcConfig,
    config: &'a MergeConfig,
}

impl Merger<'_> {
    fn ctx(&self) -> ArcContext<'_> {
        ArcContext {
            segments: self.segments,
            lines: &*self.lines,
            arcs: self.arcs,
        }
    }

    fn fit(&self, members: &[usize]) -> Result<EllipseParams, FitError> {
        fit_extended_arcs(&self.ctx(), &*self.ext_arcs, members)
    }

    /// Tangent and endpoint agreement of extended arc `idx` with `params`.
    fn agrees(&self, idx: usize, params: &EllipseParams) -> bool {
        let base = self.ext_arcs[idx].base_arcs(self.arcs);
        tangent_mismatches(&self.ctx(), base, params, self.ext_config)
            <= self.ext_config.max_tangent_errors
            && point_mismatch(base, params) < self.config.max_ext_arc_mismatch as f64
    }

    // ── Phase 1: shared base arcs ──────────────────────────────────────────

    fn merge_shared_arcs(&mut self) -> Vec<Ellipse> {
        let n = self.ext_arcs.len();
        let max_lb = self.ext_config.max_line_beam_center_mismatch as f64;
        let mut ellipses = Vec::new();

        for i in 0..n {
            if self.ext_arcs[i].used > 0 {
                continue;
            }
            let mut refits = [0u32; 8];
            let mut params = self.ext_arcs[i].params;
            let mut coverage = 0.0;
            let mut merged = vec![i];
            self.ext_arcs[i].used += 1;

            let mut j = 0;
            while j < merged.len() {
                let target = merged[j];
                let targets: Vec<_> = self.ext_arcs[target].base_refs().collect();
                for target_ref in targets {
                    for o in 0..n {
                        if o == i || !self.ext_arcs[o].base_refs().any(|r| r == target_ref) {
                            continue;
                        }
                        if self.ext_arcs[o].used > 0 {
                            continue;
                        }

                        merged.push(o);
                        let slot = self.ext_arcs[o].group.number() as usize - 1;
                        let fresh = refits[slot] < 1;
                        let estimate = if fresh {
                            refits[slot] += 1;
                            self.fit(&merged)
                        } else {
                            Ok(params)
                        };

                        let mut keep = false;
                        if let Ok(est) = estimate {
                            let center_ok = self.ext_arcs[o]
                                .line_beam
                                .map_or(true, |lb| lb.distance_to(est.x, est.y).abs() < max_lb);
                            keep = center_ok && self.agrees(o, &est);
                            self.ext_arcs[o].used += 1;
                            if keep && fresh {
                                params = est;
                            }
                        } else {
                            tracing::trace!(ext_arc = target, candidate = o, "merge refit failed");
                        }

                        if !keep {
                            merged.pop();
                            if fresh {
                                refits[slot] -= 1;
                            }
                        }
                    }
                }
                j += 1;
            }

            if merged.len() > 1 {
                if let Ok(est) = self.fit(&merged) {
                    params = est;
                    coverage = self.coverage(&params, &merged);
                }
            }

            if coverage > self.config.min_coverage as f64 {
                ellipses.push(Ellipse {
                    params,
                    coverage,
                    merged_arcs: merged,
                });
            } else {
                for &m in &merged {
                    self.ext_arcs[m].used = 0;
                }
            }
        }
        ellipses
    }

    // ── Phase 2: unused extended arcs joining existing ellipses ────────────

    /// An extended arc is absorbed only if the refit succeeds and the
    /// refitted ellipse still exceeds `min_coverage`; otherwise the ellipse
    /// is left as it was and the arc stays available for phase 3.
    fn absorb_unused(&mut self, ellipses: &mut [Ellipse]) {
        let min_coverage = self.config.min_coverage as f64;
        for ellipse in ellipses.iter_mut() {
            for j in 0..self.ext_arcs.len() {
                if self.ext_arcs[j].used > 0 || !self.agrees(j, &ellipse.params) {
                    continue;
                }
                ellipse.merged_arcs.push(j);
                let refit = self
                    .fit(&ellipse.merged_arcs)
                    .map(|est| (est, self.coverage(&est, &ellipse.merged_arcs)));
                match refit {
                    Ok((est, coverage)) if coverage > min_coverage => {
                        ellipse.params = est;
                        ellipse.coverage = coverage;
                        self.ext_arcs[j].used += 1;
                    }
                    _ => {
                        ellipse.merged_arcs.pop();
                        // restore the line counters of the unchanged ellipse
                        ellipse.coverage = self.coverage(&ellipse.params, &ellipse.merged_arcs);
                        tracing::trace!(
                            ellipse_arcs = ellipse.merged_arcs.len(),
                            candidate = j,
                            "absorb rejected"
                        );
                    }
                }
            }
        }
    }

    // ── Phase 3: proximity of unused extended arcs ─────────────────────────

    fn merge_by_proximity(&mut self, ellipses: &mut Vec<Ellipse>) {
        let n = self.ext_arcs.len();
        let max_center = self.config.max_center_mismatch as f64;
        let min_ratio = self.config.min_radius_match_ratio as f64;
        let ratio = |u: f64, v: f64| if u > v { v / u } else { u / v };

        for i in 0..n {
            if self.ext_arcs[i].used > 0 {
                continue;
            }
            let target = self.ext_arcs[i].params;
            let mut merged = vec![i];
            for j in 0..n {
                if i == j || self.ext_arcs[j].used > 0 {
                    continue;
                }
                let cand = &self.ext_arcs[j].params;
                if (target.x - cand.x).abs() < max_center
                    && (target.y - cand.y).abs() < max_center
                    && ratio(target.a, cand.a) > min_ratio
                    && ratio(target.b, cand.b) > min_ratio
                {
                    merged.push(j);
                }
            }

            let mut params = target;
            let mut coverage = 0.0;
            if merged.len() > 1 {
                if let Ok(est) = self.fit(&merged) {
                    params = est;
                    coverage = self.coverage(&params, &merged);
                }
            } else {
                coverage = self.coverage(&params, &merged);
            }

            if coverage > self.config.min_coverage as f64 {
                for &m in &merged {
                    self.ext_arcs[m].used += 1;
                }
                ellipses.push(Ellipse {
                    params,
                    coverage,
                    merged_arcs: merged,
                });
            }
        }
    }

    // ── Coverage ───────────────────────────────────────────────────────────

    /// Pixels of the distinct base lines over the circumference of `params`.
    ///
    /// Resets `used` on every base line first, then marks each line as it is
    /// counted so lines shared by several arcs count once.
    fn coverage(&mut self, params: &EllipseParams, members: &[usize]) -> f64 {
        for &m in members {
            for arc in self.ext_arcs[m].base_arcs(self.arcs) {
                let lines = &mut self.lines[arc.group.line_group()];
                for &l in &arc.lines {
                    lines[l].used = 0;
                }
            }
        }

        let mut pixels = 0i64;
        for &m in members {
            for arc in self.ext_arcs[m].base_arcs(self.arcs) {
                let lines = &mut self.lines[arc.group.line_group()];
                for &l in &arc.lines {
                    if lines[l].used == 0 {
                        pixels += lines[l].len as i64;
                        lines[l].used += 1;
                    }
                }
            }
        }
        pixels as f64 / params.circumference()
    }
}
