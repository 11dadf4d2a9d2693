//! Sweep order and candidate windows of the bidirectional arc trace.

use std::f64::consts::PI;

use crate::geometry::{LineGroup, Point};
use crate::lines::Line;

use super::circle::Circle;

// ── Sweep state machine ────────────────────────────────────────────────────

/// Current sweep of an arc trace.
///
/// A trace first walks backwards from the seed line, then forwards. Each
/// direction is swept "down" then "up" through the line list; a sweep that
/// runs dry is followed by an extra sweep in the opposite list direction that
/// resumes at the last accepted line, so chains that fold back in scan
/// order are still followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TraceState {
    BackwardDown,
    BackwardUpExtra,
    BackwardUp,
    BackwardDownExtra,
    ForwardDown,
    ForwardUpExtra,
    ForwardUp,
    ForwardDownExtra,
}

/// Where the next sweep starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Restart {
    /// Continue from the last accepted line; skipped when none was accepted.
    LastFit,
    /// Restart at the seed line.
    Seed,
    /// Restart at the seed line with the chain reversed, so forward
    /// extensions are appended after the backward ones.
    SeedReversed,
}

impl TraceState {
    pub(crate) fn forward(self) -> bool {
        matches!(
            self,
            TraceState::ForwardDown
                | TraceState::ForwardUpExtra
                | TraceState::ForwardUp
                | TraceState::ForwardDownExtra
        )
    }

    /// Upward sweeps walk towards lower line indices.
    pub(crate) fn upward(self) -> bool {
        matches!(
            self,
            TraceState::BackwardUpExtra
                | TraceState::BackwardUp
                | TraceState::ForwardUpExtra
                | TraceState::ForwardUp
        )
    }

    pub(crate) fn step(self) -> isize {
        if self.upward() {
            -1
        } else {
            1
        }
    }

    /// Transition taken when the current sweep finds no more candidates.
    pub(crate) fn next(self) -> Option<(TraceState, Restart)> {
        use TraceState::*;
        match self {
            BackwardDown => Some((BackwardUpExtra, Restart::LastFit)),
            BackwardUpExtra => Some((BackwardUp, Restart::Seed)),
            BackwardUp => Some((BackwardDownExtra, Restart::LastFit)),
            BackwardDownExtra => Some((ForwardDown, Restart::SeedReversed)),
            ForwardDown => Some((ForwardUpExtra, Restart::LastFit)),
            ForwardUpExtra => Some((ForwardUp, Restart::Seed)),
            ForwardUp => Some((ForwardDownExtra, Restart::LastFit)),
            ForwardDownExtra => None,
        }
    }
}

// ── Candidate window ───────────────────────────────────────────────────────

/// Search window around the anchor endpoint of the target line.
///
/// Offsets are measured in the group frame: raw pixels for rows and
/// columns, `X = x + y`, `Y = width - 1 - x + y` for diagonals.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Window {
    anchor: (i32, i32),
    x_pos: i32,
    x_neg: i32,
    y_pos: i32,
    y_neg: i32,
}

pub(crate) struct ArcFrame {
    pub group: LineGroup,
    pub max_line_gap: i32,
    pub width: i32,
}

impl ArcFrame {
    fn coords(&self, p: Point) -> (i32, i32) {
        match self.group {
            LineGroup::Horizontal | LineGroup::Vertical => (p.x, p.y),
            LineGroup::DiagonalDown | LineGroup::DiagonalUp => p.diagonal(self.width),
        }
    }

    pub(crate) fn window(&self, target: &Line, state: TraceState) -> Window {
        let gap = self.max_line_gap;
        let up = state.upward();
        let forward = state.forward();
        let half = target.len / 2;
        // ↗ lines are stored from their far end, so the anchor flips
        let anchor_end = if self.group == LineGroup::DiagonalUp {
            !forward
        } else {
            forward
        };
        let anchor = self.coords(if anchor_end { target.end } else { target.start });

        let (x_pos, x_neg, y_pos, y_neg) = match self.group {
            LineGroup::Horizontal => {
                let (yp, yn) = if up { (gap - 1, 1) } else { (1, gap - 1) };
                (gap, half - 1, yp, yn)
            }
            LineGroup::Vertical => {
                let (xp, xn) = if up { (gap - 1, 1) } else { (1, gap - 1) };
                (xp, xn, gap, half - 1)
            }
            LineGroup::DiagonalDown => {
                let (yp, yn) = if up { (gap, 1) } else { (1, gap) };
                (2 * gap + 1, half, yp, yn)
            }
            LineGroup::DiagonalUp => {
                let (xp, xn) = if up { (1, gap) } else { (gap, 1) };
                (xp, xn, 2 * gap + 1, half)
            }
        };
        Window {
            anchor,
            x_pos,
            x_neg,
            y_pos,
            y_neg,
        }
    }

    /// Both endpoints of `cand` lie outside the window band; lines further
    /// along the list cannot come back into it.
    pub(crate) fn outside(&self, w: &Window, cand: &Line) -> bool {
        let s = self.coords(cand.start);
        let e = self.coords(cand.end);
        match self.group {
            LineGroup::Horizontal | LineGroup::DiagonalDown => {
                let range = (w.anchor.1 - w.y_pos)..=(w.anchor.1 + w.y_neg);
                !range.contains(&s.1) && !range.contains(&e.1)
            }
            LineGroup::Vertical | LineGroup::DiagonalUp => {
                let range = (w.anchor.0 - w.x_pos)..=(w.anchor.0 + w.x_neg);
                !range.contains(&s.0) && !range.contains(&e.0)
            }
        }
    }

    /// True if `cand` cannot continue the arc at `target`.
    pub(crate) fn rejects(&self, w: &Window, cand: &Line, target: &Line, state: TraceState) -> bool {
        let forward = state.forward();
        let (dx, dy) = {
            let s = self.coords(cand.start);
            let e = self.coords(cand.end);
            let a = w.anchor;
            let leading = if self.group == LineGroup::DiagonalUp {
                !forward
            } else {
                forward
            };
            if leading {
                (s.0 - a.0, s.1 - a.1)
            } else {
                (a.0 - e.0, a.1 - e.1)
            }
        };

        if dx > w.x_pos || dx < -w.x_neg || dy > w.y_pos || dy < -w.y_neg {
            return true;
        }

        let sideways = match self.group {
            LineGroup::Horizontal => (dx <= 0 && dy.abs() > 1) || (dx > 0 && dy.abs() > dx),
            LineGroup::Vertical => (dy <= 0 && dx.abs() > 1) || (dy > 0 && dx.abs() > dy),
            LineGroup::DiagonalDown => {
                (dx <= 1 && dy.abs() > 1) || (dx > 1 && (dy > dx / 2 || dy < -dx / 2))
            }
            LineGroup::DiagonalUp => (dy <= 1 && dx.abs() > 1) || (dy > 1 && dx > dy / 2),
        };
        if sideways {
            return true;
        }

        // the curvature has to keep its sense along the sweep
        let angle = cand.tangent - target.tangent;
        let same_sense = forward == state.upward();
        match self.group {
            LineGroup::Horizontal | LineGroup::DiagonalDown => {
                if same_sense {
                    angle < 0.0
                } else {
                    angle > 0.0
                }
            }
            LineGroup::Vertical | LineGroup::DiagonalUp => {
                if same_sense {
                    angle > 0.0
                } else {
                    angle < 0.0
                }
            }
        }
    }

    /// Direction of the circle tangent at `p`, in the tangent convention of
    /// the group's lines.
    pub(crate) fn circle_tangent(&self, circle: &Circle, p: Point) -> f64 {
        let dx = circle.x - p.x as f64;
        let dy = circle.y - p.y as f64;
        let mut teta = dx.atan2(dy);
        match self.group {
            LineGroup::Horizontal | LineGroup::DiagonalDown => {
                if dy < 0.0 {
                    teta += if dx >= 0.0 { -PI } else { PI };
                }
            }
            LineGroup::Vertical | LineGroup::DiagonalUp => {
                if dx < 0.0 {
                    teta += PI;
                }
            }
        }
        teta
    }
}

/// Interior angle in degrees between two line directions.
pub(crate) fn interior_angle(t1: f64, t2: f64) -> f64 {
    180.0 - ((t2 - t1) * 180.0 / PI).abs()
}
