//! Pixel coordinates, scan-direction groups and octant groups.
//!
//! Segments and lines are bucketed by the [`LineGroup`] (scan direction) they
//! were found in; arcs, extended arcs and the adjacency between them by the
//! [`ArcGroup`] octant. Both enums keep the numbering used in diagnostics
//! output (1-based, 0 meaning "all groups").

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut, Sub};

// ── Point ──────────────────────────────────────────────────────────────────

/// Integer pixel coordinate (x to the right, y downwards).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean length, computed in `i64` to stay clear of overflow.
    pub fn norm_squared(self) -> i64 {
        let x = self.x as i64;
        let y = self.y as i64;
        x * x + y * y
    }

    pub fn norm(self) -> f64 {
        (self.norm_squared() as f64).sqrt()
    }

    /// Dot product in `i64`.
    pub fn dot(self, other: Point) -> i64 {
        self.x as i64 * other.x as i64 + self.y as i64 * other.y as i64
    }

    /// Rotated diagonal frame used by the ↘/↗ groups: `X = x + y`,
    /// `Y = width - 1 - x + y`.
    pub(crate) fn diagonal(self, width: i32) -> (i32, i32) {
        (self.x + self.y, width - 1 - self.x + self.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

// ── Line groups ────────────────────────────────────────────────────────────

/// Scan direction of a segment or line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineGroup {
    /// Rows, scanned left to right.
    Horizontal,
    /// Columns, scanned top to bottom.
    Vertical,
    /// ↘ diagonals.
    DiagonalDown,
    /// ↗ diagonals.
    DiagonalUp,
}

impl LineGroup {
    pub const ALL: [LineGroup; 4] = [
        LineGroup::Horizontal,
        LineGroup::Vertical,
        LineGroup::DiagonalDown,
        LineGroup::DiagonalUp,
    ];

    /// Group number 1..=4.
    pub fn number(self) -> u8 {
        self.slot() as u8 + 1
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.get((n as usize).checked_sub(1)?).copied()
    }

    fn slot(self) -> usize {
        match self {
            LineGroup::Horizontal => 0,
            LineGroup::Vertical => 1,
            LineGroup::DiagonalDown => 2,
            LineGroup::DiagonalUp => 3,
        }
    }

    /// Offset between consecutive pixels along a scan line of this group.
    pub fn step(self) -> (i32, i32) {
        match self {
            LineGroup::Horizontal => (1, 0),
            LineGroup::Vertical => (0, 1),
            LineGroup::DiagonalDown => (1, 1),
            LineGroup::DiagonalUp => (1, -1),
        }
    }

    /// The two octants whose arcs are traced from lines of this group.
    ///
    /// The first one is chosen when the estimated center lies on the
    /// "inner" side of the chain start, the second otherwise.
    pub fn arc_groups(self) -> (ArcGroup, ArcGroup) {
        match self {
            LineGroup::Horizontal => (ArcGroup::Top, ArcGroup::Bottom),
            LineGroup::Vertical => (ArcGroup::Right, ArcGroup::Left),
            LineGroup::DiagonalDown => (ArcGroup::TopRight, ArcGroup::BottomLeft),
            LineGroup::DiagonalUp => (ArcGroup::BottomRight, ArcGroup::TopLeft),
        }
    }
}

// ── Arc groups ─────────────────────────────────────────────────────────────

/// Octant of an ellipse boundary, numbered 1..=8 clockwise from the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArcGroup {
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
    TopLeft,
}

impl ArcGroup {
    pub const ALL: [ArcGroup; 8] = [
        ArcGroup::Top,
        ArcGroup::TopRight,
        ArcGroup::Right,
        ArcGroup::BottomRight,
        ArcGroup::Bottom,
        ArcGroup::BottomLeft,
        ArcGroup::Left,
        ArcGroup::TopLeft,
    ];

    /// Group number 1..=8.
    pub fn number(self) -> u8 {
        self.slot() as u8 + 1
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.get((n as usize).checked_sub(1)?).copied()
    }

    fn slot(self) -> usize {
        match self {
            ArcGroup::Top => 0,
            ArcGroup::TopRight => 1,
            ArcGroup::Right => 2,
            ArcGroup::BottomRight => 3,
            ArcGroup::Bottom => 4,
            ArcGroup::BottomLeft => 5,
            ArcGroup::Left => 6,
            ArcGroup::TopLeft => 7,
        }
    }

    /// Scan direction of the lines an arc of this octant is made of.
    pub fn line_group(self) -> LineGroup {
        match self {
            ArcGroup::Top | ArcGroup::Bottom => LineGroup::Horizontal,
            ArcGroup::Right | ArcGroup::Left => LineGroup::Vertical,
            ArcGroup::TopRight | ArcGroup::BottomLeft => LineGroup::DiagonalDown,
            ArcGroup::BottomRight | ArcGroup::TopLeft => LineGroup::DiagonalUp,
        }
    }

    pub fn predecessor(self) -> ArcGroup {
        Self::ALL[(self.slot() + 7) % 8]
    }

    pub fn successor(self) -> ArcGroup {
        Self::ALL[(self.slot() + 1) % 8]
    }

    /// `[predecessor, self, successor]`, the octants an extended arc spans.
    pub fn neighborhood(self) -> [ArcGroup; 3] {
        [self.predecessor(), self, self.successor()]
    }

    /// Octants 1..=4 store their lines start→end; 5..=8 end→start.
    pub fn is_leading(self) -> bool {
        self.slot() < 4
    }
}

// ── Per-group storage ──────────────────────────────────────────────────────

/// One vector per scan direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByLineGroup<T>([Vec<T>; 4]);

impl<T> Default for ByLineGroup<T> {
    fn default() -> Self {
        Self(Default::default())
    }
}

impl<T> ByLineGroup<T> {
    /// Flattened view in group order, the "group 0" aggregate.
    pub fn iter_all(&self) -> impl Iterator<Item = &T> {
        self.0.iter().flatten()
    }

    pub fn total_len(&self) -> usize {
        self.0.iter().map(Vec::len).sum()
    }

    pub fn counts(&self) -> [usize; 4] {
        [self.0[0].len(), self.0[1].len(), self.0[2].len(), self.0[3].len()]
    }
}

impl<T> Index<LineGroup> for ByLineGroup<T> {
    type Output = Vec<T>;

    fn index(&self, group: LineGroup) -> &Vec<T> {
        &self.0[group.slot()]
    }
}

impl<T> IndexMut<LineGroup> for ByLineGroup<T> {
    fn index_mut(&mut self, group: LineGroup) -> &mut Vec<T> {
        &mut self.0[group.slot()]
    }
}

/// One vector per octant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByArcGroup<T>([Vec<T>; 8]);

impl<T> Default for ByArcGroup<T> {
    fn default() -> Self {
        Self(Default::default())
    }
}

impl<T> ByArcGroup<T> {
    /// Flattened view in octant order, the "group 0" aggregate.
    pub fn iter_all(&self) -> impl Iterator<Item = &T> {
        self.0.iter().flatten()
    }

    pub fn total_len(&self) -> usize {
        self.0.iter().map(Vec::len).sum()
    }
}

impl<T> Index<ArcGroup> for ByArcGroup<T> {
    type Output = Vec<T>;

    fn index(&self, group: ArcGroup) -> &Vec<T> {
        &self.0[group.slot()]
    }
}

impl<T> IndexMut<ArcGroup> for ByArcGroup<T> {
    fn index_mut(&mut self, group: ArcGroup) -> &mut Vec<T> {
        &mut self.0[group.slot()]
    }
}
