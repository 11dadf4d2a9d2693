use serde::{Deserialize, Serialize};

use crate::arcs::Arc;
use crate::ext_arcs::ExtendedArc;
use crate::geometry::{ArcGroup, ByArcGroup, ByLineGroup, LineGroup};
use crate::lines::Line;
use crate::merge::Ellipse;
use crate::segments::Segment;

/// Everything one extraction run produced, intermediate stages included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Image dimensions [width, height].
    pub image_size: [u32; 2],
    pub segments: ByLineGroup<Segment>,
    pub lines: ByLineGroup<Line>,
    pub arcs: ByArcGroup<Arc>,
    /// All extended arcs in octant order.
    pub ext_arcs: Vec<ExtendedArc>,
    pub ellipses: Vec<Ellipse>,
}

impl ExtractionResult {
    /// Construct an empty result for an image with the provided dimensions.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            image_size: [width, height],
            segments: ByLineGroup::default(),
            lines: ByLineGroup::default(),
            arcs: ByArcGroup::default(),
            ext_arcs: Vec::new(),
            ellipses: Vec::new(),
        }
    }

    pub fn segments_in(&self, group: LineGroup) -> &[Segment] {
        &self.segments[group]
    }

    pub fn lines_in(&self, group: LineGroup) -> &[Line] {
        &self.lines[group]
    }

    pub fn arcs_in(&self, group: ArcGroup) -> &[Arc] {
        &self.arcs[group]
    }

    /// Extended arcs whose middle arc lies in `group`.
    pub fn ext_arcs_in(&self, group: ArcGroup) -> impl Iterator<Item = &ExtendedArc> {
        self.ext_arcs.iter().filter(move |e| e.group == group)
    }

    /// Ellipses sorted by decreasing coverage.
    pub fn ellipses_by_coverage(&self) -> Vec<&Ellipse> {
        let mut out: Vec<&Ellipse> = self.ellipses.iter().collect();
        out.sort_by(|a, b| b.coverage.total_cmp(&a.coverage));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_has_no_entities() {
        let r = ExtractionResult::empty(64, 32);
        assert_eq!(r.image_size, [64, 32]);
        assert_eq!(r.segments.total_len(), 0);
        assert_eq!(r.lines.total_len(), 0);
        assert_eq!(r.arcs.total_len(), 0);
        assert!(ArcGroup::ALL.iter().all(|&g| r.ext_arcs_in(g).count() == 0));
        assert!(r.ellipses_by_coverage().is_empty());

        let json = serde_json::to_string(&r).unwrap();
        let back: ExtractionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
