//! Tuning parameters for every extraction stage.
//!
//! Defaults reproduce the reference tuning of the fast ellipse extractor and
//! work well on one-pixel wide binary edge maps (e.g. Canny output).

use serde::{Deserialize, Serialize};

/// Run-length segment detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Minimum number of pixels of a segment. Useful range: 1..=3.
    pub min_segment_len: i32,
    /// Maximum intensity difference between neighbouring pixels of one
    /// segment. 0 means all pixels of a segment share one value.
    pub segment_tolerance: i32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_segment_len: 2,
            segment_tolerance: 0,
        }
    }
}

/// Grouping of segments into straight lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Pixel gap allowed between consecutive segments of a line.
    ///
    /// 1 only groups touching segments, larger values bridge holes in the
    /// edge map. Useful range: 1..=2.
    pub max_segment_gap: i32,
    /// Minimum span of an extracted line in pixels. Useful range: 4..=10.
    pub min_line_len: i32,
    /// Maximum deviation (pixels) of the longest member segment from the
    /// line through the current chain endpoints. Useful range: 0.5..=1.0.
    pub max_quantization_error: f32,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            max_segment_gap: 1,
            min_line_len: 6,
            max_quantization_error: 0.74,
        }
    }
}

/// Tracing of lines into circular arcs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcConfig {
    /// Gap (pixels) allowed between the endpoints of consecutive lines of an
    /// arc. Useful range: 1..=5.
    pub max_line_gap: i32,
    /// Maximum difference (degrees) between a line tangent and the tangent of
    /// the estimated circle at the line midpoint. Useful range: 8.5..=20.
    pub max_line_tangent_error: f32,
}

impl Default for ArcConfig {
    fn default() -> Self {
        Self {
            max_line_gap: 3,
            max_line_tangent_error: 14.0,
        }
    }
}

/// How much geometric validation an extended arc has to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    /// Interior angles between the base lines only.
    InteriorAngles,
    /// Additionally compare line tangents with the fitted ellipse.
    Tangents,
    /// Additionally require the line-beam to pass near the ellipse center.
    LineBeam,
}

impl ValidationStage {
    pub fn checks_tangents(self) -> bool {
        !matches!(self, ValidationStage::InteriorAngles)
    }

    pub fn checks_line_beam(self) -> bool {
        matches!(self, ValidationStage::LineBeam)
    }
}

/// Assembly of arc triples into extended elliptic arcs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedArcConfig {
    /// Maximum x/y distance (pixels) between the end of one arc and the
    /// start of the next. Useful range: 10..=50.
    pub max_arc_gap: i32,
    /// Maximum difference (degrees) between a base line tangent and the
    /// fitted ellipse tangent. Useful range: 10..=20.
    pub max_arc_tangent_error: f32,
    /// Minimum ratio of the start-start distance of two arcs to the chord of
    /// the first one. Useful range: 0.5..=1.0.
    pub min_arc_distance_ratio: f32,
    /// Maximum angle (degrees) between the chord of the first arc and the
    /// vector joining both arc starts. Useful range: 10..=20.
    pub max_arc_distance_angle: f32,
    /// Gap size (pixels) from which the gap direction has to follow the arc
    /// end tangents. Useful range: 1..=3.
    pub min_gap_angle_distance: i32,
    /// Maximum angle (degrees) between the gap vector and the arc end
    /// tangents. Useful range: 20..=40.
    pub max_gap_angle: f32,
    /// Maximum overlap (pixels) tolerated when two arcs run antiparallel over
    /// their gap. Useful range: 1..=3.
    pub max_arc_overlap_gap: f32,
    /// Allowed number of convexity violations between the lines of two arcs.
    pub max_interior_angle_mismatches: usize,
    /// Allowed number of base lines whose tangent disagrees with the fit.
    pub max_tangent_errors: usize,
    /// Maximum distance (pixels) between the fitted center and the
    /// line-beam through the tangent intersection. Useful range: 1..=10.
    pub max_line_beam_center_mismatch: f32,
    pub validation_stage: ValidationStage,
}

impl Default for ExtendedArcConfig {
    fn default() -> Self {
        Self {
            max_arc_gap: 25,
            max_arc_tangent_error: 18.0,
            min_arc_distance_ratio: 0.56,
            max_arc_distance_angle: 16.0,
            min_gap_angle_distance: 2,
            max_gap_angle: 30.0,
            max_arc_overlap_gap: 1.0,
            max_interior_angle_mismatches: 1,
            max_tangent_errors: 1,
            max_line_beam_center_mismatch: 4.0,
            validation_stage: ValidationStage::LineBeam,
        }
    }
}

/// Merging of extended arcs into ellipses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Maximum ellipse-equation residual at the arc endpoints of a candidate
    /// extended arc. Useful range: 0.1..=0.5.
    pub max_ext_arc_mismatch: f32,
    /// Maximum x/y center offset (pixels) for proximity merging.
    pub max_center_mismatch: f32,
    /// Minimum smaller/larger ratio of matching semi-axes for proximity
    /// merging. Useful range: 0.7..=0.95.
    pub min_radius_match_ratio: f32,
    /// Minimum fraction of the circumference covered by edge pixels for an
    /// ellipse to be reported. Useful range: 0.2..=0.7.
    pub min_coverage: f32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_ext_arc_mismatch: 0.3,
            max_center_mismatch: 5.0,
            min_radius_match_ratio: 0.8,
            min_coverage: 0.25,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub segments: SegmentConfig,
    pub lines: LineConfig,
    pub arcs: ArcConfig,
    pub ext_arcs: ExtendedArcConfig,
    pub merge: MergeConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_keeps_fields() {
        let mut cfg = ExtractionConfig::default();
        cfg.lines.min_line_len = 9;
        cfg.ext_arcs.validation_stage = ValidationStage::Tangents;
        cfg.merge.min_coverage = 0.4;

        let json = serde_json::to_string(&cfg).unwrap();
        let back: ExtractionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.lines.min_line_len, 9);
        assert_eq!(back.ext_arcs.validation_stage, ValidationStage::Tangents);
        assert_eq!(back.merge.min_coverage, 0.4);
        assert_eq!(back.arcs.max_line_gap, 3);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{ "segments": { "min_segment_len": 3 }, "ext_arcs": { "validation_stage": "interior_angles" } }"#;
        let cfg: ExtractionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.segments.min_segment_len, 3);
        assert_eq!(cfg.segments.segment_tolerance, 0);
        assert_eq!(cfg.ext_arcs.max_arc_gap, 25);
        assert!(!cfg.ext_arcs.validation_stage.checks_tangents());
        assert_eq!(cfg.lines.max_quantization_error, 0.74);
    }

    #[test]
    fn validation_stages_are_cumulative() {
        assert!(!ValidationStage::InteriorAngles.checks_line_beam());
        assert!(ValidationStage::Tangents.checks_tangents());
        assert!(!ValidationStage::Tangents.checks_line_beam());
        assert!(ValidationStage::LineBeam.checks_tangents());
        assert!(ValidationStage::LineBeam.checks_line_beam());
    }
}
