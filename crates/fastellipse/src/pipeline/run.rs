//! Top-level pipeline: segments → lines → arcs → extended arcs → ellipses.

use image::GrayImage;

use super::ExtractionResult;
use crate::arcs::extract_arcs;
use crate::config::ExtractionConfig;
use crate::ext_arcs::build_extended_arcs;
use crate::geometry::{ByArcGroup, ByLineGroup, LineGroup};
use crate::lines::extract_lines;
use crate::merge::merge_ellipses;
use crate::segments::detect_segments;

/// Run every stage on `image`. All containers are built fresh.
pub(crate) fn extract(image: &GrayImage, config: &ExtractionConfig) -> ExtractionResult {
    let (w, h) = image.dimensions();
    let width = w as i32;

    let mut segments = detect_segments(image, &config.segments);

    let mut lines = ByLineGroup::default();
    for group in LineGroup::ALL {
        lines[group] = extract_lines(group, &mut segments[group], &config.lines, width);
    }

    let mut arcs = ByArcGroup::default();
    for group in LineGroup::ALL {
        let (first, second) =
            extract_arcs(group, &mut lines[group], &segments[group], &config.arcs, width);
        let (ga, gb) = group.arc_groups();
        arcs[ga] = first;
        arcs[gb] = second;
    }

    let mut ext_arcs = build_extended_arcs(&segments, &lines, &mut arcs, &config.ext_arcs);
    let ellipses = merge_ellipses(
        &mut ext_arcs,
        &segments,
        &mut lines,
        &arcs,
        &config.ext_arcs,
        &config.merge,
    );

    tracing::info!(
        segments = segments.total_len(),
        lines = lines.total_len(),
        arcs = arcs.total_len(),
        "{} ellipses from {} extended arcs",
        ellipses.len(),
        ext_arcs.len()
    );

    ExtractionResult {
        image_size: [w, h],
        segments,
        lines,
        arcs,
        ext_arcs,
        ellipses,
    }
}
