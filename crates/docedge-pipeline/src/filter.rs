//! Candidate selection: size filter, polygon approximation, vertex-count
//! filter and convex hull.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::contour::ContourSet;
use crate::geometry;
use crate::simplify::approximate_closed;
use crate::types::{Candidate, PipelineConfig, Polygon};

/// Why a contour did not become a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The contour has no points.
    Malformed,
    /// Area or perimeter at or below the configured minimum.
    TooSmall {
        /// Enclosed area of the contour.
        area: f64,
        /// Closed perimeter of the contour.
        perimeter: f64,
    },
    /// The approximated polygon's vertex count is out of range.
    VertexCount {
        /// Vertices of the approximated polygon.
        vertices: usize,
    },
}

/// Outcome for one contour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The contour produced a candidate.
    Accepted,
    /// The contour was dropped.
    Skipped(SkipReason),
}

/// Per-contour decisions plus the accepted candidates.
///
/// `decisions[i]` describes contour `i` of the input [`ContourSet`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterReport {
    /// One decision per input contour, in extraction order.
    pub decisions: Vec<Decision>,
    /// Accepted candidates, in extraction order.
    pub candidates: Vec<Candidate>,
}

impl FilterReport {
    /// Number of accepted contours.
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.candidates.len()
    }

    /// Number of contours skipped for having no points.
    #[must_use]
    pub fn malformed(&self) -> usize {
        self.count(|r| matches!(r, SkipReason::Malformed))
    }

    /// Number of contours skipped by the area/perimeter filter.
    #[must_use]
    pub fn too_small(&self) -> usize {
        self.count(|r| matches!(r, SkipReason::TooSmall { .. }))
    }

    /// Number of contours skipped for their vertex count.
    #[must_use]
    pub fn wrong_vertex_count(&self) -> usize {
        self.count(|r| matches!(r, SkipReason::VertexCount { .. }))
    }

    fn count(&self, pred: impl Fn(&SkipReason) -> bool) -> usize {
        self.decisions
            .iter()
            .filter(|d| matches!(d, Decision::Skipped(reason) if pred(reason)))
            .count()
    }
}

/// Select candidates from extracted contours.
///
/// See [`filter_with_report`] for the per-contour rules.
#[must_use = "returns the accepted candidates"]
pub fn filter_and_approximate(contours: &ContourSet, config: &PipelineConfig) -> Vec<Candidate> {
    filter_with_report(contours, config).candidates
}

/// Select candidates from extracted contours, recording every decision.
///
/// For each contour, in extraction order:
///
/// 1. Contours without points are skipped as malformed.
/// 2. Contours whose area is at most `min_area` or whose perimeter is at
///    most `min_perimeter` are skipped without approximation.
/// 3. The contour is approximated with the configured tolerance
///    ([`PipelineConfig::effective_epsilon`]).
/// 4. Polygons with a vertex count outside
///    `min_vertices..=max_vertices` are skipped.
/// 5. The convex hull and bounding box of the source contour complete
///    the candidate.
#[must_use = "returns the filter report"]
#[instrument(skip_all, fields(contours = contours.len()))]
pub fn filter_with_report(contours: &ContourSet, config: &PipelineConfig) -> FilterReport {
    let mut report = FilterReport {
        decisions: Vec::with_capacity(contours.len()),
        candidates: Vec::new(),
    };

    for (index, contour) in contours.iter().enumerate() {
        let points = contour.points.as_slice();
        if points.is_empty() {
            warn!(contour = index, "skipping malformed contour with no points");
            report.decisions.push(Decision::Skipped(SkipReason::Malformed));
            continue;
        }

        let area = geometry::signed_area(points).abs();
        let perimeter = geometry::perimeter(points);
        if area <= config.min_area || perimeter <= config.min_perimeter {
            debug!(contour = index, area, perimeter, "contour too small");
            report
                .decisions
                .push(Decision::Skipped(SkipReason::TooSmall { area, perimeter }));
            continue;
        }

        let bounding_box = geometry::bounding_box(points);
        let epsilon = config.effective_epsilon(bounding_box);
        let polygon = approximate_closed(points, epsilon);
        let vertices = polygon.len();
        if !(config.min_vertices..=config.max_vertices).contains(&vertices) {
            debug!(contour = index, vertices, epsilon, "vertex count out of range");
            report
                .decisions
                .push(Decision::Skipped(SkipReason::VertexCount { vertices }));
            continue;
        }

        debug!(contour = index, vertices, area, perimeter, "candidate accepted");
        report.decisions.push(Decision::Accepted);
        report.candidates.push(Candidate {
            contour_index: index,
            polygon: Polygon::new(polygon),
            hull: Polygon::new(geometry::convex_hull(points)),
            area,
            perimeter,
            bounding_box,
        });
    }

    report
}
