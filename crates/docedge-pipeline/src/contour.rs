//! Contour extraction: closed boundaries of a binary map.
//!
//! This module defines the [`ContourExtractor`] trait for pluggable
//! retrieval strategies and the [`ContourMode`] enum selecting one at
//! runtime. All modes share the same border following pass
//! (`imageproc::contours::find_contours`, Suzuki-Abe) and differ only in
//! which contours they keep and how the hierarchy is reported.
//!
//! Points are stored compressed: a straight run of boundary pixels is
//! reduced to its end points, so an axis-aligned rectangle yields
//! exactly its four corners.

use image::GrayImage;
use imageproc::contours::BorderType;
use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Which contours to retrieve and how to link them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContourMode {
    /// Outer boundaries and their holes, as a two-level hierarchy.
    ///
    /// Holes point at their enclosing outer boundary. Outer boundaries
    /// nested inside a hole are lifted to the top level.
    #[default]
    TwoLevel,

    /// Only the outermost boundaries. Holes and anything inside them
    /// are dropped.
    External,

    /// Every boundary, with no hierarchy.
    List,
}

impl std::fmt::Display for ContourMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TwoLevel => f.write_str("two-level"),
            Self::External => f.write_str("external"),
            Self::List => f.write_str("list"),
        }
    }
}

/// Whether a boundary encloses foreground or background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderKind {
    /// Boundary between a foreground region and the background around it.
    Outer,
    /// Boundary of a background region enclosed by foreground.
    Hole,
}

/// A closed boundary curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contour {
    /// Turning points of the boundary, in tracing order.
    pub points: Vec<Point>,
    /// Outer boundary or hole.
    pub border: BorderKind,
    /// Index of the enclosing contour in the same [`ContourSet`].
    pub parent: Option<usize>,
}

impl Contour {
    /// Create a contour.
    #[must_use]
    pub const fn new(points: Vec<Point>, border: BorderKind, parent: Option<usize>) -> Self {
        Self {
            points,
            border,
            parent,
        }
    }

    /// Number of stored points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns `true` for hole boundaries.
    #[must_use]
    pub fn is_hole(&self) -> bool {
        self.border == BorderKind::Hole
    }
}

/// Contours in extraction order plus their hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContourSet {
    contours: Vec<Contour>,
}

impl ContourSet {
    /// Wrap contours produced elsewhere. Parent indices refer to
    /// positions within `contours`.
    #[must_use]
    pub const fn new(contours: Vec<Contour>) -> Self {
        Self { contours }
    }

    /// Number of contours.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.contours.len()
    }

    /// Returns `true` if no contours were found.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    /// The contour at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Contour> {
        self.contours.get(index)
    }

    /// Iterate contours in extraction order.
    pub fn iter(&self) -> std::slice::Iter<'_, Contour> {
        self.contours.iter()
    }

    /// All contours as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Contour] {
        &self.contours
    }

    /// Indices of contours whose parent is `index`.
    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.contours
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.parent == Some(index))
            .map(|(i, _)| i)
    }

    /// Indices of contours without a parent.
    pub fn top_level(&self) -> impl Iterator<Item = usize> + '_ {
        self.contours
            .iter()
            .enumerate()
            .filter(|(_, c)| c.parent.is_none())
            .map(|(i, _)| i)
    }

    /// Number of outer boundaries.
    #[must_use]
    pub fn outer_count(&self) -> usize {
        self.contours.iter().filter(|c| !c.is_hole()).count()
    }

    /// Number of hole boundaries.
    #[must_use]
    pub fn hole_count(&self) -> usize {
        self.contours.iter().filter(|c| c.is_hole()).count()
    }

    /// Consume the set, returning the contours.
    #[must_use]
    pub fn into_vec(self) -> Vec<Contour> {
        self.contours
    }
}

impl<'a> IntoIterator for &'a ContourSet {
    type Item = &'a Contour;
    type IntoIter = std::slice::Iter<'a, Contour>;

    fn into_iter(self) -> Self::IntoIter {
        self.contours.iter()
    }
}

/// Trait for contour retrieval strategies.
///
/// Input: a binary map (any nonzero pixel is foreground).
/// Output: closed boundaries with compressed points.
pub trait ContourExtractor {
    /// Extract contours from the given binary map.
    fn extract(&self, binary: &GrayImage) -> ContourSet;
}

impl ContourExtractor for ContourMode {
    fn extract(&self, binary: &GrayImage) -> ContourSet {
        let traced = trace_borders(binary);
        let contours = match *self {
            Self::TwoLevel => traced
                .into_iter()
                .map(|(points, border, parent)| {
                    let parent = match border {
                        BorderKind::Outer => None,
                        BorderKind::Hole => parent,
                    };
                    Contour::new(points, border, parent)
                })
                .collect(),
            Self::External => traced
                .into_iter()
                .filter(|(_, border, parent)| *border == BorderKind::Outer && parent.is_none())
                .map(|(points, border, _)| Contour::new(points, border, None))
                .collect(),
            Self::List => traced
                .into_iter()
                .map(|(points, border, _)| Contour::new(points, border, None))
                .collect(),
        };
        ContourSet::new(contours)
    }
}

/// Extract contours with the two-level hierarchy.
#[must_use = "returns the extracted contours"]
pub fn extract_contours(binary: &GrayImage) -> ContourSet {
    ContourMode::TwoLevel.extract(binary)
}

/// Border following via `imageproc::contours::find_contours`, with the
/// full Suzuki-Abe hierarchy and compressed points.
fn trace_borders(binary: &GrayImage) -> Vec<(Vec<Point>, BorderKind, Option<usize>)> {
    let contours: Vec<imageproc::contours::Contour<i32>> =
        imageproc::contours::find_contours(binary);

    contours
        .into_iter()
        .map(|c| {
            let border = match c.border_type {
                BorderType::Outer => BorderKind::Outer,
                BorderType::Hole => BorderKind::Hole,
            };
            let points: Vec<Point> = c.points.into_iter().map(Point::from).collect();
            (compress_chain(&points), border, c.parent)
        })
        .collect()
}

/// Reduce a closed chain of boundary pixels to its turning points.
///
/// Repeated consecutive points are merged first. A point is kept when
/// the step into it and the step out of it (wrapping around the chain)
/// point in different directions.
#[must_use]
pub fn compress_chain(points: &[Point]) -> Vec<Point> {
    let mut chain: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if chain.last() != Some(&p) {
            chain.push(p);
        }
    }
    while chain.len() > 1 && chain.first() == chain.last() {
        chain.pop();
    }
    if chain.len() <= 2 {
        return chain;
    }

    let n = chain.len();
    let direction = |from: Point, to: Point| ((to.x - from.x).signum(), (to.y - from.y).signum());
    let turning: Vec<Point> = (0..n)
        .filter(|&i| {
            let prev = chain[(i + n - 1) % n];
            let curr = chain[i];
            let next = chain[(i + 1) % n];
            direction(prev, curr) != direction(curr, next)
        })
        .map(|i| chain[i])
        .collect();

    if turning.is_empty() {
        chain.truncate(1);
        chain
    } else {
        turning
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;

    fn fill(img: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, value: u8) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                img.put_pixel(x, y, Luma([value]));
            }
        }
    }

    /// A filled square with a square hole, and a small filled square
    /// inside the hole.
    fn nested() -> GrayImage {
        let mut img = GrayImage::new(40, 40);
        fill(&mut img, 5, 5, 34, 34, 255);
        fill(&mut img, 10, 10, 29, 29, 0);
        fill(&mut img, 15, 15, 24, 24, 255);
        fill(&mut img, 18, 18, 21, 21, 0);
        img
    }

    #[test]
    fn default_is_two_level() {
        assert_eq!(ContourMode::default(), ContourMode::TwoLevel);
    }

    #[test]
    fn empty_image_produces_no_contours() {
        let img = GrayImage::new(10, 10);
        for mode in [ContourMode::TwoLevel, ContourMode::External, ContourMode::List] {
            assert!(mode.extract(&img).is_empty());
        }
    }

    #[test]
    fn filled_rectangle_compresses_to_corners() {
        let mut img = GrayImage::new(30, 20);
        fill(&mut img, 4, 3, 23, 12, 200);
        let set = extract_contours(&img);
        assert_eq!(set.len(), 1);

        let contour = set.get(0).unwrap();
        assert_eq!(contour.border, BorderKind::Outer);
        assert_eq!(contour.parent, None);

        let mut corners = contour.points.clone();
        corners.sort_unstable();
        assert_eq!(
            corners,
            vec![
                Point::new(4, 3),
                Point::new(4, 12),
                Point::new(23, 3),
                Point::new(23, 12),
            ]
        );
    }

    #[test]
    fn two_level_links_holes_and_lifts_nested_outers() {
        let set = ContourMode::TwoLevel.extract(&nested());
        assert_eq!(set.len(), 4);
        assert_eq!(set.outer_count(), 2);
        assert_eq!(set.hole_count(), 2);

        let within = |c: &Contour, lo: i32, hi: i32| {
            c.points
                .iter()
                .all(|p| (lo..=hi).contains(&p.x) && (lo..=hi).contains(&p.y))
        };
        let find = |wanted: BorderKind, lo: i32, hi: i32| {
            set.iter()
                .position(|c| c.border == wanted && within(c, lo, hi) && !within(c, lo + 3, hi - 3))
                .unwrap()
        };
        let outer = find(BorderKind::Outer, 5, 34);
        let hole = find(BorderKind::Hole, 9, 30);
        let inner_outer = find(BorderKind::Outer, 15, 24);
        let inner_hole = find(BorderKind::Hole, 17, 22);

        // Both outer boundaries sit at the top level.
        assert_eq!(set.get(outer).unwrap().parent, None);
        assert_eq!(set.get(inner_outer).unwrap().parent, None);
        assert_eq!(set.top_level().collect::<Vec<_>>(), {
            let mut top = vec![outer, inner_outer];
            top.sort_unstable();
            top
        });

        // Each hole points at the outer boundary directly enclosing it,
        // including the one that was lifted.
        assert_eq!(set.get(hole).unwrap().parent, Some(outer));
        assert_eq!(set.get(inner_hole).unwrap().parent, Some(inner_outer));
        assert_eq!(set.children(outer).collect::<Vec<_>>(), vec![hole]);
        assert_eq!(set.children(inner_outer).collect::<Vec<_>>(), vec![inner_hole]);
    }

    #[test]
    fn external_keeps_only_outermost() {
        let set = ContourMode::External.extract(&nested());
        assert_eq!(set.len(), 1);
        let contour = set.get(0).unwrap();
        assert_eq!(contour.border, BorderKind::Outer);
        assert!(contour.points.contains(&Point::new(5, 5)));
    }

    #[test]
    fn list_keeps_everything_flat() {
        let set = ContourMode::List.extract(&nested());
        assert_eq!(set.len(), 4);
        assert_eq!(set.top_level().count(), 4);
    }

    #[test]
    fn extraction_is_deterministic() {
        let img = nested();
        assert_eq!(extract_contours(&img), extract_contours(&img));
    }

    #[test]
    fn compress_keeps_turns_only() {
        let chain: Vec<Point> = [(0, 0), (1, 0), (2, 0), (2, 1), (2, 2), (1, 2), (0, 2), (0, 1)]
            .into_iter()
            .map(|(x, y)| Point::new(x, y))
            .collect();
        assert_eq!(
            compress_chain(&chain),
            vec![
                Point::new(0, 0),
                Point::new(2, 0),
                Point::new(2, 2),
                Point::new(0, 2),
            ]
        );
    }

    #[test]
    fn compress_handles_start_mid_edge() {
        let chain: Vec<Point> = [(1, 0), (2, 0), (2, 1), (2, 2), (1, 2), (0, 2), (0, 1), (0, 0)]
            .into_iter()
            .map(|(x, y)| Point::new(x, y))
            .collect();
        let compressed = compress_chain(&chain);
        assert_eq!(compressed.len(), 4);
        assert!(!compressed.contains(&Point::new(1, 0)));
    }

    #[test]
    fn compress_degenerate_chains() {
        assert!(compress_chain(&[]).is_empty());
        let single = [Point::new(3, 3), Point::new(3, 3)];
        assert_eq!(compress_chain(&single), vec![Point::new(3, 3)]);
        let pair = [Point::new(0, 0), Point::new(1, 1)];
        assert_eq!(compress_chain(&pair), pair.to_vec());
    }

    #[test]
    fn mode_serde_uses_snake_case() {
        let json = serde_json::to_string(&ContourMode::TwoLevel).unwrap();
        assert_eq!(json, "\"two_level\"");
        let mode: ContourMode = serde_json::from_str("\"external\"").unwrap();
        assert_eq!(mode, ContourMode::External);
    }
}
