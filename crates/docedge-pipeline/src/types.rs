//! Shared types for the docedge detection pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::contour::{ContourSet, ContourMode};
use crate::filter::FilterReport;
use crate::frame::Frame;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// A 2D point on the pixel grid.
///
/// Contour and polygon vertices are always integer pixel coordinates;
/// geometry helpers promote to `f64` internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    /// Column (pixels from left edge).
    pub x: i32,
    /// Row (pixels from top edge).
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(other.y - self.y);
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

impl From<imageproc::point::Point<i32>> for Point {
    fn from(p: imageproc::point::Point<i32>) -> Self {
        Self::new(p.x, p.y)
    }
}

/// A closed polygon: the last vertex connects back to the first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    /// Create a polygon from its vertices.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polygon has no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// All vertices in order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polygon and returns its vertices.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Absolute enclosed area (shoelace formula).
    #[must_use]
    pub fn area(&self) -> f64 {
        crate::geometry::signed_area(&self.0).abs()
    }

    /// Closed perimeter length.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        crate::geometry::perimeter(&self.0)
    }

    /// Whether every turn along the outline bends the same way.
    #[must_use]
    pub fn is_convex(&self) -> bool {
        crate::geometry::is_convex(&self.0)
    }
}

/// Axis-aligned bounding box in pixel units.
///
/// Follows the inclusive-pixel convention: a single pixel has
/// `width == height == 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left-most column.
    pub x: i32,
    /// Top-most row.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl BoundingBox {
    /// Area of the box in pixels.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width divided by height (`0.0` for an empty box).
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels (columns).
    pub width: u32,
    /// Height in pixels (rows).
    pub height: u32,
}

/// An RGB stroke color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Create a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Luma of this color using the BT.601 weights
    /// (`0.299*R + 0.587*G + 0.114*B`), for drawing on grayscale frames.
    #[must_use]
    pub fn luma(self) -> u8 {
        crate::frame::luma(self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ErrorKind;

    /// Parse `"R,G,B"` (decimal) or `"#RRGGBB"` (hex).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            // `from_str_radix` alone would accept a leading sign.
            if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ErrorKind::InvalidConfig(format!(
                    "hex color must have 6 hex digits, got '{s}'"
                )));
            }
            let channel = |range: std::ops::Range<usize>| {
                hex.get(range)
                    .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                    .ok_or_else(|| ErrorKind::InvalidConfig(format!("invalid hex color '{s}'")))
            };
            return Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?));
        }

        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [r, g, b] = parts.as_slice() else {
            return Err(ErrorKind::InvalidConfig(format!(
                "color must be 'R,G,B' or '#RRGGBB', got '{s}'"
            )));
        };
        let channel = |v: &str| {
            v.parse::<u8>()
                .map_err(|e| ErrorKind::InvalidConfig(format!("invalid color channel '{v}': {e}")))
        };
        Ok(Self::new(channel(r)?, channel(g)?, channel(b)?))
    }
}

/// Configuration for the detection pipeline.
///
/// Defaults reproduce the tuning used for hand-held camera frames of
/// paper documents. Deserialization fills missing fields from
/// [`Default`], so partial JSON documents are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Intensity cutoff for binarization. Pixels strictly brighter
    /// become foreground.
    pub binary_threshold: u8,

    /// Value written for foreground pixels in the binary map.
    pub binary_max_value: u8,

    /// Contours with an enclosed area at or below this are discarded.
    pub min_area: f64,

    /// Contours with a perimeter at or below this are discarded.
    pub min_perimeter: f64,

    /// Smallest accepted vertex count of the simplified polygon.
    pub min_vertices: usize,

    /// Largest accepted vertex count of the simplified polygon.
    pub max_vertices: usize,

    /// Maximum deviation (pixels) between a contour and its simplified
    /// polygon. Larger values yield fewer vertices.
    pub approx_epsilon: f64,

    /// Upper bound on the tolerance as a fraction of the shorter side of
    /// the contour's bounding box. The effective tolerance is
    /// `min(approx_epsilon, cap * min(width, height))`; `None` disables
    /// the cap.
    pub approx_epsilon_extent_cap: Option<f64>,

    /// Which contours the extractor retrieves and how they nest.
    pub contour_mode: ContourMode,

    /// Outline color for accepted polygons.
    pub stroke_color: Color,

    /// Outline width in pixels.
    pub stroke_thickness: u32,

    /// Also outline each candidate's convex hull (drawn before the
    /// polygons).
    pub draw_hulls: bool,

    /// Outline color for convex hulls.
    pub hull_color: Color,

    /// Hull outline width in pixels.
    pub hull_thickness: u32,
}

impl PipelineConfig {
    /// Default binarization cutoff.
    pub const DEFAULT_BINARY_THRESHOLD: u8 = 100;
    /// Default foreground value of the binary map.
    pub const DEFAULT_BINARY_MAX_VALUE: u8 = 200;
    /// Default minimum contour area.
    pub const DEFAULT_MIN_AREA: f64 = 50.0;
    /// Default minimum contour perimeter.
    pub const DEFAULT_MIN_PERIMETER: f64 = 50.0;
    /// Default minimum polygon vertex count.
    pub const DEFAULT_MIN_VERTICES: usize = 4;
    /// Default maximum polygon vertex count.
    pub const DEFAULT_MAX_VERTICES: usize = 5;
    /// Default simplification tolerance in pixels.
    pub const DEFAULT_APPROX_EPSILON: f64 = 100.0;
    /// Default fraction of the shorter bounding-box side capping the
    /// tolerance.
    pub const DEFAULT_APPROX_EPSILON_EXTENT_CAP: f64 = 0.5;
    /// Default outline color.
    pub const DEFAULT_STROKE_COLOR: Color = Color::new(255, 0, 122);
    /// Default outline width.
    pub const DEFAULT_STROKE_THICKNESS: u32 = 3;
    /// Default hull outline width.
    pub const DEFAULT_HULL_THICKNESS: u32 = 2;

    /// Tolerance used to simplify a contour with the given bounding box.
    ///
    /// A corner of a rectangle lies at least half its shorter side away
    /// from the diagonal, so the default cap keeps every rectangle's
    /// corners whatever its aspect ratio.
    #[must_use]
    pub fn effective_epsilon(&self, bounds: BoundingBox) -> f64 {
        match self.approx_epsilon_extent_cap {
            Some(fraction) => {
                let extent = f64::from(bounds.width.min(bounds.height));
                self.approx_epsilon.min(fraction * extent)
            }
            None => self.approx_epsilon,
        }
    }

    /// Check the configuration for values the pipeline cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConfig`] describing the first
    /// offending field.
    pub fn validate(&self) -> Result<(), ErrorKind> {
        let non_negative = |name: &str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ErrorKind::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )))
            }
        };
        non_negative("min_area", self.min_area)?;
        non_negative("min_perimeter", self.min_perimeter)?;
        non_negative("approx_epsilon", self.approx_epsilon)?;

        if let Some(cap) = self.approx_epsilon_extent_cap
            && !(cap.is_finite() && cap > 0.0)
        {
            return Err(ErrorKind::InvalidConfig(format!(
                "approx_epsilon_extent_cap must be finite and positive, got {cap}"
            )));
        }
        if self.min_vertices == 0 {
            return Err(ErrorKind::InvalidConfig(
                "min_vertices must be at least 1".to_string(),
            ));
        }
        if self.min_vertices > self.max_vertices {
            return Err(ErrorKind::InvalidConfig(format!(
                "min_vertices ({}) exceeds max_vertices ({})",
                self.min_vertices, self.max_vertices
            )));
        }
        if self.stroke_thickness == 0 {
            return Err(ErrorKind::InvalidConfig(
                "stroke_thickness must be at least 1".to_string(),
            ));
        }
        if self.draw_hulls && self.hull_thickness == 0 {
            return Err(ErrorKind::InvalidConfig(
                "hull_thickness must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            binary_threshold: Self::DEFAULT_BINARY_THRESHOLD,
            binary_max_value: Self::DEFAULT_BINARY_MAX_VALUE,
            min_area: Self::DEFAULT_MIN_AREA,
            min_perimeter: Self::DEFAULT_MIN_PERIMETER,
            min_vertices: Self::DEFAULT_MIN_VERTICES,
            max_vertices: Self::DEFAULT_MAX_VERTICES,
            approx_epsilon: Self::DEFAULT_APPROX_EPSILON,
            approx_epsilon_extent_cap: Some(Self::DEFAULT_APPROX_EPSILON_EXTENT_CAP),
            contour_mode: ContourMode::default(),
            stroke_color: Self::DEFAULT_STROKE_COLOR,
            stroke_thickness: Self::DEFAULT_STROKE_THICKNESS,
            draw_hulls: false,
            hull_color: Self::DEFAULT_STROKE_COLOR,
            hull_thickness: Self::DEFAULT_HULL_THICKNESS,
        }
    }
}

/// A quadrilateral-like region accepted by the filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Index of the source contour in the extracted [`ContourSet`].
    pub contour_index: usize,
    /// The simplified polygon (vertex count within the configured range).
    pub polygon: Polygon,
    /// Convex hull of the source contour.
    pub hull: Polygon,
    /// Absolute area enclosed by the source contour.
    pub area: f64,
    /// Closed perimeter of the source contour.
    pub perimeter: f64,
    /// Bounding box of the source contour.
    pub bounding_box: BoundingBox,
}

impl Candidate {
    /// Number of vertices in the simplified polygon.
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.polygon.len()
    }

    /// Whether the simplified polygon is convex.
    #[must_use]
    pub fn is_convex(&self) -> bool {
        self.polygon.is_convex()
    }
}

/// Output of a successful detection run.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Accepted candidates, in contour extraction order.
    pub candidates: Vec<Candidate>,
    /// Copy of the input frame with candidates outlined.
    pub annotated: Frame,
    /// Number of contours the extractor produced.
    pub contour_count: usize,
    /// Dimensions of the input frame.
    pub dimensions: Dimensions,
}

/// Result of running the pipeline with every intermediate preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedResult {
    /// Single-channel conversion of the input.
    pub grayscale: GrayImage,
    /// Binary map (values `0` and `binary_max_value`).
    pub binary: GrayImage,
    /// Extracted contours with hierarchy.
    pub contours: ContourSet,
    /// Per-contour filter decisions.
    pub report: FilterReport,
    /// Copy of the input frame with candidates outlined.
    pub annotated: Frame,
    /// Dimensions of the input frame.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// Accepted candidates, in contour extraction order.
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.report.candidates
    }

    /// Drop the intermediates, keeping only the detection output.
    #[must_use]
    pub fn into_detection(self) -> Detection {
        Detection {
            contour_count: self.contours.len(),
            candidates: self.report.candidates,
            annotated: self.annotated,
            dimensions: self.dimensions,
        }
    }
}

/// Pipeline step that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    /// Configuration validation, before any buffer is allocated.
    Config,
    /// Decoding encoded image bytes into a frame.
    Decode,
    /// Grayscale conversion.
    Grayscale,
    /// Binarization.
    Threshold,
    /// Contour extraction.
    Contours,
    /// Candidate filtering and approximation.
    Filter,
    /// Outline rendering.
    Render,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Decode => "decode",
            Self::Grayscale => "grayscale",
            Self::Threshold => "threshold",
            Self::Contours => "contours",
            Self::Filter => "filter",
            Self::Render => "render",
        };
        f.write_str(name)
    }
}

/// Position of a pipeline run in its state machine.
///
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    /// Frame and config stored, nothing computed.
    Idle,
    /// Grayscale buffer allocated.
    GrayscaleReady,
    /// Binary map allocated.
    Binarized,
    /// Contours extracted.
    ContoursExtracted,
    /// Candidates selected.
    Filtered,
    /// Annotated frame drawn.
    Rendered,
    /// Run finished successfully.
    Done,
    /// A stage failed; every buffer has been released.
    Failed,
}

impl PipelineState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What went wrong inside a stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The frame's channel count is not 1, 3 or 4.
    #[error("unsupported pixel format: {channels} channel(s), expected 1, 3 or 4")]
    UnsupportedFormat {
        /// Channel count of the rejected frame.
        channels: u8,
    },

    /// A single-channel image was required.
    #[error("expected a single-channel image, got {channels} channels")]
    InvalidChannelCount {
        /// Channel count of the rejected image.
        channels: u8,
    },

    /// A raster buffer could not be allocated.
    #[error("failed to allocate {label} buffer: {reason}")]
    AllocationFailure {
        /// Which buffer was being allocated.
        label: String,
        /// Why the allocation was refused.
        reason: String,
    },

    /// Raw pixel data does not match the declared dimensions.
    #[error("raw buffer holds {actual} bytes, expected {expected}")]
    InvalidBuffer {
        /// `width * height * channels`.
        expected: usize,
        /// Length of the supplied data.
        actual: usize,
    },

    /// The encoded image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The encoded image could not be decoded.
    ///
    /// Stores the decoder's message, since `image::ImageError` is
    /// neither `Clone` nor serializable.
    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

impl From<image::ImageError> for ErrorKind {
    fn from(err: image::ImageError) -> Self {
        Self::ImageDecode(err.to_string())
    }
}

/// Terminal error of a pipeline run: the failing stage and the cause.
///
/// Every buffer the run had allocated is released before this error
/// reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{stage} stage failed: {kind}")]
pub struct PipelineError {
    /// The stage that failed.
    pub stage: StageName,
    /// What went wrong.
    #[source]
    pub kind: ErrorKind,
}

impl PipelineError {
    /// Create an error for the given stage.
    #[must_use]
    pub const fn new(stage: StageName, kind: ErrorKind) -> Self {
        Self { stage, kind }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance() {
        let a = Point::new(0, 0);
        let b = Point::new(3, 4);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_from_imageproc() {
        let p: Point = imageproc::point::Point::new(7, -2).into();
        assert_eq!(p, Point::new(7, -2));
    }

    // --- Polygon tests ---

    #[test]
    fn polygon_metrics_of_square() {
        let square = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ]);
        assert_eq!(square.len(), 4);
        assert!((square.area() - 100.0).abs() < 1e-9);
        assert!((square.perimeter() - 40.0).abs() < 1e-9);
        assert!(square.is_convex());
    }

    #[test]
    fn empty_polygon() {
        let pl = Polygon::default();
        assert!(pl.is_empty());
        assert_eq!(pl.len(), 0);
        assert!(pl.area().abs() < f64::EPSILON);
    }

    // --- BoundingBox tests ---

    #[test]
    fn bounding_box_area_and_aspect() {
        let bb = BoundingBox {
            x: 3,
            y: 4,
            width: 20,
            height: 10,
        };
        assert_eq!(bb.area(), 200);
        assert!((bb.aspect_ratio() - 2.0).abs() < f64::EPSILON);
        assert!(BoundingBox::default().aspect_ratio().abs() < f64::EPSILON);
    }

    // --- Color tests ---

    #[test]
    fn color_parses_decimal_and_hex() {
        assert_eq!("255,0,122".parse::<Color>().unwrap(), Color::new(255, 0, 122));
        assert_eq!(" 1, 2 ,3 ".parse::<Color>().unwrap(), Color::new(1, 2, 3));
        assert_eq!("#FF007a".parse::<Color>().unwrap(), Color::new(255, 0, 122));
    }

    #[test]
    fn color_rejects_malformed_input() {
        assert!("255,0".parse::<Color>().is_err());
        assert!("256,0,0".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
        assert!("#GG0000".parse::<Color>().is_err());
        // Signs are not hex digits.
        assert!("#+1+1+1".parse::<Color>().is_err());
        assert!("#+f+f+f".parse::<Color>().is_err());
        assert!("#\u{e9}\u{e9}\u{e9}".parse::<Color>().is_err());
    }

    #[test]
    fn color_display_round_trips() {
        let c = Color::new(9, 8, 7);
        assert_eq!(c.to_string().parse::<Color>().unwrap(), c);
    }

    #[test]
    fn color_luma_weights_green_highest() {
        assert_eq!(Color::new(255, 255, 255).luma(), 255);
        assert_eq!(Color::new(0, 0, 0).luma(), 0);
        let r = Color::new(255, 0, 0).luma();
        let g = Color::new(0, 255, 0).luma();
        let b = Color::new(0, 0, 255).luma();
        assert!(g > r && r > b, "R={r} G={g} B={b}");
    }

    // --- PipelineConfig tests ---

    #[test]
    fn pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.binary_threshold, 100);
        assert_eq!(config.binary_max_value, 200);
        assert!((config.min_area - 50.0).abs() < f64::EPSILON);
        assert!((config.min_perimeter - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.min_vertices, 4);
        assert_eq!(config.max_vertices, 5);
        assert!((config.approx_epsilon - 100.0).abs() < f64::EPSILON);
        assert_eq!(config.stroke_color, Color::new(255, 0, 122));
        assert_eq!(config.stroke_thickness, 3);
        assert_eq!(config.contour_mode, ContourMode::TwoLevel);
        assert!(!config.draw_hulls);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn effective_epsilon_is_capped_by_shorter_side() {
        let config = PipelineConfig::default();
        let bounds = |width, height| BoundingBox {
            x: 0,
            y: 0,
            width,
            height,
        };
        // Document-sized contour: the configured tolerance applies.
        assert!((config.effective_epsilon(bounds(800, 600)) - 100.0).abs() < 1e-9);
        // Small contours: half the shorter side, whichever axis it is.
        assert!((config.effective_epsilon(bounds(100, 100)) - 50.0).abs() < 1e-9);
        assert!((config.effective_epsilon(bounds(200, 50)) - 25.0).abs() < 1e-9);
        assert!((config.effective_epsilon(bounds(40, 250)) - 20.0).abs() < 1e-9);

        let uncapped = PipelineConfig {
            approx_epsilon_extent_cap: None,
            ..PipelineConfig::default()
        };
        assert!((uncapped.effective_epsilon(bounds(200, 50)) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_inverted_vertex_range() {
        let config = PipelineConfig {
            min_vertices: 6,
            max_vertices: 5,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ErrorKind::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_bad_numbers() {
        let cases = [
            PipelineConfig {
                min_area: f64::NAN,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                min_perimeter: -1.0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                approx_epsilon: f64::INFINITY,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                approx_epsilon_extent_cap: Some(0.0),
                ..PipelineConfig::default()
            },
            PipelineConfig {
                min_vertices: 0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                stroke_thickness: 0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                draw_hulls: true,
                hull_thickness: 0,
                ..PipelineConfig::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "accepted {config:?}");
        }
    }

    #[test]
    fn pipeline_config_partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"binary_threshold": 42, "max_vertices": 8}"#).unwrap();
        assert_eq!(config.binary_threshold, 42);
        assert_eq!(config.max_vertices, 8);
        assert_eq!(config.min_vertices, PipelineConfig::DEFAULT_MIN_VERTICES);
        assert_eq!(config.stroke_color, PipelineConfig::DEFAULT_STROKE_COLOR);
    }

    #[test]
    fn pipeline_config_serde_round_trip() {
        let config = PipelineConfig {
            binary_threshold: 90,
            approx_epsilon_extent_cap: None,
            contour_mode: ContourMode::External,
            draw_hulls: true,
            hull_color: Color::new(0, 255, 0),
            ..PipelineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    // --- Error tests ---

    #[test]
    fn pipeline_error_display_names_stage_and_kind() {
        let err = PipelineError::new(
            StageName::Grayscale,
            ErrorKind::UnsupportedFormat { channels: 2 },
        );
        assert_eq!(
            err.to_string(),
            "grayscale stage failed: unsupported pixel format: 2 channel(s), expected 1, 3 or 4",
        );
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(
            source.to_string(),
            "unsupported pixel format: 2 channel(s), expected 1, 3 or 4"
        );
    }

    #[test]
    fn pipeline_error_serde_round_trip() {
        let err = PipelineError::new(
            StageName::Threshold,
            ErrorKind::AllocationFailure {
                label: "binary".to_string(),
                reason: "limit reached".to_string(),
            },
        );
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"threshold\""));
        let deserialized: PipelineError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, deserialized);
    }

    #[test]
    fn terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Rendered.is_terminal());
        assert_eq!(PipelineState::ContoursExtracted.to_string(), "ContoursExtracted");
    }
}
