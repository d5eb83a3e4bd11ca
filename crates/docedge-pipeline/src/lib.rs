//! docedge-pipeline: document and rectangle detection on still frames.
//!
//! Finds quadrilateral-like regions (pages, cards, screens) through:
//! grayscale -> threshold -> contour extraction -> size filter ->
//! polygon approximation -> vertex-count filter -> convex hull -> render.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! frames or encoded byte slices and returns structured data. Reading
//! files and writing annotated images lives in `docedge-cli`.

pub mod buffer;
pub mod contour;
pub mod diagnostics;
pub mod filter;
pub mod frame;
pub mod geometry;
pub mod pipeline;
pub mod render;
pub mod simplify;
pub mod threshold;
pub mod types;

use tracing::instrument;

pub use buffer::{Buffer, BufferLedger};
pub use contour::{BorderKind, Contour, ContourExtractor, ContourMode, ContourSet};
pub use filter::{Decision, FilterReport, SkipReason};
pub use frame::Frame;
pub use pipeline::Pipeline;
pub use types::{
    BoundingBox, Candidate, Color, Detection, Dimensions, ErrorKind, GrayImage, PipelineConfig,
    PipelineError, PipelineState, Point, Polygon, StageName, StagedResult,
};

/// Run the full detection pipeline on a frame.
///
/// # Pipeline steps
///
/// 1. Validate the configuration
/// 2. Convert to grayscale (BT.601 luma)
/// 3. Threshold into a binary map
/// 4. Extract contours (retrieval mode from the config)
/// 5. Drop contours at or below the area/perimeter minimums
/// 6. Approximate each remaining contour by a polygon
/// 7. Keep polygons whose vertex count is in range, with their convex hull
/// 8. Outline the accepted polygons on a copy of the frame
///
/// Every intermediate buffer is released before this returns, whether
/// the run succeeds or fails.
///
/// # Errors
///
/// Returns [`PipelineError`] naming the failing stage:
/// [`StageName::Config`] for an invalid config,
/// [`StageName::Grayscale`] for a frame that is not 1, 3 or 4 channels,
/// or the stage whose buffer could not be allocated.
#[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
pub fn detect(frame: Frame, config: &PipelineConfig) -> Result<Detection, PipelineError> {
    Ok(Pipeline::new(frame, config.clone())
        .to_grayscale()?
        .binarize()?
        .extract_contours()
        .filter()
        .render()?
        .finish()
        .into_detection())
}

/// Run the full pipeline, keeping every intermediate result.
///
/// # Errors
///
/// As [`detect`].
pub fn detect_staged(frame: Frame, config: &PipelineConfig) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(frame, config.clone())
        .to_grayscale()?
        .binarize()?
        .extract_contours()
        .filter()
        .render()?
        .finish()
        .into_result())
}

/// Decode encoded image bytes (PNG, JPEG, BMP, WebP) and run [`detect`].
///
/// # Errors
///
/// Returns a [`StageName::Decode`] error with [`ErrorKind::EmptyInput`]
/// for empty input or [`ErrorKind::ImageDecode`] for undecodable input,
/// otherwise as [`detect`].
pub fn detect_bytes(bytes: &[u8], config: &PipelineConfig) -> Result<Detection, PipelineError> {
    let frame = Frame::decode(bytes).map_err(pipeline::failed(StageName::Decode))?;
    detect(frame, config)
}
