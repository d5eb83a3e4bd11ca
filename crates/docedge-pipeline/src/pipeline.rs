//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::detect`] which runs the entire pipeline in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use docedge_pipeline::{Frame, Pipeline, PipelineConfig, PipelineError};
//! # fn run(frame: Frame) -> Result<(), PipelineError> {
//! let done = Pipeline::new(frame, PipelineConfig::default())
//!     .to_grayscale()?
//!     .binarize()?
//!     .extract_contours()
//!     .filter()
//!     .render()?
//!     .finish();
//!
//! let detection = done.into_detection();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for stages that allocate), carrying all previously
//! computed intermediates.
//!
//! # Buffers
//!
//! The grayscale image, the binary map and the render canvas are
//! allocated through the run's [`BufferLedger`]. They are released when
//! the state holding them is dropped, whether the run finished, failed
//! part-way, or was abandoned. [`Done::into_result`] hands them to the
//! caller instead, which also counts as their release.

use tracing::{info, instrument, warn};

use crate::buffer::{Buffer, BufferLedger};
use crate::contour::{ContourExtractor, ContourSet};
use crate::diagnostics::StageMetrics;
use crate::filter::FilterReport;
use crate::frame::Frame;
use crate::types::{
    Candidate, Detection, Dimensions, ErrorKind, GrayImage, PipelineConfig, PipelineError,
    PipelineState, StageName, StagedResult,
};

/// Closure adapter for `map_err` that logs the failure before wrapping
/// it with the stage that produced it.
pub(crate) fn failed(stage: StageName) -> impl Fn(ErrorKind) -> PipelineError {
    move |kind| {
        warn!(%stage, error = %kind, state = %PipelineState::Failed, "pipeline stage failed");
        PipelineError::new(stage, kind)
    }
}

/// State shared by every stage: the input, its config, and the ledger
/// that tracks this run's buffers.
#[derive(Debug)]
struct Run {
    config: PipelineConfig,
    frame: Frame,
    ledger: BufferLedger,
}

// ───────────────────────── Stage 0: Idle ─────────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The frame and config are stored but not yet touched. Call
/// [`to_grayscale`](Self::to_grayscale) to advance to the next stage.
#[derive(Debug)]
#[must_use = "pipeline stages are consumed by advancing; call .to_grayscale() to continue"]
pub struct Idle {
    run: Run,
}

impl Idle {
    /// The input frame.
    #[must_use]
    pub const fn frame(&self) -> &Frame {
        &self.run.frame
    }

    /// The configuration this run uses.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.run.config
    }

    /// The ledger tracking this run's buffers.
    #[must_use]
    pub const fn ledger(&self) -> &BufferLedger {
        &self.run.ledger
    }

    /// Validate the config, then convert the frame to grayscale and
    /// advance to [`GrayscaleReady`].
    ///
    /// # Errors
    ///
    /// Returns a [`StageName::Config`] error for an invalid config, and a
    /// [`StageName::Grayscale`] error if the frame's channel count is not
    /// 1, 3 or 4 or the grayscale buffer cannot be allocated.
    #[instrument(skip_all, fields(width = self.run.frame.width(), height = self.run.frame.height()))]
    pub fn to_grayscale(self) -> Result<GrayscaleReady, PipelineError> {
        self.run.config.validate().map_err(failed(StageName::Config))?;
        let grayscale = self
            .run
            .ledger
            .try_allocate("grayscale", || crate::frame::to_grayscale(&self.run.frame))
            .map_err(failed(StageName::Grayscale))?;
        Ok(GrayscaleReady {
            run: self.run,
            grayscale,
        })
    }
}

// ───────────────────────── Stage 1: GrayscaleReady ───────────────────

/// Pipeline state after grayscale conversion.
///
/// Call [`binarize`](Self::binarize) to advance to the next stage.
#[derive(Debug)]
#[must_use = "pipeline stages are consumed by advancing; call .binarize() to continue"]
pub struct GrayscaleReady {
    run: Run,
    grayscale: Buffer<GrayImage>,
}

impl GrayscaleReady {
    /// The single-channel image.
    #[must_use]
    pub fn grayscale(&self) -> &GrayImage {
        &self.grayscale
    }

    /// Threshold the grayscale image and advance to [`Binarized`].
    ///
    /// # Errors
    ///
    /// Returns a [`StageName::Threshold`] error if the binary map cannot
    /// be allocated. The grayscale buffer is released before returning.
    #[instrument(skip_all, fields(cutoff = self.run.config.binary_threshold))]
    pub fn binarize(self) -> Result<Binarized, PipelineError> {
        let (cutoff, max_value) = (self.run.config.binary_threshold, self.run.config.binary_max_value);
        let binary = self
            .run
            .ledger
            .allocate("binary", || crate::threshold::threshold(&self.grayscale, cutoff, max_value))
            .map_err(failed(StageName::Threshold))?;
        Ok(Binarized {
            run: self.run,
            grayscale: self.grayscale,
            binary,
        })
    }
}

// ───────────────────────── Stage 2: Binarized ────────────────────────

/// Pipeline state after thresholding.
///
/// Call [`extract_contours`](Self::extract_contours) to advance to the
/// next stage.
#[derive(Debug)]
#[must_use = "pipeline stages are consumed by advancing; call .extract_contours() to continue"]
pub struct Binarized {
    run: Run,
    grayscale: Buffer<GrayImage>,
    binary: Buffer<GrayImage>,
}

impl Binarized {
    /// The binary map (values `0` and `binary_max_value`).
    #[must_use]
    pub fn binary(&self) -> &GrayImage {
        &self.binary
    }

    /// Extract contours from the binary map and advance to
    /// [`ContoursExtracted`].
    #[instrument(skip_all, fields(mode = %self.run.config.contour_mode))]
    pub fn extract_contours(self) -> ContoursExtracted {
        let contours = self.run.config.contour_mode.extract(&self.binary);
        info!(contours = contours.len(), "contours extracted");
        ContoursExtracted {
            run: self.run,
            grayscale: self.grayscale,
            binary: self.binary,
            contours,
        }
    }
}

// ───────────────────────── Stage 3: ContoursExtracted ────────────────

/// Pipeline state after contour extraction.
///
/// Call [`filter`](Self::filter) to advance to the next stage.
#[derive(Debug)]
#[must_use = "pipeline stages are consumed by advancing; call .filter() to continue"]
pub struct ContoursExtracted {
    run: Run,
    grayscale: Buffer<GrayImage>,
    binary: Buffer<GrayImage>,
    contours: ContourSet,
}

impl ContoursExtracted {
    /// The extracted contours.
    #[must_use]
    pub const fn contours(&self) -> &ContourSet {
        &self.contours
    }

    /// Select candidates and advance to [`Filtered`].
    pub fn filter(self) -> Filtered {
        let report = crate::filter::filter_with_report(&self.contours, &self.run.config);
        info!(candidates = report.accepted(), "candidates selected");
        Filtered {
            run: self.run,
            grayscale: self.grayscale,
            binary: self.binary,
            contours: self.contours,
            report,
        }
    }
}

// ───────────────────────── Stage 4: Filtered ─────────────────────────

/// Pipeline state after candidate selection.
///
/// Call [`render`](Self::render) to advance to the next stage.
#[derive(Debug)]
#[must_use = "pipeline stages are consumed by advancing; call .render() to continue"]
pub struct Filtered {
    run: Run,
    grayscale: Buffer<GrayImage>,
    binary: Buffer<GrayImage>,
    contours: ContourSet,
    report: FilterReport,
}

impl Filtered {
    /// Per-contour decisions.
    #[must_use]
    pub const fn report(&self) -> &FilterReport {
        &self.report
    }

    /// Accepted candidates, in extraction order.
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.report.candidates
    }

    /// Draw the candidates onto a copy of the frame and advance to
    /// [`Rendered`].
    ///
    /// # Errors
    ///
    /// Returns a [`StageName::Render`] error if the canvas cannot be
    /// allocated. Every buffer of the run is released before returning.
    pub fn render(self) -> Result<Rendered, PipelineError> {
        let annotated = self
            .run
            .ledger
            .allocate("canvas", || {
                crate::render::render(&self.run.frame, &self.report.candidates, &self.run.config)
            })
            .map_err(failed(StageName::Render))?;
        Ok(Rendered {
            run: self.run,
            grayscale: self.grayscale,
            binary: self.binary,
            contours: self.contours,
            report: self.report,
            annotated,
        })
    }
}

// ───────────────────────── Stage 5: Rendered ─────────────────────────

/// Pipeline state after rendering.
///
/// Call [`finish`](Self::finish) to complete the run.
#[derive(Debug)]
#[must_use = "pipeline stages are consumed by advancing; call .finish() to continue"]
pub struct Rendered {
    run: Run,
    grayscale: Buffer<GrayImage>,
    binary: Buffer<GrayImage>,
    contours: ContourSet,
    report: FilterReport,
    annotated: Buffer<Frame>,
}

impl Rendered {
    /// The annotated frame.
    #[must_use]
    pub fn annotated(&self) -> &Frame {
        &self.annotated
    }

    /// Complete the run.
    pub fn finish(self) -> Done {
        info!(
            contours = self.contours.len(),
            candidates = self.report.accepted(),
            state = %PipelineState::Done,
            "pipeline complete"
        );
        Done {
            run: self.run,
            grayscale: self.grayscale,
            binary: self.binary,
            contours: self.contours,
            report: self.report,
            annotated: self.annotated,
        }
    }
}

// ───────────────────────── Stage 6: Done ─────────────────────────────

/// Final pipeline state.
///
/// Call [`into_detection`](Self::into_detection) for the candidates and
/// annotated frame, or [`into_result`](Self::into_result) to keep every
/// intermediate.
#[derive(Debug)]
#[must_use = "call .into_detection() or .into_result() to extract the output"]
pub struct Done {
    run: Run,
    grayscale: Buffer<GrayImage>,
    binary: Buffer<GrayImage>,
    contours: ContourSet,
    report: FilterReport,
    annotated: Buffer<Frame>,
}

impl Done {
    /// Accepted candidates, in extraction order.
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.report.candidates
    }

    /// The annotated frame.
    #[must_use]
    pub fn annotated(&self) -> &Frame {
        &self.annotated
    }

    /// Dimensions of the input frame.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.run.frame.dimensions()
    }

    /// The ledger tracking this run's buffers.
    #[must_use]
    pub const fn ledger(&self) -> &BufferLedger {
        &self.run.ledger
    }

    /// Keep the candidates and annotated frame, releasing every other
    /// buffer.
    #[must_use]
    pub fn into_detection(self) -> Detection {
        Detection {
            dimensions: self.run.frame.dimensions(),
            contour_count: self.contours.len(),
            candidates: self.report.candidates,
            annotated: self.annotated.into_inner(),
        }
    }

    /// Hand every intermediate to the caller.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            dimensions: self.run.frame.dimensions(),
            grayscale: self.grayscale.into_inner(),
            binary: self.binary.into_inner(),
            contours: self.contours,
            report: self.report,
            annotated: self.annotated.into_inner(),
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 7;

/// The output produced by a single pipeline stage.
///
/// Each variant borrows the data that the corresponding stage computed.
/// Use this with [`PipelineStage::output`] or [`Stage::output`] to
/// inspect intermediates in a uniform, type-erased way.
#[must_use]
pub enum StageOutput<'a> {
    /// Input frame (nothing computed yet).
    Source {
        /// The input frame.
        frame: &'a Frame,
    },
    /// Grayscale conversion result.
    Grayscale {
        /// The single-channel image.
        grayscale: &'a GrayImage,
    },
    /// Threshold result.
    Binary {
        /// The binary map.
        binary: &'a GrayImage,
    },
    /// Contour extraction result.
    Contours {
        /// The extracted contours.
        contours: &'a ContourSet,
    },
    /// Filter result.
    Filtered {
        /// Per-contour decisions and accepted candidates.
        report: &'a FilterReport,
    },
    /// Render result.
    Rendered {
        /// The annotated frame.
        annotated: &'a Frame,
    },
    /// Final output.
    Done {
        /// Accepted candidates.
        candidates: &'a [Candidate],
        /// The annotated frame.
        annotated: &'a Frame,
        /// Input dimensions.
        dimensions: Dimensions,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Both the typed API (individual stage structs) and the dynamic API
/// ([`Stage`] enum) are available. This trait bridges the two: each
/// stage struct implements it, and [`Stage`] delegates to whichever
/// variant it holds.
///
/// # Loop pattern
///
/// ```rust
/// # use docedge_pipeline::{Frame, Pipeline, PipelineConfig, PipelineError};
/// # use docedge_pipeline::pipeline::{Advance, Stage};
/// # fn run(frame: Frame) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(frame, PipelineConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"idle"`, `"threshold"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Idle through `6` for Done).
    const INDEX: usize;

    /// Position of this stage in the run's state machine.
    const STATE: PipelineState;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics for diagnostics.
    ///
    /// Returns `None` for [`Idle`], which has not yet performed any
    /// processing, and for [`Done`], which only marks completion.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(stage))` on success, `Ok(None)` if already at
    /// the final stage, or `Err` if the stage transition fails.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when validation, grayscale conversion
    /// or a buffer allocation fails.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages to completion and return the final
    /// [`StagedResult`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

impl PipelineStage for Idle {
    const NAME: &str = "idle";
    const INDEX: usize = 0;
    const STATE: PipelineState = PipelineState::Idle;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            frame: &self.run.frame,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::GrayscaleReady(self.to_grayscale()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.to_grayscale()?.complete()
    }
}

impl PipelineStage for GrayscaleReady {
    const NAME: &str = "grayscale";
    const INDEX: usize = 1;
    const STATE: PipelineState = PipelineState::GrayscaleReady;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Grayscale {
            grayscale: &self.grayscale,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Grayscale {
            width: self.grayscale.width(),
            height: self.grayscale.height(),
            source_channels: self.run.frame.channels(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Binarized(self.binarize()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.binarize()?.complete()
    }
}

impl PipelineStage for Binarized {
    const NAME: &str = "threshold";
    const INDEX: usize = 2;
    const STATE: PipelineState = PipelineState::Binarized;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Binary {
            binary: &self.binary,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Threshold {
            cutoff: self.run.config.binary_threshold,
            max_value: self.run.config.binary_max_value,
            foreground_pixel_count: crate::threshold::foreground_count(&self.binary),
            total_pixel_count: self.binary.as_raw().len(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::ContoursExtracted(self.extract_contours())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.extract_contours().complete()
    }
}

impl PipelineStage for ContoursExtracted {
    const NAME: &str = "contours";
    const INDEX: usize = 3;
    const STATE: PipelineState = PipelineState::ContoursExtracted;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Contours {
            contours: &self.contours,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Contours {
            mode: self.run.config.contour_mode.to_string(),
            contour_count: self.contours.len(),
            outer_count: self.contours.outer_count(),
            hole_count: self.contours.hole_count(),
            total_point_count: self.contours.iter().map(|c| c.len()).sum(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Filtered(self.filter())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.filter().complete()
    }
}

impl PipelineStage for Filtered {
    const NAME: &str = "filter";
    const INDEX: usize = 4;
    const STATE: PipelineState = PipelineState::Filtered;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Filtered {
            report: &self.report,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Filter {
            accepted: self.report.accepted(),
            too_small: self.report.too_small(),
            wrong_vertex_count: self.report.wrong_vertex_count(),
            malformed: self.report.malformed(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Rendered(self.render()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.render()?.complete()
    }
}

impl PipelineStage for Rendered {
    const NAME: &str = "render";
    const INDEX: usize = 5;
    const STATE: PipelineState = PipelineState::Rendered;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Rendered {
            annotated: &self.annotated,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Render {
            outlines: self.report.candidates.len(),
            stroke_thickness: self.run.config.stroke_thickness,
            draw_hulls: self.run.config.draw_hulls,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Done(self.finish())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.finish().into_result())
    }
}

impl PipelineStage for Done {
    const NAME: &str = "done";
    const INDEX: usize = 6;
    const STATE: PipelineState = PipelineState::Done;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Done {
            candidates: &self.report.candidates,
            annotated: &self.annotated,
            dimensions: self.run.frame.dimensions(),
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// Use [`From`] conversions to enter the dynamic API from any typed
/// stage, then call [`advance`](Self::advance) in a loop.
#[must_use]
#[derive(Debug)]
pub enum Stage {
    /// See [`Idle`].
    Idle(Idle),
    /// See [`GrayscaleReady`].
    GrayscaleReady(GrayscaleReady),
    /// See [`Binarized`].
    Binarized(Binarized),
    /// See [`ContoursExtracted`].
    ContoursExtracted(ContoursExtracted),
    /// See [`Filtered`].
    Filtered(Filtered),
    /// See [`Rendered`].
    Rendered(Rendered),
    /// See [`Done`].
    Done(Done),
}

/// Compile-time guard: adding a [`Stage`] variant makes this match
/// non-exhaustive until [`STAGE_COUNT`] is revisited.
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Idle(_)
        | Stage::GrayscaleReady(_)
        | Stage::Binarized(_)
        | Stage::ContoursExtracted(_)
        | Stage::Filtered(_)
        | Stage::Rendered(_)
        | Stage::Done(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
#[derive(Debug)]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage and is returned unchanged.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Idle(s) => s.$method($($arg),*),
            Self::GrayscaleReady(s) => s.$method($($arg),*),
            Self::Binarized(s) => s.$method($($arg),*),
            Self::ContoursExtracted(s) => s.$method($($arg),*),
            Self::Filtered(s) => s.$method($($arg),*),
            Self::Rendered(s) => s.$method($($arg),*),
            Self::Done(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// State-machine position of the current stage.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        delegate!(self, state)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(next_stage))` on success, `Ok(None)` if
    /// already complete (the `Done` value is consumed), or `Err` if
    /// the transition fails.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// This is the loop-friendly version of [`next`](Self::next).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        // Only `Done` yields `None` from next(), and it returned above.
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-complete stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        delegate!(self, complete)
    }
}

// Lets the macro read the trait's associated constants through `&self`.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
    fn state(&self) -> PipelineState;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }

    fn state(&self) -> PipelineState {
        T::STATE
    }
}

impl From<Idle> for Stage {
    fn from(s: Idle) -> Self {
        Self::Idle(s)
    }
}

impl From<GrayscaleReady> for Stage {
    fn from(s: GrayscaleReady) -> Self {
        Self::GrayscaleReady(s)
    }
}

impl From<Binarized> for Stage {
    fn from(s: Binarized) -> Self {
        Self::Binarized(s)
    }
}

impl From<ContoursExtracted> for Stage {
    fn from(s: ContoursExtracted) -> Self {
        Self::ContoursExtracted(s)
    }
}

impl From<Filtered> for Stage {
    fn from(s: Filtered) -> Self {
        Self::Filtered(s)
    }
}

impl From<Rendered> for Stage {
    fn from(s: Rendered) -> Self {
        Self::Rendered(s)
    }
}

impl From<Done> for Stage {
    fn from(s: Done) -> Self {
        Self::Done(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental detection pipeline.
///
/// Created via [`Pipeline::new`], which stores the frame and config
/// without doing any processing. Each stage method consumes the current
/// state and returns the next, making it a compile-time error to skip
/// stages or call them out of order. A pipeline runs once; process
/// another frame with a new pipeline.
#[derive(Debug)]
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline with its own buffer ledger.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(frame: Frame, config: PipelineConfig) -> Idle {
        Self::with_ledger(frame, config, BufferLedger::new())
    }

    /// Create a new pipeline that records its buffers in `ledger`.
    pub const fn with_ledger(frame: Frame, config: PipelineConfig, ledger: BufferLedger) -> Idle {
        Idle {
            run: Run {
                config,
                frame,
                ledger,
            },
        }
    }
}
