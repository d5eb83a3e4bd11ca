//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! threshold tuning and parameter experimentation. Timestamps come from
//! a caller-supplied [`Clock`], so the library never reads the system
//! time itself.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{PipelineConfig, PipelineError, StageName, StagedResult};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Image decoding (only when the run started from encoded bytes).
    pub decode: Option<StageDiagnostics>,
    /// Config validation and grayscale conversion.
    pub grayscale: StageDiagnostics,
    /// Binarization.
    pub threshold: StageDiagnostics,
    /// Contour extraction.
    pub contours: StageDiagnostics,
    /// Size filter, approximation and vertex-count filter.
    pub filter: StageDiagnostics,
    /// Outline rendering.
    pub render: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: Option<StageMetrics>,
}

/// Stage-specific metrics that vary by pipeline stage.
///
/// Each variant captures the counts and sizes meaningful for that
/// particular processing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the encoded input.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Channels of the decoded frame.
        channels: u8,
    },
    /// Grayscale conversion metrics.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Channels of the input frame.
        source_channels: u8,
    },
    /// Threshold metrics.
    Threshold {
        /// Intensity cutoff.
        cutoff: u8,
        /// Value written for foreground pixels.
        max_value: u8,
        /// Number of foreground pixels in the binary map.
        foreground_pixel_count: usize,
        /// Total pixel count for computing foreground density.
        total_pixel_count: usize,
    },
    /// Contour extraction metrics.
    Contours {
        /// Retrieval mode used.
        mode: String,
        /// Number of contours found.
        contour_count: usize,
        /// Contours bounding a foreground region.
        outer_count: usize,
        /// Contours bounding a background hole.
        hole_count: usize,
        /// Total number of points across all contours.
        total_point_count: usize,
    },
    /// Candidate selection metrics.
    Filter {
        /// Contours that became candidates.
        accepted: usize,
        /// Contours dropped by the area/perimeter filter.
        too_small: usize,
        /// Contours dropped for their simplified vertex count.
        wrong_vertex_count: usize,
        /// Contours dropped for having no points.
        malformed: usize,
    },
    /// Rendering metrics.
    Render {
        /// Number of polygons outlined.
        outlines: usize,
        /// Outline width in pixels.
        stroke_thickness: u32,
        /// Whether convex hulls were drawn too.
        draw_hulls: bool,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of contours found.
    pub contour_count: usize,
    /// Number of accepted candidates.
    pub candidate_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages: Vec<(&str, &StageDiagnostics)> = Vec::with_capacity(6);
        if let Some(ref decode) = self.decode {
            stages.push(("Decode", decode));
        }
        stages.extend([
            ("Grayscale", &self.grayscale),
            ("Threshold", &self.threshold),
            ("Contours", &self.contours),
            ("Filter", &self.filter),
            ("Render", &self.render),
        ]);

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = diag.metrics.as_ref().map(format_metrics).unwrap_or_default();
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Contours: {}  |  Candidates: {}",
            self.summary.contour_count, self.summary.candidate_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            channels,
        } => format!("{input_bytes} bytes -> {width}x{height}x{channels}"),
        StageMetrics::Grayscale {
            width,
            height,
            source_channels,
        } => format!("{width}x{height} from {source_channels} channel(s)"),
        StageMetrics::Threshold {
            cutoff,
            max_value,
            foreground_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *foreground_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("cutoff={cutoff} max={max_value} fg={foreground_pixel_count} ({density:.1}%)")
        }
        StageMetrics::Contours {
            mode,
            contour_count,
            outer_count,
            hole_count,
            total_point_count,
        } => format!(
            "{mode}: {contour_count} contours ({outer_count} outer, {hole_count} holes), {total_point_count} pts",
        ),
        StageMetrics::Filter {
            accepted,
            too_small,
            wrong_vertex_count,
            malformed,
        } => format!(
            "accepted={accepted} too_small={too_small} vertices={wrong_vertex_count} malformed={malformed}",
        ),
        StageMetrics::Render {
            outlines,
            stroke_thickness,
            draw_hulls,
        } => format!("{outlines} outlines, thickness={stroke_thickness} hulls={draw_hulls}"),
    }
}

/// Time one transition: run `step`, then record the duration and the
/// metrics of the state it produced.
fn timed<C, S, F>(clock: &C, step: F) -> Result<(S, StageDiagnostics), PipelineError>
where
    C: Clock,
    S: PipelineStage,
    F: FnOnce() -> Result<S, PipelineError>,
{
    let start = clock.now();
    let stage = step()?;
    let duration = clock.elapsed(&start);
    let metrics = stage.metrics();
    Ok((stage, StageDiagnostics { duration, metrics }))
}

/// Run the full pipeline on `frame`, collecting per-stage diagnostics.
///
/// Produces the same [`StagedResult`] as [`crate::detect_staged`].
///
/// # Errors
///
/// Returns [`PipelineError`] if any stage fails. Every buffer of the
/// run is released before the error is returned.
pub fn detect_with_diagnostics<C: Clock>(
    frame: Frame,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let (result, diagnostics) = run_timed(frame, config, clock, None)?;
    let total_duration = clock.elapsed(&start);
    Ok((
        result,
        PipelineDiagnostics {
            total_duration,
            ..diagnostics
        },
    ))
}

/// Decode `bytes` and run the full pipeline, collecting per-stage
/// diagnostics including the decode step.
///
/// # Errors
///
/// Returns a [`StageName::Decode`] error if the bytes are empty or not a
/// supported image, otherwise as [`detect_with_diagnostics`].
pub fn detect_bytes_with_diagnostics<C: Clock>(
    bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let frame = Frame::decode(bytes).map_err(crate::pipeline::failed(StageName::Decode))?;
    let decode = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: Some(StageMetrics::Decode {
            input_bytes: bytes.len(),
            width: frame.width(),
            height: frame.height(),
            channels: frame.channels(),
        }),
    };
    let (result, diagnostics) = run_timed(frame, config, clock, Some(decode))?;
    let total_duration = clock.elapsed(&start);
    Ok((
        result,
        PipelineDiagnostics {
            total_duration,
            ..diagnostics
        },
    ))
}

/// Drive the typed stages, timing each transition. The returned
/// diagnostics carry a zero total duration for the caller to fill in.
fn run_timed<C: Clock>(
    frame: Frame,
    config: &PipelineConfig,
    clock: &C,
    decode: Option<StageDiagnostics>,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let idle = Pipeline::new(frame, config.clone());
    let (gray, grayscale) = timed(clock, || idle.to_grayscale())?;
    let (binary, threshold) = timed(clock, || gray.binarize())?;
    let (extracted, contours) = timed(clock, || Ok(binary.extract_contours()))?;
    let (filtered, filter) = timed(clock, || Ok(extracted.filter()))?;
    let (rendered, render) = timed(clock, || filtered.render())?;
    let result = rendered.finish().into_result();

    let dims = result.dimensions;
    let summary = PipelineSummary {
        image_width: dims.width,
        image_height: dims.height,
        pixel_count: u64::from(dims.width) * u64::from(dims.height),
        contour_count: result.contours.len(),
        candidate_count: result.candidates().len(),
    };

    Ok((
        result,
        PipelineDiagnostics {
            decode,
            grayscale,
            threshold,
            contours,
            filter,
            render,
            total_duration: Duration::ZERO,
            summary,
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;
    use std::io::Cursor;

    use image::{DynamicImage, GrayImage, ImageFormat, Luma};

    use super::*;
    use crate::types::ErrorKind;

    /// Deterministic clock: every reading advances by one millisecond.
    struct StepClock {
        ticks: Cell<u64>,
    }

    impl StepClock {
        const fn new() -> Self {
            Self {
                ticks: Cell::new(0),
            }
        }
    }

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn square_image() -> GrayImage {
        GrayImage::from_fn(40, 40, |x, y| {
            let inside = (10..30).contains(&x) && (10..30).contains(&y);
            Luma([if inside { 255 } else { 0 }])
        })
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn diagnostics_match_plain_run() {
        let frame = Frame::from(square_image());
        let config = PipelineConfig::default();
        let (result, diagnostics) =
            detect_with_diagnostics(frame.clone(), &config, &StepClock::new()).unwrap();
        let plain = crate::detect_staged(frame, &config).unwrap();

        assert_eq!(result, plain);
        assert!(diagnostics.decode.is_none());
        assert_eq!(diagnostics.summary.contour_count, 1);
        assert_eq!(diagnostics.summary.candidate_count, 1);
        assert_eq!(diagnostics.summary.pixel_count, 1600);
        assert_eq!(
            diagnostics.filter.metrics,
            Some(StageMetrics::Filter {
                accepted: 1,
                too_small: 0,
                wrong_vertex_count: 0,
                malformed: 0,
            })
        );
    }

    #[test]
    fn stage_durations_fit_in_total() {
        let (_, diagnostics) = detect_with_diagnostics(
            Frame::from(square_image()),
            &PipelineConfig::default(),
            &StepClock::new(),
        )
        .unwrap();
        let stages = [
            &diagnostics.grayscale,
            &diagnostics.threshold,
            &diagnostics.contours,
            &diagnostics.filter,
            &diagnostics.render,
        ];
        let sum: Duration = stages.iter().map(|s| s.duration).sum();
        assert!(stages.iter().all(|s| s.duration > Duration::ZERO));
        assert!(sum <= diagnostics.total_duration);
    }

    #[test]
    fn bytes_run_records_decode() {
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(square_image())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let (_, diagnostics) =
            detect_bytes_with_diagnostics(&png, &PipelineConfig::default(), &StepClock::new())
                .unwrap();
        let decode = diagnostics.decode.unwrap();
        assert_eq!(
            decode.metrics,
            Some(StageMetrics::Decode {
                input_bytes: png.len(),
                width: 40,
                height: 40,
                channels: 1,
            })
        );
    }

    #[test]
    fn empty_bytes_fail_at_decode() {
        let err = detect_bytes_with_diagnostics(&[], &PipelineConfig::default(), &StepClock::new())
            .unwrap_err();
        assert_eq!(err, PipelineError::new(StageName::Decode, ErrorKind::EmptyInput));
    }

    #[test]
    fn report_lists_every_stage() {
        let (_, diagnostics) = detect_with_diagnostics(
            Frame::from(square_image()),
            &PipelineConfig::default(),
            &StepClock::new(),
        )
        .unwrap();
        let report = diagnostics.report();
        for name in ["Grayscale", "Threshold", "Contours", "Filter", "Render"] {
            assert!(report.contains(name), "missing {name} in:\n{report}");
        }
        assert!(!report.contains("Decode"));
        assert!(report.contains("Image: 40x40 (1600 pixels)"));
        assert!(report.contains("Candidates: 1"));
    }

    #[test]
    fn diagnostics_serde_round_trip() {
        let (_, diagnostics) = detect_with_diagnostics(
            Frame::from(square_image()),
            &PipelineConfig::default(),
            &StepClock::new(),
        )
        .unwrap();
        let json = serde_json::to_string(&diagnostics).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary, diagnostics.summary);
        assert_eq!(back.contours.metrics, diagnostics.contours.metrics);
        assert!((duration_ms(back.total_duration) - duration_ms(diagnostics.total_duration)).abs() < 1e-6);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = r#"{"duration": -1.0, "metrics": null}"#;
        assert!(serde_json::from_str::<StageDiagnostics>(json).is_err());
    }
}
