//! End-to-end detection scenarios on synthetic frames.

#![allow(clippy::unwrap_used)]

use docedge_pipeline::pipeline::Pipeline;
use docedge_pipeline::{
    BufferLedger, ContourMode, Decision, Frame, GrayImage, PipelineConfig, Point, SkipReason,
    StageName, detect, detect_staged,
};
use image::{DynamicImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::draw_polygon_mut;

/// Black canvas with white axis-aligned rectangles `(x, y, w, h)`.
fn rects(width: u32, height: u32, boxes: &[(u32, u32, u32, u32)]) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let inside = boxes
            .iter()
            .any(|&(bx, by, bw, bh)| (bx..bx + bw).contains(&x) && (by..by + bh).contains(&y));
        Luma([if inside { 255 } else { 0 }])
    })
}

fn sorted_corners(points: &[Point]) -> Vec<Point> {
    let mut corners = points.to_vec();
    corners.sort_unstable();
    corners
}

#[test]
fn black_frame_yields_nothing() {
    let frame = Frame::from(GrayImage::new(120, 90));
    let detection = detect(frame.clone(), &PipelineConfig::default()).unwrap();
    assert!(detection.candidates.is_empty());
    assert_eq!(detection.contour_count, 0);
    assert_eq!(detection.annotated, frame);
}

#[test]
fn single_rectangle_yields_its_corners() {
    let (x0, y0) = (37_i32, 52_i32);
    let frame = Frame::from(rects(200, 220, &[(37, 52, 100, 100)]));
    let detection = detect(frame, &PipelineConfig::default()).unwrap();

    assert_eq!(detection.candidates.len(), 1);
    let candidate = &detection.candidates[0];
    assert_eq!(
        sorted_corners(candidate.polygon.points()),
        vec![
            Point::new(x0, y0),
            Point::new(x0, y0 + 99),
            Point::new(x0 + 99, y0),
            Point::new(x0 + 99, y0 + 99),
        ]
    );
    assert!(candidate.is_convex());
    assert_eq!(candidate.bounding_box.width, 100);
    assert_eq!(candidate.bounding_box.height, 100);

    // The outline is drawn on the rectangle's border.
    let annotated = detection.annotated.as_dynamic().to_luma8();
    let stroke = PipelineConfig::DEFAULT_STROKE_COLOR.luma();
    assert_eq!(annotated.get_pixel(37 + 50, 52).0[0], stroke);
    assert_eq!(annotated.get_pixel(37 + 50, 52 + 50).0[0], 255);
}

#[test]
fn elongated_rectangles_keep_their_corners() {
    for (w, h) in [(200_u32, 50_u32), (250, 40), (40, 250)] {
        let (x0, y0) = (20_i32, 30_i32);
        let frame = Frame::from(rects(320, 320, &[(20, 30, w, h)]));
        let detection = detect(frame, &PipelineConfig::default()).unwrap();

        assert_eq!(detection.candidates.len(), 1, "{w}x{h}");
        let (x1, y1) = (x0 + i32::try_from(w).unwrap() - 1, y0 + i32::try_from(h).unwrap() - 1);
        assert_eq!(
            sorted_corners(detection.candidates[0].polygon.points()),
            vec![
                Point::new(x0, y0),
                Point::new(x0, y1),
                Point::new(x1, y0),
                Point::new(x1, y1),
            ],
            "{w}x{h}"
        );
    }
}

#[test]
fn small_blob_is_filtered_out() {
    let frame = Frame::from(rects(60, 60, &[(20, 20, 5, 5)]));
    let result = detect_staged(frame, &PipelineConfig::default()).unwrap();
    assert_eq!(result.contours.len(), 1);
    assert!(result.candidates().is_empty());
    assert!(matches!(
        result.report.decisions[0],
        Decision::Skipped(SkipReason::TooSmall { .. })
    ));
}

#[test]
#[allow(clippy::cast_possible_truncation)]
fn heptagon_is_rejected_for_vertex_count() {
    let mut image = GrayImage::new(300, 300);
    let vertices: Vec<imageproc::point::Point<i32>> = (0..7)
        .map(|i| {
            let angle = f64::from(i) * std::f64::consts::TAU / 7.0;
            imageproc::point::Point::new(
                (150.0 + 100.0 * angle.cos()).round() as i32,
                (150.0 + 100.0 * angle.sin()).round() as i32,
            )
        })
        .collect();
    draw_polygon_mut(&mut image, &vertices, Luma([255]));

    let config = PipelineConfig {
        approx_epsilon: 2.0,
        ..PipelineConfig::default()
    };
    let result = detect_staged(Frame::from(image), &config).unwrap();
    assert!(result.candidates().is_empty());
    assert!(matches!(
        result.report.decisions[0],
        Decision::Skipped(SkipReason::VertexCount { vertices }) if vertices > 5
    ));
}

#[test]
fn color_frames_are_supported() {
    let rgb = RgbImage::from_fn(160, 120, |x, y| {
        if (30..130).contains(&x) && (10..110).contains(&y) {
            Rgb([250, 250, 240])
        } else {
            Rgb([20, 30, 40])
        }
    });
    let detection = detect(
        Frame::from(DynamicImage::ImageRgb8(rgb)),
        &PipelineConfig::default(),
    )
    .unwrap();
    assert_eq!(detection.candidates.len(), 1);
    assert_eq!(
        *detection.annotated.as_dynamic().to_rgb8().get_pixel(80, 10),
        Rgb([255, 0, 122])
    );

    let rgba = RgbaImage::from_fn(160, 120, |x, y| {
        if (30..130).contains(&x) && (10..110).contains(&y) {
            Rgba([250, 250, 240, 128])
        } else {
            Rgba([20, 30, 40, 128])
        }
    });
    let detection = detect(
        Frame::from(DynamicImage::ImageRgba8(rgba)),
        &PipelineConfig::default(),
    )
    .unwrap();
    assert_eq!(detection.candidates.len(), 1);
    assert_eq!(detection.annotated.channels(), 4);
}

#[test]
fn raw_two_channel_frame_fails_at_grayscale() {
    let frame = Frame::from_raw(10, 10, 2, vec![0; 200]).unwrap();
    let err = detect(frame, &PipelineConfig::default()).unwrap_err();
    assert_eq!(err.stage, StageName::Grayscale);
}

#[test]
fn several_documents_in_extraction_order() {
    let frame = Frame::from(rects(
        400,
        200,
        &[(10, 10, 100, 120), (150, 30, 90, 90), (280, 20, 80, 150)],
    ));
    let result = detect_staged(frame, &PipelineConfig::default()).unwrap();
    assert_eq!(result.candidates().len(), 3);
    let indices: Vec<usize> = result.candidates().iter().map(|c| c.contour_index).collect();
    let mut sorted = indices.clone();
    sorted.sort_unstable();
    assert_eq!(indices, sorted);
}

#[test]
fn frame_border_hole_follows_contour_mode() {
    // A thick white frame: outer border plus one hole.
    let ring = GrayImage::from_fn(200, 200, |x, y| {
        let outer = (40..140).contains(&x) && (40..140).contains(&y);
        let hole = (50..130).contains(&x) && (50..130).contains(&y);
        Luma([if outer && !hole { 255 } else { 0 }])
    });

    let two_level = detect_staged(Frame::from(ring.clone()), &PipelineConfig::default()).unwrap();
    assert_eq!(two_level.contours.outer_count(), 1);
    assert_eq!(two_level.contours.hole_count(), 1);
    assert_eq!(two_level.candidates().len(), 2);

    let external = PipelineConfig {
        contour_mode: ContourMode::External,
        ..PipelineConfig::default()
    };
    let outer_only = detect_staged(Frame::from(ring), &external).unwrap();
    assert_eq!(outer_only.contours.len(), 1);
    assert_eq!(outer_only.candidates().len(), 1);
}

#[test]
fn candidates_satisfy_configured_bounds() {
    let frame = Frame::from(rects(
        300,
        300,
        &[(5, 5, 3, 3), (20, 20, 120, 80), (160, 40, 100, 200), (30, 200, 8, 60)],
    ));
    let config = PipelineConfig::default();
    let result = detect_staged(frame, &config).unwrap();
    assert!(
        result
            .binary
            .pixels()
            .all(|p| p.0[0] == 0 || p.0[0] == config.binary_max_value)
    );
    assert!(result.candidates().len() <= result.contours.len());

    let detection = result.into_detection();
    assert!(!detection.candidates.is_empty());
    for candidate in &detection.candidates {
        assert!((config.min_vertices..=config.max_vertices).contains(&candidate.vertex_count()));
        assert!(candidate.area > config.min_area);
        assert!(candidate.perimeter > config.min_perimeter);
        assert!(candidate.hull.len() >= 3);
        let bb = candidate.bounding_box;
        assert!(bb.x >= 0 && bb.y >= 0);
        assert!(u32::try_from(bb.x).unwrap() + bb.width <= 300);
        assert!(u32::try_from(bb.y).unwrap() + bb.height <= 300);
    }
}

#[test]
fn repeated_runs_are_identical() {
    let frame = Frame::from(rects(200, 200, &[(30, 40, 110, 90)]));
    let config = PipelineConfig::default();
    let first = detect_staged(frame.clone(), &config).unwrap();
    let second = detect_staged(frame, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn ledger_balances_on_success_and_failure() {
    let frame = Frame::from(rects(200, 200, &[(30, 40, 110, 90)]));

    let ledger = BufferLedger::new();
    let result = Pipeline::with_ledger(frame.clone(), PipelineConfig::default(), ledger.clone())
        .to_grayscale()
        .unwrap()
        .binarize()
        .unwrap()
        .extract_contours()
        .filter()
        .render()
        .unwrap()
        .finish()
        .into_detection();
    assert_eq!(result.candidates.len(), 1);
    assert_eq!(ledger.allocated(), ledger.released());

    for limit in 0..3 {
        let ledger = BufferLedger::with_limit(limit);
        let outcome = Pipeline::with_ledger(frame.clone(), PipelineConfig::default(), ledger.clone())
            .to_grayscale()
            .and_then(|s| s.binarize())
            .map(|s| s.extract_contours().filter())
            .and_then(|s| s.render());
        assert!(outcome.is_err(), "limit {limit}");
        assert_eq!(ledger.outstanding(), 0, "limit {limit}");
    }
}
