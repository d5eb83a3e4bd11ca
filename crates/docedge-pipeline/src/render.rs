//! Outline rendering: accepted polygons drawn over a copy of the input.

use image::{DynamicImage, Luma, LumaA, Rgb, Rgba};
use imageproc::drawing::{BresenhamLineIter, Canvas, draw_line_segment_mut};
use tracing::{debug, instrument};

use crate::frame::Frame;
use crate::types::{Candidate, Color, PipelineConfig, Point};

/// Draw candidates onto a copy of `base`.
///
/// The input frame is not modified. See [`render_into`].
#[must_use = "returns the annotated frame"]
pub fn render(base: &Frame, candidates: &[Candidate], config: &PipelineConfig) -> Frame {
    let mut canvas = base.clone();
    render_into(&mut canvas, candidates, config);
    canvas
}

/// Draw candidates onto `canvas` in place.
///
/// Each polygon is stroked as a closed, unfilled, 8-connected outline in
/// `stroke_color` with `stroke_thickness`. With `draw_hulls` set, every
/// convex hull is stroked first in `hull_color`, so polygon outlines end
/// up on top. Within a pass, later candidates overwrite earlier ones.
///
/// Gray frames receive the color's luma; alpha channels are set opaque.
#[instrument(skip_all, fields(candidates = candidates.len(), draw_hulls = config.draw_hulls))]
pub fn render_into(canvas: &mut Frame, candidates: &[Candidate], config: &PipelineConfig) {
    if config.draw_hulls {
        for candidate in candidates {
            stroke_polygon(canvas, candidate.hull.points(), config.hull_color, config.hull_thickness);
        }
    }
    for candidate in candidates {
        stroke_polygon(
            canvas,
            candidate.polygon.points(),
            config.stroke_color,
            config.stroke_thickness,
        );
    }
    debug!("outlines drawn");
}

/// Stroke a closed outline in the frame's own pixel format.
fn stroke_polygon(frame: &mut Frame, points: &[Point], color: Color, thickness: u32) {
    let Color { r, g, b } = color;
    match frame.as_dynamic_mut() {
        DynamicImage::ImageLuma8(img) => stroke_closed(img, points, Luma([color.luma()]), thickness),
        DynamicImage::ImageLumaA8(img) => {
            stroke_closed(img, points, LumaA([color.luma(), u8::MAX]), thickness);
        }
        DynamicImage::ImageRgb8(img) => stroke_closed(img, points, Rgb([r, g, b]), thickness),
        DynamicImage::ImageRgba8(img) => {
            stroke_closed(img, points, Rgba([r, g, b, u8::MAX]), thickness);
        }
        // Frames are normalized to the four 8-bit layouts above.
        _ => {}
    }
}

/// Stroke the closed outline through `points` on any canvas.
#[allow(clippy::cast_precision_loss)]
fn stroke_closed<C: Canvas>(canvas: &mut C, points: &[Point], color: C::Pixel, thickness: u32) {
    let Some(&first) = points.first() else {
        return;
    };
    let as_f32 = |p: Point| (p.x as f32, p.y as f32);

    if thickness <= 1 {
        if points.len() == 1 {
            put_clipped(canvas, first, color);
        }
        for (&p, &q) in points.iter().zip(points.iter().cycle().skip(1)) {
            draw_line_segment_mut(canvas, as_f32(p), as_f32(q), color);
        }
        return;
    }

    let tip = brush(thickness);
    let mut stamp = |x: i32, y: i32| {
        for &(dx, dy) in &tip {
            put_clipped(&mut *canvas, Point::new(x + dx, y + dy), color);
        }
    };
    stamp(first.x, first.y);
    for (&p, &q) in points.iter().zip(points.iter().cycle().skip(1)) {
        for (x, y) in BresenhamLineIter::new(as_f32(p), as_f32(q)) {
            stamp(x, y);
        }
    }
}

/// Round pen tip exactly `thickness` pixels across.
///
/// Offsets span `-(thickness - 1) / 2 ..= thickness / 2`, so even widths
/// put the extra pixel below and to the right of the path.
fn brush(thickness: u32) -> Vec<(i32, i32)> {
    let side = i32::try_from(thickness).unwrap_or(i32::MAX);
    let lo = -((side - 1) / 2);
    let hi = side / 2;
    let center = f64::from(lo + hi) / 2.0;
    let radius_sq = (f64::from(side) / 2.0).powi(2);
    (lo..=hi)
        .flat_map(|dy| (lo..=hi).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| {
            let (fx, fy) = (f64::from(dx) - center, f64::from(dy) - center);
            fx.mul_add(fx, fy * fy) <= radius_sq
        })
        .collect()
}

fn put_clipped<C: Canvas>(canvas: &mut C, p: Point, color: C::Pixel) {
    let (width, height) = canvas.dimensions();
    if let (Ok(x), Ok(y)) = (u32::try_from(p.x), u32::try_from(p.y))
        && x < width
        && y < height
    {
        canvas.draw_pixel(x, y, color);
    }
}
