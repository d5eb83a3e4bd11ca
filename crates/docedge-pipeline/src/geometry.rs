//! Planar geometry on integer pixel points.
//!
//! Shoelace area, closed perimeter, bounding boxes, convex hulls and
//! convexity tests. Cross products are computed in `i64` so they are
//! exact for any image size `image` can represent.

use crate::types::{BoundingBox, Point};

/// Cross product of `a - o` and `b - o`.
///
/// Positive when `o -> a -> b` turns counter-clockwise in a y-up frame
/// (clockwise on screen, where y grows downwards).
fn cross(o: Point, a: Point, b: Point) -> i64 {
    let (ax, ay) = (i64::from(a.x) - i64::from(o.x), i64::from(a.y) - i64::from(o.y));
    let (bx, by) = (i64::from(b.x) - i64::from(o.x), i64::from(b.y) - i64::from(o.y));
    ax * by - ay * bx
}

/// Signed area of a closed polygon (shoelace formula).
///
/// The sign reflects orientation; callers wanting the enclosed area take
/// the absolute value. Fewer than three points enclose nothing.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn signed_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y))
        .sum();
    twice as f64 / 2.0
}

/// Length of the closed outline through `points`, including the edge
/// from the last point back to the first.
#[must_use]
pub fn perimeter(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(&p, &q)| p.distance(q))
        .sum()
}

/// Smallest axis-aligned box containing every point, with inclusive
/// pixel extents. Empty input yields a zero-sized box at the origin.
#[must_use]
pub fn bounding_box(points: &[Point]) -> BoundingBox {
    let Some(first) = points.first() else {
        return BoundingBox::default();
    };
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    BoundingBox {
        x: min_x,
        y: min_y,
        width: (max_x - min_x + 1).unsigned_abs(),
        height: (max_y - min_y + 1).unsigned_abs(),
    }
}

/// Convex hull by Andrew's monotone chain.
///
/// Vertices are returned without repeats or collinear points, starting
/// from the smallest `(x, y)` and turning counter-clockwise in a y-up
/// frame. Inputs with fewer than three distinct points return those
/// points.
#[must_use]
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(sorted.len() + 1);
    // Lower chain.
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    // Upper chain.
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0
        {
            hull.pop();
        }
        hull.push(p);
    }
    // The last point repeats the first.
    hull.pop();
    hull
}

/// Whether the closed polygon is convex and simple.
///
/// Every non-degenerate turn must bend the same way and the outline may
/// wind around only once, which rejects star-shaped self-intersections.
/// Fewer than three points are never convex.
#[must_use]
pub fn is_convex(points: &[Point]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }

    let mut orientation = 0_i64;
    let mut x_flips = 0;
    let mut last_dx = 0;
    for i in 0..n {
        let (a, b, c) = (points[i], points[(i + 1) % n], points[(i + 2) % n]);
        let turn = cross(a, b, c).signum();
        if turn != 0 {
            if orientation == 0 {
                orientation = turn;
            } else if turn != orientation {
                return false;
            }
        }

        let dx = (b.x - a.x).signum();
        if dx != 0 {
            if last_dx != 0 && dx != last_dx {
                x_flips += 1;
            }
            last_dx = dx;
        }
    }
    // Close the cycle of x-direction changes.
    if let Some(first_dx) = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| (q.x - p.x).signum())
        .find(|&dx| dx != 0)
        && first_dx != last_dx
    {
        x_flips += 1;
    }

    orientation != 0 && x_flips <= 2
}
