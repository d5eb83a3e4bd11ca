//! Closed-contour approximation using the Ramer-Douglas-Peucker algorithm.
//!
//! A closed curve has no natural end points, so the ring is first split
//! at two far-apart points and each half is simplified as an open chain.
//! A final pass drops vertices lying almost on the line between their
//! neighbours.

use crate::types::Point;

/// Number of refinement rounds when searching for a far-apart pair.
const FARTHEST_PAIR_ROUNDS: usize = 3;

/// Approximate a closed contour by a polygon with fewer vertices.
///
/// No point of the contour lies farther than roughly `epsilon` pixels
/// from the returned outline. Larger tolerances yield fewer vertices; a
/// contour that fits inside a disc of radius `epsilon` collapses to a
/// single point.
#[must_use = "returns the approximated polygon"]
pub fn approximate_closed(points: &[Point], epsilon: f64) -> Vec<Point> {
    let n = points.len();
    if n < 2 {
        return points.to_vec();
    }

    let Some((a, b)) = farthest_pair(points, epsilon) else {
        return vec![points[0]];
    };

    // Rotate so the ring starts at `a`; `b` lands at `split`.
    let ring: Vec<Point> = points[a..].iter().chain(&points[..a]).copied().collect();
    let split = (b + n - a) % n;

    let first = &ring[..=split];
    let mut second: Vec<Point> = ring[split..].to_vec();
    second.push(ring[0]);

    let first_kept = simplify_chain(first, epsilon);
    let second_kept = simplify_chain(&second, epsilon);
    // The end points of the second chain are `b` and `a`, already kept.
    let tail = second.len() - 1;
    let approx: Vec<Point> = first
        .iter()
        .zip(&first_kept)
        .chain(second[1..tail].iter().zip(&second_kept[1..tail]))
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect();

    drop_near_collinear(&approx, epsilon)
}

/// Find two far-apart points of the ring, or `None` if every point lies
/// within `epsilon` of the starting point.
fn farthest_pair(points: &[Point], epsilon: f64) -> Option<(usize, usize)> {
    let eps_sq = epsilon * epsilon;
    let mut start = 0;
    let mut far = 0;
    for _ in 0..FARTHEST_PAIR_ROUNDS {
        let origin = points[start];
        let (index, dist_sq) = points
            .iter()
            .enumerate()
            .map(|(i, &p)| (i, origin.distance_squared(p)))
            .fold((start, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if dist_sq <= eps_sq {
            return None;
        }
        // Alternate: the next round measures from the point just found.
        far = start;
        start = index;
    }
    Some((far.min(start), far.max(start)))
}

/// Mark the points of an open chain that survive simplification.
/// End points are always kept.
fn simplify_chain(points: &[Point], tolerance: f64) -> Vec<bool> {
    let mut kept = vec![false; points.len()];
    let Some(last) = points.len().checked_sub(1) else {
        return kept;
    };
    kept[0] = true;
    kept[last] = true;
    rdp_recurse(points, 0, last, tolerance, &mut kept);
    kept
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = f64::from(b.x - a.x);
    let dy = f64::from(b.y - a.y);
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(f64::from(a.y - p.y), -(dy * f64::from(a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

/// Remove vertices that sit on a diagonal line between their neighbours
/// and do not reverse direction. Axis-aligned runs are left alone. At
/// least two vertices always remain.
fn drop_near_collinear(points: &[Point], epsilon: f64) -> Vec<Point> {
    let n = points.len();
    if n <= 2 {
        return points.to_vec();
    }

    let threshold = 0.5 * epsilon * epsilon;
    let mut removed = vec![false; n];
    let mut remaining = n;
    let mut start = points[n - 1];

    for i in 0..n {
        if remaining <= 2 {
            break;
        }
        let pt = points[i];
        let end_index = if i + 1 < n {
            i + 1
        } else {
            removed.iter().position(|&r| !r).unwrap_or(0)
        };
        let end = points[end_index];

        let (dx, dy) = (end.x - start.x, end.y - start.y);
        let (px, py) = (pt.x - start.x, pt.y - start.y);
        let dist = f64::from(px).mul_add(f64::from(dy), -(f64::from(py) * f64::from(dx)));
        let inner = i64::from(px) * i64::from(end.x - pt.x) + i64::from(py) * i64::from(end.y - pt.y);
        let length_sq = f64::from(dx).mul_add(f64::from(dx), f64::from(dy) * f64::from(dy));

        if dist * dist <= threshold * length_sq && dx != 0 && dy != 0 && inner >= 0 {
            removed[i] = true;
            remaining -= 1;
        } else {
            start = pt;
        }
    }

    points
        .iter()
        .zip(&removed)
        .filter(|&(_, r)| !*r)
        .map(|(&p, _)| p)
        .collect()
}
