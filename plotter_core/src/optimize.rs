//! Path simplification, ordering and joining.
//!
//! All three preserve the point set in the sense that matters for plotting:
//! `sort` is a permutation (with optional per-path reversal), `join` only
//! concatenates, and `simplify` only ever drops interior points.

use crate::geometry::{Path, Point};

/// Ramer-Douglas-Peucker over one polyline.
///
/// Interior points survive only if their distance to the current anchor
/// chord is strictly greater than `tolerance`, so a tolerance of zero removes
/// exactly collinear points and nothing else. Endpoints always survive.
pub fn simplify_points(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0usize, last)];
    while let Some((lo, hi)) = stack.pop() {
        if hi <= lo + 1 {
            continue;
        }
        let (a, b) = (points[lo], points[hi]);
        let mut index = lo;
        let mut distance = 0.0;
        for (i, p) in points.iter().enumerate().take(hi).skip(lo + 1) {
            let d = p.segment_distance(a, b);
            if d > distance {
                index = i;
                distance = d;
            }
        }
        if distance > tolerance {
            keep[index] = true;
            stack.push((lo, index));
            stack.push((index, hi));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

pub fn simplify(paths: &[Path], tolerance: f64) -> Vec<Path> {
    paths
        .iter()
        .map(|p| Path::from_valid(simplify_points(p, tolerance)))
        .collect()
}

/// Greedy nearest-neighbour ordering to cut pen-up travel.
///
/// The first path keeps its place and direction. Each following pick is the
/// remaining path whose start (or, when `reversable`, whose end) lies closest
/// to the current pen position; picking by end reverses that path.
pub fn sort(paths: &[Path], reversable: bool) -> Vec<Path> {
    let Some((first, rest)) = paths.split_first() else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(paths.len());
    out.push(first.clone());
    let mut cursor = first.last();
    let mut remaining: Vec<Option<&Path>> = rest.iter().map(Some).collect();

    for _ in 0..rest.len() {
        let mut best: Option<(usize, bool, f64)> = None;
        for (i, path) in remaining.iter().enumerate() {
            let Some(path) = path else { continue };
            let d = cursor.distance_squared(path.first());
            if best.is_none_or(|(_, _, bd)| d < bd) {
                best = Some((i, false, d));
            }
            if reversable {
                let d = cursor.distance_squared(path.last());
                if best.is_none_or(|(_, _, bd)| d < bd) {
                    best = Some((i, true, d));
                }
            }
        }
        let Some((i, reverse, _)) = best else { break };
        let Some(path) = remaining[i].take() else { break };
        let next = if reverse { path.reversed() } else { path.clone() };
        cursor = next.last();
        out.push(next);
    }
    out
}

/// Concatenate consecutive paths whose gap is within `tolerance`.
///
/// Order is preserved. When the end of one path and the start of the next
/// coincide exactly the shared point is kept once.
pub fn join(paths: &[Path], tolerance: f64) -> Vec<Path> {
    let mut out: Vec<Vec<Point>> = Vec::with_capacity(paths.len());
    for path in paths {
        if let Some(prev) = out.last_mut() {
            let end = prev[prev.len() - 1];
            if end.distance(path.first()) <= tolerance {
                let skip = usize::from(end == path.first());
                prev.extend_from_slice(&path[skip..]);
                continue;
            }
        }
        out.push(path.to_vec());
    }
    out.into_iter().map(Path::from_valid).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(v: &[(f64, f64)]) -> Vec<Point> {
        v.iter().copied().map(Point::from).collect()
    }

    #[test]
    fn zero_tolerance_drops_only_collinear() {
        let line = pts(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0)]);
        assert_eq!(
            simplify_points(&line, 0.0),
            pts(&[(0.0, 0.0), (2.0, 0.0), (2.0, 1.0)])
        );
    }

    #[test]
    fn closed_path_keeps_far_point() {
        let loop_ = pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        assert_eq!(simplify_points(&loop_, 0.1), loop_);
    }

    #[test]
    fn tolerance_removes_small_wiggles() {
        let wiggle = pts(&[(0.0, 0.0), (1.0, 0.01), (2.0, -0.01), (3.0, 0.0)]);
        assert_eq!(simplify_points(&wiggle, 0.05), pts(&[(0.0, 0.0), (3.0, 0.0)]));
    }

    #[test]
    fn sort_keeps_first_and_reverses_when_closer() {
        let a = Path::line(Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        let far = Path::line(Point::new(9.0, 9.0), Point::new(10.0, 10.0));
        let near_end = Path::line(Point::new(5.0, 0.0), Point::new(1.0, 0.1));
        let sorted = sort(&[a.clone(), far.clone(), near_end.clone()], true);
        assert_eq!(sorted[0], a);
        assert_eq!(sorted[1], near_end.reversed());
        assert_eq!(sorted[2], far);

        let sorted = sort(&[a.clone(), far.clone(), near_end.clone()], false);
        assert_eq!(sorted[1], near_end);
    }

    #[test]
    fn join_dedups_shared_point() {
        let a = Path::line(Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        let b = Path::line(Point::new(1.0, 0.0), Point::new(1.0, 1.0));
        let joined = join(&[a, b], 0.0);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].points(), pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]).as_slice());
    }

    #[test]
    fn empty_inputs() {
        assert!(sort(&[], true).is_empty());
        assert!(join(&[], 1.0).is_empty());
        assert!(simplify(&[], 1.0).is_empty());
    }
}
