//! Points, paths and drawings in plotting units.
//!
//! A `Drawing` owns ordered `Path`s and caches its bounding box; every
//! mutation goes through a method that drops the cache. Transforms return new
//! drawings and leave the receiver untouched.

use std::cell::Cell;
use std::ops::{Add, Deref, Mul, Sub};

use crate::error::PlotterError;
use crate::optimize;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalize(self) -> Point {
        let d = self.length();
        if d == 0.0 {
            return Point::ORIGIN;
        }
        Point::new(self.x / d, self.y / d)
    }

    #[inline]
    pub fn distance(self, other: Point) -> f64 {
        (other - self).length()
    }

    #[inline]
    pub fn distance_squared(self, other: Point) -> f64 {
        let d = other - self;
        d.x * d.x + d.y * d.y
    }

    #[inline]
    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Point reached by travelling `s` units from `self` toward `other`.
    pub fn toward(self, other: Point, s: f64) -> Point {
        self + (other - self).normalize() * s
    }

    /// Distance from `self` to the closed segment `a`-`b`.
    pub fn segment_distance(self, a: Point, b: Point) -> f64 {
        let ab = b - a;
        let len2 = ab.dot(ab);
        if len2 == 0.0 {
            return self.distance(a);
        }
        let t = ((self - a).dot(ab) / len2).clamp(0.0, 1.0);
        self.distance(a + ab * t)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, o: Point) -> Point {
        Point::new(self.x + o.x, self.y + o.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, o: Point) -> Point {
        Point::new(self.x - o.x, self.y - o.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, k: f64) -> Point {
        Point::new(self.x * k, self.y * k)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

/// Ordered, non-empty polyline. Order defines drawing direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Path(Vec<Point>);

impl Path {
    /// Build a path, rejecting empty input and non-finite coordinates.
    pub fn new(points: Vec<Point>) -> Result<Self, PlotterError> {
        if points.is_empty() {
            return Err(PlotterError::InvalidPath("path has no points".into()));
        }
        if let Some(i) = points.iter().position(|p| !p.is_finite()) {
            return Err(PlotterError::InvalidPath(format!(
                "point {i} has non-finite coordinates"
            )));
        }
        Ok(Path(points))
    }

    /// Callers guarantee the points came from valid paths.
    pub(crate) fn from_valid(points: Vec<Point>) -> Self {
        debug_assert!(!points.is_empty());
        Path(points)
    }

    /// Unchecked two-point path for internally produced finite points.
    pub(crate) fn line(a: Point, b: Point) -> Self {
        Path(vec![a, b])
    }

    pub fn first(&self) -> Point {
        self.0[0]
    }

    pub fn last(&self) -> Point {
        self.0[self.0.len() - 1]
    }

    pub fn reversed(&self) -> Path {
        Path(self.0.iter().rev().copied().collect())
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Sum of segment lengths.
    pub fn length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

impl Deref for Path {
    type Target = [Point];
    fn deref(&self) -> &[Point] {
        &self.0
    }
}

impl TryFrom<Vec<(f64, f64)>> for Path {
    type Error = PlotterError;
    fn try_from(pairs: Vec<(f64, f64)>) -> Result<Self, Self::Error> {
        Path::new(pairs.into_iter().map(Point::from).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

#[derive(Debug, Clone, Default)]
pub struct Drawing {
    paths: Vec<Path>,
    bounds: Cell<Option<Bounds>>,
}

impl Drawing {
    pub fn new(paths: Vec<Path>) -> Self {
        Self {
            paths,
            bounds: Cell::new(None),
        }
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn into_paths(self) -> Vec<Path> {
        self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn push(&mut self, path: Path) {
        self.paths.push(path);
        self.bounds.set(None);
    }

    /// Append all paths of `other`.
    pub fn add(&mut self, other: &Drawing) {
        self.paths.extend(other.paths.iter().cloned());
        self.bounds.set(None);
    }

    /// Bounding box over all points; all zeros for an empty drawing.
    pub fn bounds(&self) -> Bounds {
        if let Some(b) = self.bounds.get() {
            return b;
        }
        let mut points = self.paths.iter().flat_map(|p| p.iter());
        let b = match points.next() {
            None => Bounds::default(),
            Some(first) => points.fold(
                Bounds {
                    min_x: first.x,
                    min_y: first.y,
                    max_x: first.x,
                    max_y: first.y,
                },
                |b, p| Bounds {
                    min_x: b.min_x.min(p.x),
                    min_y: b.min_y.min(p.y),
                    max_x: b.max_x.max(p.x),
                    max_y: b.max_y.max(p.y),
                },
            ),
        };
        self.bounds.set(Some(b));
        b
    }

    pub fn width(&self) -> f64 {
        self.bounds().width()
    }

    pub fn height(&self) -> f64 {
        self.bounds().height()
    }

    /// Total pen-down length.
    pub fn draw_length(&self) -> f64 {
        self.paths.iter().map(Path::length).sum()
    }

    /// Alternating travel and drawing moves for a full plot.
    ///
    /// Starts with a travel from the origin to the first path, puts a travel
    /// between consecutive paths, and ends with a travel back to the origin.
    pub fn travel_sequence(&self) -> Vec<Path> {
        let mut out = Vec::with_capacity(self.paths.len() * 2 + 1);
        let mut position = Point::ORIGIN;
        for path in &self.paths {
            out.push(Path::line(position, path.first()));
            out.push(path.clone());
            position = path.last();
        }
        out.push(Path::line(position, Point::ORIGIN));
        out
    }

    /// Total pen-up travel implied by `travel_sequence`.
    pub fn travel_length(&self) -> f64 {
        let mut position = Point::ORIGIN;
        let mut total = 0.0;
        for path in &self.paths {
            total += position.distance(path.first());
            position = path.last();
        }
        total + position.distance(Point::ORIGIN)
    }

    pub fn transform(&self, f: impl Fn(Point) -> Point) -> Drawing {
        Drawing::new(
            self.paths
                .iter()
                .map(|p| Path::from_valid(p.iter().map(|&q| f(q)).collect()))
                .collect(),
        )
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Drawing {
        self.transform(|p| Point::new(p.x + dx, p.y + dy))
    }

    pub fn scale(&self, sx: f64, sy: f64) -> Drawing {
        self.transform(|p| Point::new(p.x * sx, p.y * sy))
    }

    /// Rotate about the origin by `degrees`, counter-clockwise.
    pub fn rotate(&self, degrees: f64) -> Drawing {
        let (s, c) = degrees.to_radians().sin_cos();
        self.transform(|p| Point::new(p.x * c - p.y * s, p.y * c + p.x * s))
    }

    /// Translate so that the anchor `(ax, ay)` of the bounding box, given as
    /// fractions of width and height, lands on `(x, y)`.
    pub fn move_to_anchor(&self, x: f64, y: f64, ax: f64, ay: f64) -> Drawing {
        let b = self.bounds();
        let dx = b.min_x + b.width() * ax - x;
        let dy = b.min_y + b.height() * ay - y;
        self.translate(-dx, -dy)
    }

    pub fn origin(&self) -> Drawing {
        self.move_to_anchor(0.0, 0.0, 0.0, 0.0)
    }

    pub fn center(&self, width: f64, height: f64) -> Drawing {
        self.move_to_anchor(width / 2.0, height / 2.0, 0.5, 0.5)
    }

    /// First rotation (in `step` degree increments) that fits the page, centered.
    pub fn rotate_to_fit(&self, width: f64, height: f64, step: u32) -> Option<Drawing> {
        (0..180)
            .step_by(step.max(1) as usize)
            .map(|angle| self.rotate(f64::from(angle)))
            .find(|d| d.width() <= width && d.height() <= height)
            .map(|d| d.center(width, height))
    }

    /// Uniform scale into the page inset by `padding`, centered on the page.
    pub fn scale_to_fit(&self, width: f64, height: f64, padding: f64) -> Drawing {
        let k = fit_scale(self, width - padding * 2.0, height - padding * 2.0);
        self.scale(k, k).center(width, height)
    }

    pub fn scale_to_fit_width(&self, width: f64, padding: f64) -> Drawing {
        self.scale_to_fit(width, 1e9, padding)
    }

    pub fn scale_to_fit_height(&self, height: f64, padding: f64) -> Drawing {
        self.scale_to_fit(1e9, height, padding)
    }

    /// Try every rotation in `step` increments and keep the one that can be
    /// scaled largest, then scale and center it.
    pub fn rotate_and_scale_to_fit(&self, width: f64, height: f64, padding: f64, step: u32) -> Drawing {
        let (inner_w, inner_h) = (width - padding * 2.0, height - padding * 2.0);
        let mut best: Option<(f64, Drawing)> = None;
        for angle in (0..180).step_by(step.max(1) as usize) {
            let d = self.rotate(f64::from(angle));
            let k = fit_scale(&d, inner_w, inner_h);
            if best.as_ref().is_none_or(|(bk, _)| k > *bk) {
                best = Some((k, d));
            }
        }
        match best {
            Some((k, d)) => d.scale(k, k).center(width, height),
            None => self.clone(),
        }
    }

    /// Keep only paths lying entirely inside `[0, width] x [0, height]`.
    pub fn remove_paths_outside(&self, width: f64, height: f64) -> Drawing {
        Drawing::new(
            self.paths
                .iter()
                .filter(|p| {
                    p.iter()
                        .all(|q| q.x >= 0.0 && q.y >= 0.0 && q.x <= width && q.y <= height)
                })
                .cloned()
                .collect(),
        )
    }

    pub fn simplify(&self, tolerance: f64) -> Drawing {
        Drawing::new(optimize::simplify(&self.paths, tolerance))
    }

    pub fn sort(&self, reversable: bool) -> Drawing {
        Drawing::new(optimize::sort(&self.paths, reversable))
    }

    pub fn join(&self, tolerance: f64) -> Drawing {
        Drawing::new(optimize::join(&self.paths, tolerance))
    }
}

fn fit_scale(d: &Drawing, width: f64, height: f64) -> f64 {
    let k = (width / d.width()).min(height / d.height());
    if k.is_finite() && k > 0.0 { k } else { 1.0 }
}

impl TryFrom<Vec<Vec<(f64, f64)>>> for Drawing {
    type Error = PlotterError;
    fn try_from(paths: Vec<Vec<(f64, f64)>>) -> Result<Self, Self::Error> {
        let paths = paths
            .into_iter()
            .enumerate()
            .map(|(i, pairs)| {
                Path::try_from(pairs).map_err(|e| match e {
                    PlotterError::InvalidPath(msg) => {
                        PlotterError::InvalidPath(format!("path {i}: {msg}"))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Drawing::new(paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Drawing {
        Drawing::try_from(vec![vec![(1.0, 1.0), (3.0, 1.0), (3.0, 2.0), (1.0, 2.0)]]).unwrap()
    }

    #[test]
    fn path_rejects_empty_and_nan() {
        assert!(Path::new(vec![]).is_err());
        assert!(Path::new(vec![Point::new(0.0, f64::NAN)]).is_err());
        assert!(Path::new(vec![Point::new(f64::INFINITY, 0.0)]).is_err());
    }

    #[test]
    fn bounds_cache_invalidated_on_mutation() {
        let mut d = square();
        assert_eq!(d.width(), 2.0);
        assert_eq!(d.height(), 1.0);
        d.push(Path::line(Point::new(0.0, 0.0), Point::new(5.0, 5.0)));
        let b = d.bounds();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (0.0, 0.0, 5.0, 5.0));
    }

    #[test]
    fn empty_drawing_has_zero_bounds() {
        assert_eq!(Drawing::default().bounds(), Bounds::default());
    }

    #[test]
    fn origin_and_center() {
        let d = square().origin();
        assert_eq!(d.bounds().min_x, 0.0);
        assert_eq!(d.bounds().min_y, 0.0);
        let c = square().center(10.0, 8.0);
        let b = c.bounds();
        assert!((b.min_x + b.max_x - 10.0).abs() < 1e-12);
        assert!((b.min_y + b.max_y - 8.0).abs() < 1e-12);
    }

    #[test]
    fn rotate_quarter_turn() {
        let d = Drawing::new(vec![Path::line(Point::ORIGIN, Point::new(1.0, 0.0))]).rotate(90.0);
        let p = d.paths()[0].last();
        assert!(p.x.abs() < 1e-12 && (p.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn scale_to_fit_respects_padding() {
        let d = square().scale_to_fit(12.0, 8.5, 0.5);
        assert!(d.height() <= 7.5 + 1e-9);
        assert!((d.width() - 11.0).abs() < 1e-9);
        let b = d.bounds();
        assert!((b.min_x - 0.5).abs() < 1e-9 && (b.max_x - 11.5).abs() < 1e-9);
        assert!(b.min_y >= 0.5 - 1e-9 && b.max_y <= 8.0 + 1e-9);
    }

    #[test]
    fn rotate_to_fit_finds_rotation() {
        let tall = Drawing::new(vec![Path::line(Point::ORIGIN, Point::new(0.0, 10.0))]);
        let fitted = tall.rotate_to_fit(11.0, 2.0, 5).expect("rotation exists");
        assert!(fitted.width() <= 11.0 && fitted.height() <= 2.0);
        assert!(tall.rotate_to_fit(1.0, 1.0, 5).is_none());
    }

    #[test]
    fn rotate_and_scale_picks_largest_fit() {
        let tall = Drawing::new(vec![Path::line(Point::ORIGIN, Point::new(0.0, 10.0))]);
        let d = tall.rotate_and_scale_to_fit(12.0, 3.0, 0.5, 15);
        assert!((d.width() - 11.0).abs() < 1e-9);
        assert!(d.height() < 1e-9);
    }

    #[test]
    fn remove_paths_outside_page() {
        let mut d = square();
        d.push(Path::line(Point::new(-1.0, 0.0), Point::new(1.0, 1.0)));
        assert_eq!(d.remove_paths_outside(12.0, 8.5).len(), 1);
    }

    #[test]
    fn travel_sequence_brackets_every_path() {
        let d = Drawing::try_from(vec![vec![(1.0, 0.0), (2.0, 0.0)], vec![(2.0, 1.0), (0.0, 1.0)]]).unwrap();
        let seq = d.travel_sequence();
        assert_eq!(seq.len(), 5);
        assert_eq!(seq[0].points(), &[Point::ORIGIN, Point::new(1.0, 0.0)]);
        assert_eq!(seq[2].points(), &[Point::new(2.0, 0.0), Point::new(2.0, 1.0)]);
        assert_eq!(seq[4].points(), &[Point::new(0.0, 1.0), Point::ORIGIN]);
        assert!((d.travel_length() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn segment_distance_handles_degenerate_segment() {
        let p = Point::new(3.0, 4.0);
        assert_eq!(p.segment_distance(Point::ORIGIN, Point::ORIGIN), 5.0);
        assert_eq!(Point::new(0.5, 1.0).segment_distance(Point::ORIGIN, Point::new(1.0, 0.0)), 1.0);
        assert_eq!(Point::new(2.0, 0.0).segment_distance(Point::ORIGIN, Point::new(1.0, 0.0)), 1.0);
    }
}
