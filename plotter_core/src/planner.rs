//! Constant-acceleration motion planning along polylines.
//!
//! A path is split into segments. Each interior vertex gets a maximum entry
//! speed from the junction-deviation model (optionally lowered further by the
//! [`Throttler`]), and every segment is then covered by one to three blocks of
//! constant acceleration: accelerate, cruise and decelerate. When a segment
//! is too short to shed its entry speed before the next vertex, its entry
//! limit is lowered and planning steps back one segment.
//!
//! The result is a [`MotionPlan`] that starts and ends at rest and can be
//! sampled at any time with [`MotionPlan::instant`].

use crate::error::PlotterError;
use crate::geometry::{Drawing, Path, Point};

/// Numeric tolerance for lengths, times and angle tests.
pub const EPS: f64 = 1e-9;

/// Motion limits in plotting units and seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicLimits {
    /// Maximum acceleration magnitude, units/s².
    pub acceleration: f64,
    /// Maximum speed, units/s.
    pub max_velocity: f64,
    /// Junction deviation; 0 forces a full stop at every corner.
    pub corner_factor: f64,
}

impl Default for KinematicLimits {
    fn default() -> Self {
        Self {
            acceleration: 8.0,
            max_velocity: 2.0,
            corner_factor: 0.005,
        }
    }
}

impl KinematicLimits {
    pub fn validate(&self) -> Result<(), PlotterError> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        if !ok(self.acceleration) {
            return Err(PlotterError::Config("acceleration must be > 0".into()));
        }
        if !ok(self.max_velocity) {
            return Err(PlotterError::Config("max_velocity must be > 0".into()));
        }
        if !(self.corner_factor.is_finite() && self.corner_factor >= 0.0) {
            return Err(PlotterError::Config("corner_factor must be >= 0".into()));
        }
        Ok(())
    }
}

/// Deviation limit applied to vertex speeds on dense polylines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throttle {
    /// Lookahead window, seconds.
    pub timeslice_s: f64,
    /// Largest allowed distance between a skipped vertex and the chord, units.
    pub threshold: f64,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            timeslice_s: 0.02,
            threshold: 0.001,
        }
    }
}

/// Kinematic state of the pen holder at one moment of a plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionState {
    pub t: f64,
    pub position: Point,
    /// Distance travelled along the path since the plan started.
    pub distance: f64,
    pub speed: f64,
    pub acceleration: f64,
    /// Unit direction of travel; zero when the plan has no motion.
    pub direction: Point,
}

impl MotionState {
    fn at_rest(t: f64, position: Point, distance: f64) -> Self {
        Self {
            t,
            position,
            distance,
            speed: 0.0,
            acceleration: 0.0,
            direction: Point::ORIGIN,
        }
    }

    pub fn velocity(&self) -> Point {
        self.direction * self.speed
    }
}

#[derive(Debug, Clone, Copy)]
struct Block {
    accel: f64,
    duration: f64,
    entry_speed: f64,
    p1: Point,
    p2: Point,
    length: f64,
    direction: Point,
}

impl Block {
    fn new(accel: f64, duration: f64, entry_speed: f64, p1: Point, p2: Point) -> Self {
        Self {
            accel,
            duration,
            entry_speed,
            p1,
            p2,
            length: p1.distance(p2),
            direction: (p2 - p1).normalize(),
        }
    }

    fn state(&self, t: f64, t0: f64, s0: f64) -> MotionState {
        let t = t.clamp(0.0, self.duration);
        let speed = self.entry_speed + self.accel * t;
        let s = (self.entry_speed * t + self.accel * t * t / 2.0).clamp(0.0, self.length);
        let position = if t >= self.duration {
            self.p2
        } else {
            self.p1 + self.direction * s
        };
        MotionState {
            t: t0 + t,
            position,
            distance: s0 + s,
            speed,
            acceleration: self.accel,
            direction: self.direction,
        }
    }
}

/// Time-parameterized trajectory along one path.
#[derive(Debug, Clone)]
pub struct MotionPlan {
    blocks: Vec<Block>,
    starts: Vec<f64>,
    offsets: Vec<f64>,
    duration: f64,
    length: f64,
    start: Point,
    end: Point,
}

impl MotionPlan {
    fn stationary(p: Point) -> Self {
        Self {
            blocks: Vec::new(),
            starts: Vec::new(),
            offsets: Vec::new(),
            duration: 0.0,
            length: 0.0,
            start: p,
            end: p,
        }
    }

    fn from_blocks(blocks: Vec<Block>, start: Point, end: Point) -> Self {
        let mut starts = Vec::with_capacity(blocks.len());
        let mut offsets = Vec::with_capacity(blocks.len());
        let (mut t, mut s) = (0.0, 0.0);
        for b in &blocks {
            starts.push(t);
            offsets.push(s);
            t += b.duration;
            s += b.length;
        }
        Self {
            blocks,
            starts,
            offsets,
            duration: t,
            length: s,
            start,
            end,
        }
    }

    /// Total time, seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Total distance along the path, units.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// True when the plan produces no motion.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// State at time `t`, clamped to `[0, duration]`.
    ///
    /// `t <= 0` yields the first point exactly and `t >= duration` the last
    /// point exactly.
    pub fn instant(&self, t: f64) -> MotionState {
        if self.blocks.is_empty() || t <= 0.0 || t.is_nan() {
            let mut s = MotionState::at_rest(0.0, self.start, 0.0);
            if let Some(b) = self.blocks.first() {
                s.acceleration = b.accel;
                s.direction = b.direction;
            }
            return s;
        }
        if t >= self.duration {
            return MotionState::at_rest(self.duration, self.end, self.length);
        }
        let i = self
            .starts
            .partition_point(|&bt| bt <= t)
            .saturating_sub(1);
        self.blocks[i].state(t - self.starts[i], self.starts[i], self.offsets[i])
    }

    pub fn position(&self, t: f64) -> Point {
        self.instant(t).position
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    p1: Point,
    p2: Point,
    length: f64,
    direction: Point,
    max_entry_speed: f64,
    entry_speed: f64,
}

impl Segment {
    fn new(p1: Point, p2: Point) -> Self {
        Self {
            p1,
            p2,
            length: p1.distance(p2),
            direction: (p2 - p1).normalize(),
            max_entry_speed: 0.0,
            entry_speed: 0.0,
        }
    }
}

/// Highest speed at which the corner between two unit directions can be
/// taken while deviating at most `deviation` from the sharp vertex.
///
/// Reversals give 0, straight continuations give `max_velocity`, and the
/// result grows as the turn gets shallower.
pub fn corner_velocity(
    incoming: Point,
    outgoing: Point,
    max_velocity: f64,
    acceleration: f64,
    deviation: f64,
) -> f64 {
    let cosine = -incoming.dot(outgoing);
    if (cosine - 1.0).abs() < EPS {
        return 0.0;
    }
    let sine = ((1.0 - cosine) / 2.0).max(0.0).sqrt();
    if (sine - 1.0).abs() < EPS {
        return max_velocity;
    }
    let v = (acceleration * deviation * sine / (1.0 - sine)).sqrt();
    v.min(max_velocity)
}

/// Caps vertex speeds so that, sampled once per timeslice, the pen never
/// cuts a corner of a dense polyline by more than the threshold.
pub struct Throttler<'a> {
    points: &'a [Point],
    max_velocity: f64,
    throttle: Throttle,
    distances: Vec<f64>,
}

impl<'a> Throttler<'a> {
    pub fn new(points: &'a [Point], max_velocity: f64, throttle: Throttle) -> Self {
        let mut distances = Vec::with_capacity(points.len());
        let mut total = 0.0;
        let mut prev = points.first().copied().unwrap_or_default();
        for &p in points {
            total += prev.distance(p);
            distances.push(total);
            prev = p;
        }
        Self {
            points,
            max_velocity,
            throttle,
            distances,
        }
    }

    fn lookup(&self, distance: f64) -> usize {
        self.distances
            .partition_point(|&d| d <= distance)
            .saturating_sub(1)
    }

    fn is_feasible(&self, i0: usize, v: f64) -> bool {
        let x0 = self.distances[i0];
        let x1 = x0 + v * self.throttle.timeslice_s;
        let i1 = self.lookup(x1);
        if i0 >= i1 {
            return true;
        }
        let p0 = self.points[i0];
        let p10 = self.points[i1];
        let p11 = self.points.get(i1 + 1).copied().unwrap_or(p10);
        let p1 = p10.toward(p11, x1 - self.distances[i1]);
        self.points[i0 + 1..=i1]
            .iter()
            .all(|p| p.segment_distance(p0, p1) <= self.throttle.threshold)
    }

    /// Highest feasible speed at point `i`, found by bisection.
    pub fn max_velocity(&self, i: usize) -> f64 {
        if self.is_feasible(i, self.max_velocity) {
            return self.max_velocity;
        }
        let (mut lo, mut hi) = (0.0, self.max_velocity);
        for _ in 0..16 {
            let v = (lo + hi) / 2.0;
            if self.is_feasible(i, v) {
                lo = v;
            } else {
                hi = v;
            }
        }
        lo
    }

    pub fn max_velocities(&self) -> Vec<f64> {
        (0..self.points.len()).map(|i| self.max_velocity(i)).collect()
    }
}

/// Plans paths against fixed limits, with an optional throttle.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    limits: KinematicLimits,
    throttle: Option<Throttle>,
}

impl Planner {
    pub fn new(limits: KinematicLimits) -> Self {
        Self {
            limits,
            throttle: None,
        }
    }

    #[must_use]
    pub fn with_throttle(mut self, throttle: Option<Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn limits(&self) -> KinematicLimits {
        self.limits
    }

    pub fn throttle(&self) -> Option<Throttle> {
        self.throttle
    }

    /// Plan one polyline.
    ///
    /// Fails with `InvalidPath` on non-finite coordinates and with `Config`
    /// on invalid limits. Consecutive duplicate points are ignored; a path
    /// with fewer than two distinct points yields a zero-duration plan.
    pub fn plan(&self, points: &[Point]) -> Result<MotionPlan, PlotterError> {
        self.limits.validate()?;
        if let Some(i) = points.iter().position(|p| !p.is_finite()) {
            return Err(PlotterError::InvalidPath(format!(
                "point {i} has non-finite coordinates"
            )));
        }
        let Some(&first) = points.first() else {
            return Err(PlotterError::InvalidPath("path has no points".into()));
        };

        let mut distinct = Vec::with_capacity(points.len());
        distinct.push(first);
        for &p in &points[1..] {
            if let Some(&prev) = distinct.last()
                && prev.distance(p) > EPS
            {
                distinct.push(p);
            }
        }
        if distinct.len() < 2 {
            return Ok(MotionPlan::stationary(first));
        }
        // Land exactly on the caller's last point even if trailing duplicates were dropped.
        if let (Some(end), Some(&input_end)) = (distinct.last_mut(), points.last()) {
            *end = input_end;
        }

        let KinematicLimits {
            acceleration: a,
            max_velocity: vmax,
            corner_factor: cf,
        } = self.limits;

        let caps = self
            .throttle
            .map(|th| Throttler::new(&distinct, vmax, th).max_velocities());

        let mut segments: Vec<Segment> = distinct
            .windows(2)
            .map(|w| Segment::new(w[0], w[1]))
            .collect();
        for i in 1..segments.len() {
            let corner = corner_velocity(
                segments[i - 1].direction,
                segments[i].direction,
                vmax,
                a,
                cf,
            );
            let cap = caps.as_ref().map_or(vmax, |c| c[i]);
            segments[i].max_entry_speed = corner.min(cap);
        }
        let last = distinct[distinct.len() - 1];
        segments.push(Segment::new(last, last));

        let mut blocks: Vec<Vec<Block>> = vec![Vec::new(); segments.len() - 1];
        let mut i = 0;
        while i < segments.len() - 1 {
            let seg = segments[i];
            let exit_limit = segments[i + 1].max_entry_speed;
            let (vi, s) = (seg.entry_speed, seg.length);

            let s1 = (2.0 * a * s + exit_limit * exit_limit - vi * vi) / (4.0 * a);
            let s2 = s - s1;

            if s1 < -EPS {
                // Too fast to stop in time: lower this entry and revisit.
                segments[i].max_entry_speed = (exit_limit * exit_limit + 2.0 * a * s).sqrt();
                debug_assert!(i > 0, "first segment always starts at rest");
                i = i.saturating_sub(1);
                continue;
            }

            let (p1, p2) = (seg.p1, seg.p2);
            let planned: Vec<Block>;
            let exit_speed;
            if s2 < 0.0 {
                // Accelerate for the whole segment.
                let vf = (vi * vi + 2.0 * a * s).sqrt();
                let t = (vf - vi) / a;
                planned = vec![Block::new(a, t, vi, p1, p2)];
                exit_speed = vf;
            } else {
                let peak = (vi * vi + 2.0 * a * s1).max(0.0).sqrt();
                let vf = exit_limit;
                if peak > vmax {
                    let t1 = (vmax - vi) / a;
                    let d1 = (vmax + vi) / 2.0 * t1;
                    let t3 = (vmax - vf) / a;
                    let d3 = (vmax + vf) / 2.0 * t3;
                    let t2 = (s - d1 - d3) / vmax;
                    let q1 = p1.toward(p2, d1);
                    let q2 = p1.toward(p2, s - d3);
                    planned = vec![
                        Block::new(a, t1, vi, p1, q1),
                        Block::new(0.0, t2, vmax, q1, q2),
                        Block::new(-a, t3, vmax, q2, p2),
                    ];
                } else {
                    let t1 = (peak - vi) / a;
                    let t2 = (peak - vf) / a;
                    let q = p1.toward(p2, s1.clamp(0.0, s));
                    planned = vec![
                        Block::new(a, t1, vi, p1, q),
                        Block::new(-a, t2, peak, q, p2),
                    ];
                }
                exit_speed = vf;
            }
            blocks[i] = planned;
            segments[i + 1].entry_speed = exit_speed;
            i += 1;
        }

        let blocks: Vec<Block> = blocks
            .into_iter()
            .flatten()
            .filter(|b| b.duration > EPS)
            .collect();
        Ok(MotionPlan::from_blocks(blocks, first, last))
    }

    pub fn plan_path(&self, path: &Path) -> Result<MotionPlan, PlotterError> {
        self.plan(path)
    }

    pub fn plan_all(&self, paths: &[Path]) -> Result<Vec<MotionPlan>, PlotterError> {
        paths.iter().map(|p| self.plan(p)).collect()
    }

    /// Plans for every travel and drawing move of `drawing`, in run order.
    pub fn plan_drawing(&self, drawing: &Drawing) -> Result<Vec<MotionPlan>, PlotterError> {
        self.plan_all(&drawing.travel_sequence())
    }
}

/// Plan `points` against `limits` without throttling.
pub fn plan(points: &[Point], limits: KinematicLimits) -> Result<MotionPlan, PlotterError> {
    Planner::new(limits).plan(points)
}
