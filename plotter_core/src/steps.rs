//! Quantization of motion plans into fixed-duration step commands.
//!
//! The plotter's motors drive a CoreXY-style belt arrangement: motor A moves
//! along `x + y` and motor B along `x - y`. Each tick samples the plan, maps
//! the Cartesian displacement onto the motor axes, and emits whole steps. The
//! fractional remainder is carried into the next tick so rounding error never
//! accumulates past one step per axis.

use crate::geometry::Point;
use crate::planner::MotionPlan;

pub const DEFAULT_TIMESLICE_MS: u32 = 15;

/// One `XM` move: both motors step the given counts over `duration_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepCommand {
    pub duration_ms: u32,
    pub delta_a: i32,
    pub delta_b: i32,
}

/// Fractional steps not yet emitted, per motor axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResidualError {
    pub a: f64,
    pub b: f64,
}

impl ResidualError {
    pub fn is_bounded(&self) -> bool {
        self.a.abs() < 1.0 && self.b.abs() < 1.0
    }
}

/// Cartesian displacement to motor-axis displacement `(a, b)`.
#[inline]
pub fn to_axes(d: Point) -> (f64, f64) {
    (d.x + d.y, d.x - d.y)
}

/// Inverse of [`to_axes`].
#[inline]
pub fn from_axes(a: f64, b: f64) -> Point {
    let y = (a - b) / 2.0;
    Point::new(y + b, y)
}

#[derive(Debug, Clone)]
pub struct StepSynthesizer {
    steps_per_unit: f64,
    timeslice_ms: u32,
    residual: ResidualError,
}

impl StepSynthesizer {
    pub fn new(steps_per_unit: f64, timeslice_ms: u32) -> Self {
        debug_assert!(steps_per_unit.is_finite() && steps_per_unit > 0.0);
        Self {
            steps_per_unit,
            timeslice_ms: timeslice_ms.max(1),
            residual: ResidualError::default(),
        }
    }

    pub fn steps_per_unit(&self) -> f64 {
        self.steps_per_unit
    }

    pub fn timeslice_ms(&self) -> u32 {
        self.timeslice_ms
    }

    pub fn residual(&self) -> ResidualError {
        self.residual
    }

    /// Forget any carried fraction. Call once per session, never between paths.
    pub fn reset(&mut self) {
        self.residual = ResidualError::default();
    }

    /// Number of commands `synthesize` will yield for `plan`.
    #[allow(clippy::cast_precision_loss)]
    pub fn tick_count(&self, plan: &MotionPlan) -> u64 {
        let dt = self.tick_secs();
        let mut k = 0u64;
        while (k as f64) * dt < plan.duration() {
            k += 1;
        }
        k
    }

    fn tick_secs(&self) -> f64 {
        f64::from(self.timeslice_ms) / 1000.0
    }

    /// Lazily quantize `plan`; the residual is updated as commands are pulled.
    pub fn synthesize<'a>(&'a mut self, plan: &'a MotionPlan) -> Ticks<'a> {
        Ticks {
            synth: self,
            plan,
            k: 0,
        }
    }

    /// Whole steps for a Cartesian displacement, carrying the remainder.
    ///
    /// Truncation can leave a plan up to one step short per axis; the
    /// shortfall stays in the residual and is paid out by the next plan.
    #[allow(clippy::cast_possible_truncation)]
    pub fn quantize(&mut self, d: Point) -> (i32, i32) {
        let (da, db) = to_axes(d);
        let a = da * self.steps_per_unit + self.residual.a;
        let b = db * self.steps_per_unit + self.residual.b;
        let (ia, ib) = (a.trunc(), b.trunc());
        self.residual = ResidualError {
            a: a - ia,
            b: b - ib,
        };
        (ia as i32, ib as i32)
    }

    /// Motor-step counts back to a Cartesian position.
    pub fn steps_to_point(&self, a: i64, b: i64) -> Point {
        #[allow(clippy::cast_precision_loss)]
        let (a, b) = (a as f64, b as f64);
        from_axes(a / self.steps_per_unit, b / self.steps_per_unit)
    }
}

/// Iterator over the step commands of one plan.
pub struct Ticks<'a> {
    synth: &'a mut StepSynthesizer,
    plan: &'a MotionPlan,
    k: u64,
}

impl Iterator for Ticks<'_> {
    type Item = StepCommand;

    fn next(&mut self) -> Option<StepCommand> {
        let dt = self.synth.tick_secs();
        let total = self.plan.duration();
        #[allow(clippy::cast_precision_loss)]
        let t0 = self.k as f64 * dt;
        if t0 >= total {
            return None;
        }
        let t1 = (t0 + dt).min(total);
        let d = self.plan.position(t1) - self.plan.position(t0);
        self.k += 1;
        let (delta_a, delta_b) = self.synth.quantize(d);
        Some(StepCommand {
            duration_ms: self.synth.timeslice_ms,
            delta_a,
            delta_b,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{KinematicLimits, plan};

    #[test]
    fn axes_round_trip() {
        let p = Point::new(1.25, -0.5);
        let (a, b) = to_axes(p);
        assert_eq!((a, b), (0.75, 1.75));
        assert_eq!(from_axes(a, b), p);
    }

    #[test]
    fn residual_carries_fractions() {
        let mut s = StepSynthesizer::new(2.0, 15);
        assert_eq!(s.quantize(Point::new(0.25, 0.0)), (0, 0));
        assert_eq!(s.residual(), ResidualError { a: 0.5, b: 0.5 });
        assert_eq!(s.quantize(Point::new(0.25, 0.0)), (1, 1));
        assert!(s.residual().a.abs() < 1e-12);
    }

    #[test]
    fn zero_duration_plan_emits_nothing() {
        let p = plan(&[Point::ORIGIN, Point::ORIGIN], KinematicLimits::default()).unwrap();
        let mut s = StepSynthesizer::new(1016.0, 15);
        assert_eq!(s.synthesize(&p).count(), 0);
        assert_eq!(s.tick_count(&p), 0);
    }

    #[test]
    fn every_tick_has_the_configured_duration() {
        let p = plan(&[Point::ORIGIN, Point::new(1.0, 0.0)], KinematicLimits::default()).unwrap();
        let mut s = StepSynthesizer::new(1016.0, 15);
        let n = s.tick_count(&p);
        let cmds: Vec<_> = s.synthesize(&p).collect();
        assert_eq!(cmds.len() as u64, n);
        assert!(cmds.iter().all(|c| c.duration_ms == 15));
        let a: i64 = cmds.iter().map(|c| i64::from(c.delta_a)).sum();
        assert!((a - 1016).abs() <= 1);
    }
}
