//! Runtime settings used by `MotionController`.
//!
//! These are separate from the TOML-deserialized structs in `plotter_config`;
//! see `conversions` for the mapping.

use crate::error::BuildError;
use crate::planner::{KinematicLimits, Throttle};
use crate::steps::DEFAULT_TIMESLICE_MS;

/// Pen servo positions, slew speeds and extra settle delays.
#[derive(Debug, Clone, PartialEq)]
pub struct PenSettings {
    /// Percent of servo travel, 0..=100.
    pub up_position: f64,
    /// Percent of travel per second.
    pub up_speed: f64,
    /// Added to the computed raise delay; may be negative.
    pub up_delay_ms: i64,
    pub down_position: f64,
    pub down_speed: f64,
    pub down_delay_ms: i64,
}

impl Default for PenSettings {
    fn default() -> Self {
        Self {
            up_position: 60.0,
            up_speed: 150.0,
            up_delay_ms: 0,
            down_position: 50.0,
            down_speed: 150.0,
            down_delay_ms: 0,
        }
    }
}

impl PenSettings {
    /// Servo pulse value for a position percentage.
    pub fn servo_value(position: f64) -> u32 {
        plotter_config::PenCfg::servo_value(position)
    }

    fn settle_ms(&self, speed: f64, extra_ms: i64) -> u32 {
        let travel = (self.up_position - self.down_position).abs();
        #[allow(clippy::cast_possible_truncation)]
        let slew = (1000.0 * travel / speed) as i64;
        u32::try_from((slew + extra_ms).max(0)).unwrap_or(u32::MAX)
    }

    /// Delay the board holds after a raise, ms.
    pub fn raise_delay_ms(&self) -> u32 {
        self.settle_ms(self.up_speed, self.up_delay_ms)
    }

    /// Delay the board holds after a lower, ms.
    pub fn lower_delay_ms(&self) -> u32 {
        self.settle_ms(self.down_speed, self.down_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepperSettings {
    pub steps_per_unit: f64,
    /// Value sent with `EM`; 1 is 16x microstepping, 5 is full steps.
    pub microstepping_mode: u8,
    pub timeslice_ms: u32,
}

impl Default for StepperSettings {
    fn default() -> Self {
        Self {
            steps_per_unit: plotter_config::STEPS_PER_INCH_MODE1 / 2.0,
            microstepping_mode: 2,
            timeslice_ms: DEFAULT_TIMESLICE_MS,
        }
    }
}

/// Idle-wait bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    pub idle_ms: u64,
    pub idle_poll_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            idle_ms: 10_000,
            idle_poll_ms: 10,
        }
    }
}

/// Everything the controller needs besides a transport and a clock.
#[derive(Debug, Clone, Default)]
pub struct ControllerCfg {
    pub limits: KinematicLimits,
    pub throttle: Option<Throttle>,
    pub pen: PenSettings,
    pub stepper: StepperSettings,
    pub timeouts: Timeouts,
}

impl ControllerCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        self.limits
            .validate()
            .map_err(|e| BuildError::InvalidConfig(e.to_string()))?;
        if let Some(th) = self.throttle
            && !(th.timeslice_s > 0.0 && th.threshold >= 0.0)
        {
            return Err(BuildError::InvalidConfig(
                "throttle timeslice must be > 0 and threshold >= 0".into(),
            ));
        }
        let pct = |v: f64| (0.0..=100.0).contains(&v);
        if !pct(self.pen.up_position) || !pct(self.pen.down_position) {
            return Err(BuildError::InvalidConfig(
                "pen positions must be in [0, 100]".into(),
            ));
        }
        if !(self.pen.up_speed > 0.0 && self.pen.down_speed > 0.0) {
            return Err(BuildError::InvalidConfig("pen speeds must be > 0".into()));
        }
        if !(self.stepper.steps_per_unit.is_finite() && self.stepper.steps_per_unit > 0.0) {
            return Err(BuildError::InvalidConfig(
                "steps_per_unit must be > 0".into(),
            ));
        }
        if !(1..=5).contains(&self.stepper.microstepping_mode) {
            return Err(BuildError::InvalidConfig(
                "microstepping_mode must be in [1, 5]".into(),
            ));
        }
        if self.stepper.timeslice_ms == 0 {
            return Err(BuildError::InvalidConfig("timeslice_ms must be >= 1".into()));
        }
        if self.timeouts.idle_ms == 0 {
            return Err(BuildError::InvalidConfig("idle timeout must be >= 1 ms".into()));
        }
        Ok(())
    }
}
