//! `From` implementations bridging `plotter_config` types to `plotter_core` types.

use crate::config::{ControllerCfg, PenSettings, StepperSettings, Timeouts};
use crate::planner::{KinematicLimits, Throttle};

impl From<&plotter_config::MotionCfg> for KinematicLimits {
    fn from(c: &plotter_config::MotionCfg) -> Self {
        Self {
            acceleration: c.acceleration,
            max_velocity: c.max_velocity,
            corner_factor: c.corner_factor,
        }
    }
}

impl From<&plotter_config::PenCfg> for PenSettings {
    fn from(c: &plotter_config::PenCfg) -> Self {
        Self {
            up_position: c.up_position,
            up_speed: c.up_speed,
            up_delay_ms: c.up_delay_ms,
            down_position: c.down_position,
            down_speed: c.down_speed,
            down_delay_ms: c.down_delay_ms,
        }
    }
}

impl From<&plotter_config::StepperCfg> for StepperSettings {
    fn from(c: &plotter_config::StepperCfg) -> Self {
        Self {
            steps_per_unit: c.resolved_steps_per_unit(),
            microstepping_mode: c.microstepping_mode,
            timeslice_ms: c.timeslice_ms,
        }
    }
}

impl From<&plotter_config::Timeouts> for Timeouts {
    fn from(c: &plotter_config::Timeouts) -> Self {
        Self {
            idle_ms: c.idle_ms,
            idle_poll_ms: c.idle_poll_ms,
        }
    }
}

/// `None` when throttling is disabled.
pub fn throttle_from(c: &plotter_config::ThrottleCfg) -> Option<Throttle> {
    c.enabled.then_some(Throttle {
        timeslice_s: c.timeslice_s,
        threshold: c.threshold,
    })
}

impl From<&plotter_config::Config> for ControllerCfg {
    fn from(c: &plotter_config::Config) -> Self {
        Self {
            limits: (&c.motion).into(),
            throttle: throttle_from(&c.throttle),
            pen: (&c.pen).into(),
            stepper: (&c.stepper).into(),
            timeouts: (&c.timeouts).into(),
        }
    }
}
