//! Type-state builder for `Plotter` and generic `build_controller` constructor.
//!
//! The builder enforces at compile time that a transport is provided before
//! `build()` is available. `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;

use plotter_traits::Transport;
use plotter_traits::clock::{Clock, MonotonicClock};

use crate::config::{ControllerCfg, PenSettings, StepperSettings, Timeouts};
use crate::controller::MotionController;
use crate::error::{BuildError, Result};
use crate::planner::{KinematicLimits, Planner, Throttle};
use crate::status::ControllerState;
use crate::steps::StepSynthesizer;

/// Controller over a boxed transport, as built by [`PlotterBuilder`].
pub type Plotter = MotionController<Box<dyn Transport>>;

impl Plotter {
    pub fn builder() -> PlotterBuilder<Missing> {
        PlotterBuilder::default()
    }
}

pub struct Missing;
pub struct Set;

pub struct PlotterBuilder<T> {
    transport: Option<Box<dyn Transport>>,
    cfg: ControllerCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    _t: PhantomData<T>,
}

impl Default for PlotterBuilder<Missing> {
    fn default() -> Self {
        Self {
            transport: None,
            cfg: ControllerCfg::default(),
            clock: None,
            _t: PhantomData,
        }
    }
}

impl<T> PlotterBuilder<T> {
    pub fn with_config(mut self, cfg: ControllerCfg) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn with_limits(mut self, limits: KinematicLimits) -> Self {
        self.cfg.limits = limits;
        self
    }

    pub fn with_throttle(mut self, throttle: Option<Throttle>) -> Self {
        self.cfg.throttle = throttle;
        self
    }

    pub fn with_pen(mut self, pen: PenSettings) -> Self {
        self.cfg.pen = pen;
        self
    }

    pub fn with_stepper(mut self, stepper: StepperSettings) -> Self {
        self.cfg.stepper = stepper;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.cfg.timeouts = timeouts;
        self
    }

    /// Inject a clock (tests use `ManualClock`).
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn try_build(self) -> Result<Plotter> {
        let transport = self
            .transport
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTransport))?;
        build_controller(transport, self.cfg, self.clock)
    }
}

impl PlotterBuilder<Missing> {
    pub fn with_transport(self, transport: impl Transport + 'static) -> PlotterBuilder<Set> {
        PlotterBuilder {
            transport: Some(Box::new(transport)),
            cfg: self.cfg,
            clock: self.clock,
            _t: PhantomData,
        }
    }
}

impl PlotterBuilder<Set> {
    pub fn build(self) -> Result<Plotter> {
        self.try_build()
    }
}

/// Validate `cfg` and assemble a controller over any transport type.
pub fn build_controller<T: Transport>(
    transport: T,
    cfg: ControllerCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<MotionController<T>> {
    cfg.validate().map_err(eyre::Report::new)?;
    let ControllerCfg {
        limits,
        throttle,
        pen,
        stepper,
        timeouts,
    } = cfg;
    Ok(MotionController {
        transport,
        clock: clock.unwrap_or_else(|| Box::new(MonotonicClock::new())),
        planner: Planner::new(limits).with_throttle(throttle),
        synth: StepSynthesizer::new(stepper.steps_per_unit, stepper.timeslice_ms),
        pen,
        stepper,
        timeouts,
        state: ControllerState::Idle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::FailingTransport;

    #[test]
    fn try_build_without_transport_fails() {
        let err = Plotter::builder().try_build().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingTransport)
        ));
    }

    #[test]
    fn invalid_limits_rejected() {
        let err = Plotter::builder()
            .with_transport(FailingTransport)
            .with_limits(KinematicLimits {
                acceleration: 0.0,
                ..KinematicLimits::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("acceleration"));
    }

    #[test]
    fn builds_idle() {
        let p = Plotter::builder().with_transport(FailingTransport).build().unwrap();
        assert_eq!(p.state(), ControllerState::Idle);
    }
}
