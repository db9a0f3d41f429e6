//! Motion controller: drives a transport with planned, quantized moves.
//!
//! Responsibilities:
//! - framing commands and checking every response for device errors
//! - pen raise/lower with settle delays carried by the `SP` command
//! - planning paths, streaming `XM` ticks, and waiting (bounded) for idle
//! - whole-drawing runs with pen-up travel between paths
//!
//! The step residual persists across every path of a session and is cleared
//! only by [`MotionController::begin_session`].

use eyre::WrapErr;
use plotter_traits::{Clock, Transport};

use crate::config::{PenSettings, StepperSettings, Timeouts};
use crate::error::{PlotterError, Result};
use crate::geometry::{Drawing, Point};
use crate::hw_error::map_hw_error;
use crate::planner::{MotionPlan, Planner};
use crate::protocol::{self, Command};
use crate::status::{ControllerState, PenState};
use crate::steps::{StepCommand, StepSynthesizer};
use crate::util;

pub struct MotionController<T: Transport> {
    pub(crate) transport: T,
    pub(crate) clock: Box<dyn Clock + Send + Sync>,
    pub(crate) planner: Planner,
    pub(crate) synth: StepSynthesizer,
    pub(crate) pen: PenSettings,
    pub(crate) stepper: StepperSettings,
    pub(crate) timeouts: Timeouts,
    pub(crate) state: ControllerState,
}

impl<T: Transport> core::fmt::Debug for MotionController<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotionController")
            .field("state", &self.state)
            .field("limits", &self.planner.limits())
            .field("residual", &self.synth.residual())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> MotionController<T> {
    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn pen_state(&self) -> Option<PenState> {
        self.state.pen()
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn synthesizer(&self) -> &StepSynthesizer {
        &self.synth
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Start a fresh session: clears the carried step fraction.
    pub fn begin_session(&mut self) {
        self.synth.reset();
        tracing::debug!("session started");
    }

    fn exchange(&mut self, cmd: Command) -> Result<Vec<String>> {
        let frame = cmd.frame();
        tracing::debug!(frame = %cmd, "tx");
        self.transport
            .write_frame(&frame)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err_with(|| format!("sending {}", cmd.name()))?;

        let mut lines = Vec::with_capacity(cmd.response_lines());
        for _ in 0..cmd.response_lines() {
            let line = self
                .transport
                .read_line()
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err_with(|| format!("waiting for {} response", cmd.name()))?;
            let line = line.trim().to_string();
            tracing::trace!(line = %line, "rx");
            if protocol::is_error_response(&line) {
                tracing::warn!(command = cmd.name(), response = %line, "device error");
                return Err(eyre::Report::new(PlotterError::Device {
                    command: cmd.name(),
                    response: line,
                }));
            }
            lines.push(line);
        }
        Ok(lines)
    }

    fn command(&mut self, cmd: Command) -> Result<String> {
        let mut lines = self.exchange(cmd)?;
        Ok(lines.swap_remove(0))
    }

    /// Firmware version banner.
    pub fn version(&mut self) -> Result<String> {
        self.command(Command::Version)
    }

    /// Push pen servo positions and slew rates to the board.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn configure(&mut self) -> Result<()> {
        let pen = self.pen.clone();
        let rate = |speed: f64| (speed * 5.0).trunc().max(0.0) as u32;
        for cmd in [
            Command::ServoConfig {
                channel: protocol::SERVO_PEN_UP,
                value: PenSettings::servo_value(pen.up_position),
            },
            Command::ServoConfig {
                channel: protocol::SERVO_PEN_DOWN,
                value: PenSettings::servo_value(pen.down_position),
            },
            Command::ServoConfig {
                channel: protocol::SERVO_SPEED_UP,
                value: rate(pen.up_speed),
            },
            Command::ServoConfig {
                channel: protocol::SERVO_SPEED_DOWN,
                value: rate(pen.down_speed),
            },
        ] {
            self.command(cmd)?;
        }
        tracing::info!(
            up = pen.up_position,
            down = pen.down_position,
            "pen servo configured"
        );
        Ok(())
    }

    pub fn enable_motors(&mut self) -> Result<()> {
        let mode = self.stepper.microstepping_mode;
        self.command(Command::EnableMotors {
            mode_a: mode,
            mode_b: mode,
        })?;
        tracing::info!(mode, "motors enabled");
        Ok(())
    }

    pub fn disable_motors(&mut self) -> Result<()> {
        self.command(Command::EnableMotors {
            mode_a: 0,
            mode_b: 0,
        })?;
        tracing::info!("motors disabled");
        Ok(())
    }

    /// True while any motor is moving or moves are still queued.
    pub fn motors_busy(&mut self) -> Result<bool> {
        let line = self.command(Command::QueryMotors)?;
        Ok(protocol::parse_motor_status(&line)?)
    }

    /// Poll until the board reports idle, bounded by the idle timeout.
    pub fn wait_idle(&mut self) -> Result<()> {
        let epoch = self.clock.now();
        loop {
            if !self.motors_busy()? {
                return Ok(());
            }
            let waited_ms = self.clock.ms_since(epoch);
            if waited_ms >= self.timeouts.idle_ms {
                tracing::error!(waited_ms, "motors never went idle");
                return Err(eyre::Report::new(PlotterError::IdleTimeout { waited_ms }));
            }
            self.clock.sleep(util::period_ms(self.timeouts.idle_poll_ms));
        }
    }

    /// Make the current position the origin.
    pub fn zero_position(&mut self) -> Result<()> {
        self.command(Command::ClearSteps)?;
        Ok(())
    }

    /// Position derived from the board's step counters.
    pub fn read_position(&mut self) -> Result<Point> {
        let lines = self.exchange(Command::QuerySteps)?;
        let (a, b) = protocol::parse_step_counts(&lines[0])?;
        Ok(self.synth.steps_to_point(a, b))
    }

    pub fn stepper_move(&mut self, step: StepCommand) -> Result<()> {
        self.command(Command::StepperMove(step))?;
        Ok(())
    }

    /// Raise the pen; the board holds its queue for the settle delay.
    pub fn pen_up(&mut self) -> Result<()> {
        let delay_ms = self.pen.raise_delay_ms();
        self.command(Command::SetPen {
            raised: true,
            delay_ms,
        })?;
        self.state = PenState::Up.into();
        tracing::debug!(delay_ms, "pen up");
        Ok(())
    }

    pub fn pen_down(&mut self) -> Result<()> {
        let delay_ms = self.pen.lower_delay_ms();
        self.command(Command::SetPen {
            raised: false,
            delay_ms,
        })?;
        self.state = PenState::Down.into();
        tracing::debug!(delay_ms, "pen down");
        Ok(())
    }

    /// Stream every tick of `plan`, then wait for the motors to finish.
    pub fn run_plan(&mut self, plan: &MotionPlan) -> Result<()> {
        if plan.is_empty() {
            return Ok(());
        }
        let ticks: Vec<StepCommand> = self.synth.synthesize(plan).collect();
        tracing::debug!(
            ticks = ticks.len(),
            duration_ms = util::secs_to_ms_ceil(plan.duration()),
            length = plan.length(),
            "running plan"
        );
        for step in ticks {
            self.stepper_move(step)?;
        }
        self.wait_idle()
    }

    /// Plan and run one polyline with the current pen state.
    pub fn run_path(&mut self, points: &[Point]) -> Result<()> {
        let plan = self.planner.plan(points)?;
        self.run_plan(&plan)
    }

    fn raise_if_down(&mut self) -> Result<()> {
        if self.state == ControllerState::PenDown {
            self.pen_up()?;
        }
        Ok(())
    }

    /// Relative pen-up move.
    pub fn move_by(&mut self, dx: f64, dy: f64) -> Result<()> {
        self.raise_if_down()?;
        self.run_path(&[Point::ORIGIN, Point::new(dx, dy)])
    }

    /// Absolute pen-up move from wherever the board reports it is.
    pub fn goto(&mut self, x: f64, y: f64) -> Result<()> {
        self.raise_if_down()?;
        let here = self.read_position()?;
        self.run_path(&[here, Point::new(x, y)])
    }

    pub fn home(&mut self) -> Result<()> {
        self.goto(0.0, 0.0)
    }

    /// Plans for every travel and drawing move of `drawing`, in run order.
    pub fn plan_drawing(&self, drawing: &Drawing) -> Result<Vec<MotionPlan>> {
        Ok(self.planner.plan_drawing(drawing)?)
    }

    /// Draw every path, travelling pen-up between them, and return to origin.
    pub fn run_drawing(&mut self, drawing: &Drawing) -> Result<()> {
        self.run_drawing_with(drawing, |_, _| true)
    }

    /// Like `run_drawing`, but asks `keep_going(index, total)` before each
    /// path. A `false` raises the pen and fails with `Interrupted`.
    pub fn run_drawing_with<F>(&mut self, drawing: &Drawing, mut keep_going: F) -> Result<()>
    where
        F: FnMut(usize, usize) -> bool,
    {
        let total = drawing.len();
        tracing::info!(
            paths = total,
            draw_length = drawing.draw_length(),
            travel_length = drawing.travel_length(),
            "drawing started"
        );
        self.pen_up()?;
        let mut position = Point::ORIGIN;
        for (index, path) in drawing.paths().iter().enumerate() {
            if !keep_going(index, total) {
                tracing::warn!(index, total, "drawing interrupted");
                self.pen_up()?;
                return Err(eyre::Report::new(PlotterError::Interrupted { index }));
            }
            self.run_path(&[position, path.first()])
                .wrap_err_with(|| format!("travel to path {index}"))?;
            self.pen_down()?;
            self.run_path(path)
                .wrap_err_with(|| format!("drawing path {index}"))?;
            self.pen_up()?;
            position = path.last();
            tracing::debug!(index, total, "path done");
        }
        self.run_path(&[position, Point::ORIGIN])
            .wrap_err("returning to origin")?;
        tracing::info!(paths = total, "drawing finished");
        Ok(())
    }
}

