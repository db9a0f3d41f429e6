//! Controller-board command framing and response parsing.
//!
//! Every command is an ASCII line of comma-separated fields terminated by
//! `\r`. Responses are one line (two for `QS`); a line starting with `!` is a
//! device-side error.

use std::fmt;

use crate::error::PlotterError;
use crate::steps::StepCommand;

/// Servo channel holding the pen-up position.
pub const SERVO_PEN_UP: u8 = 4;
/// Servo channel holding the pen-down position.
pub const SERVO_PEN_DOWN: u8 = 5;
/// Servo slew rate used when raising.
pub const SERVO_SPEED_UP: u8 = 11;
/// Servo slew rate used when lowering.
pub const SERVO_SPEED_DOWN: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Version,
    EnableMotors { mode_a: u8, mode_b: u8 },
    QueryMotors,
    ClearSteps,
    QuerySteps,
    StepperMove(StepCommand),
    SetPen { raised: bool, delay_ms: u32 },
    ServoConfig { channel: u8, value: u32 },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Version => "V",
            Command::EnableMotors { .. } => "EM",
            Command::QueryMotors => "QM",
            Command::ClearSteps => "CS",
            Command::QuerySteps => "QS",
            Command::StepperMove(_) => "XM",
            Command::SetPen { .. } => "SP",
            Command::ServoConfig { .. } => "SC",
        }
    }

    /// Wire form including the `\r` terminator.
    pub fn frame(&self) -> String {
        format!("{self}\r")
    }

    /// Number of response lines the board sends back.
    pub fn response_lines(&self) -> usize {
        match self {
            Command::QuerySteps => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Command::EnableMotors { mode_a, mode_b } => write!(f, "EM,{mode_a},{mode_b}"),
            Command::StepperMove(StepCommand {
                duration_ms,
                delta_a,
                delta_b,
            }) => write!(f, "XM,{duration_ms},{delta_a},{delta_b}"),
            Command::SetPen { raised, delay_ms } => {
                write!(f, "SP,{},{delay_ms}", u8::from(raised))
            }
            Command::ServoConfig { channel, value } => write!(f, "SC,{channel},{value}"),
            _ => f.write_str(self.name()),
        }
    }
}

/// True when a response line is a device error report.
pub fn is_error_response(line: &str) -> bool {
    line.starts_with('!')
}

/// Parse a `QM` status line; returns whether any motor or the queue is busy.
pub fn parse_motor_status(line: &str) -> Result<bool, PlotterError> {
    let malformed = || PlotterError::Protocol {
        command: "QM",
        response: line.to_string(),
    };
    let mut fields = line.trim().split(',');
    if fields.next() != Some("QM") {
        return Err(malformed());
    }
    let flags = fields
        .map(|f| f.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;
    if flags.is_empty() {
        return Err(malformed());
    }
    Ok(flags.iter().any(|&f| f != 0))
}

/// Parse the first `QS` line, `"<a>,<b>"`, into motor step counts.
pub fn parse_step_counts(line: &str) -> Result<(i64, i64), PlotterError> {
    let malformed = || PlotterError::Protocol {
        command: "QS",
        response: line.to_string(),
    };
    let (a, b) = line.trim().split_once(',').ok_or_else(malformed)?;
    let a = a.trim().parse().map_err(|_| malformed())?;
    let b = b.trim().parse().map_err(|_| malformed())?;
    Ok((a, b))
}
