//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Idle timeout in effect for the current run (for JSON details).
pub static LAST_IDLE_MS: OnceLock<u64> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "plotter", version, about = "Pen plotter CLI")]
pub struct Cli {
    /// Path to config TOML (typed); built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Serial device path; discovered by USB id when omitted
    #[cfg(feature = "hardware")]
    #[arg(long, value_name = "PATH")]
    pub port: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Overrides for the `[optimize]` config section.
#[derive(Args, Debug, Clone)]
pub struct OptimizeArgs {
    /// Drawing CSV with headers path,x,y
    #[arg(value_name = "DRAWING")]
    pub drawing: PathBuf,

    /// Simplification tolerance in plotting units
    #[arg(long, value_name = "UNITS")]
    pub simplify: Option<f64>,

    /// Keep the drawing's path order
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_sort: bool,

    /// Join consecutive paths whose gap is within this distance
    #[arg(long, value_name = "UNITS")]
    pub join: Option<f64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum PenPosition {
    Up,
    Down,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MotorSwitch {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plot a drawing, travelling pen-up between paths and returning home
    Plot(OptimizeArgs),
    /// Estimate plot time and travel without touching the device
    Plan(OptimizeArgs),
    /// Raise or lower the pen
    Pen {
        #[arg(value_enum)]
        position: PenPosition,
    },
    /// Relative pen-up move
    Move {
        #[arg(allow_negative_numbers = true)]
        dx: f64,
        #[arg(allow_negative_numbers = true)]
        dy: f64,
    },
    /// Absolute pen-up move
    Goto {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    /// Pen-up move back to the origin
    Home,
    /// Make the current position the origin
    Zero,
    /// Energize or release the stepper motors
    Motors {
        #[arg(value_enum)]
        state: MotorSwitch,
    },
    /// Print the controller firmware version
    Version,
    /// Quick health check (device reachable / sim ok)
    SelfCheck,
}
