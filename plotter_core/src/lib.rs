#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Hardware-agnostic motion pipeline for a two-axis pen plotter.
//!
//! All device I/O goes through the `plotter_traits::Transport` trait.
//!
//! ## Pipeline
//!
//! - **Geometry**: points, paths and drawings with page transforms (`geometry`)
//! - **Optimization**: simplify, reorder and join paths (`optimize`)
//! - **Planning**: constant-acceleration trapezoids with corner limits (`planner`)
//! - **Steps**: fixed-tick quantization with carried residual (`steps`)
//! - **Protocol**: command framing and response parsing (`protocol`)
//! - **Control**: pen, motors, idle waits and whole drawings (`controller`)
//!
//! ## Units
//!
//! Coordinates are plotting units (inches by default); speeds are units/s,
//! accelerations units/s². Motor axes follow `a = x + y`, `b = x - y`.

pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod geometry;
pub mod hw_error;
pub mod mocks;
pub mod optimize;
pub mod planner;
pub mod protocol;
pub mod status;
pub mod steps;
pub mod util;

pub use builder::{Missing, Plotter, PlotterBuilder, Set, build_controller};
pub use config::{ControllerCfg, PenSettings, StepperSettings, Timeouts};
pub use controller::MotionController;
pub use error::{BuildError, PlotterError, Report, Result};
pub use geometry::{Bounds, Drawing, Path, Point};
pub use planner::{KinematicLimits, MotionPlan, MotionState, Planner, Throttle, Throttler};
pub use status::{ControllerState, PenState};
pub use steps::{ResidualError, StepCommand, StepSynthesizer};
