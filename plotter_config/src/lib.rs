#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and drawing input parsing for the plotter.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Unknown keys are rejected at load time.
//! - The drawing CSV loader enforces headers and groups rows into paths.
use serde::Deserialize;
use std::collections::HashMap;

/// Full-step resolution of the drive, per inch, at microstepping mode 1.
pub const STEPS_PER_INCH_MODE1: f64 = 2032.0;
/// Full-step resolution of the drive, per millimetre, at microstepping mode 1.
pub const STEPS_PER_MM_MODE1: f64 = 80.0;

/// Servo pulse range that pen positions (0..=100) map into.
pub const SERVO_MIN: u32 = 7500;
pub const SERVO_MAX: u32 = 28000;

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct MotionCfg {
    /// Path acceleration in units/s²
    pub acceleration: f64,
    /// Cruise velocity cap in units/s
    pub max_velocity: f64,
    /// Junction deviation factor; 0 stops at every vertex
    pub corner_factor: f64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            acceleration: 8.0,
            max_velocity: 2.0,
            corner_factor: 0.005,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct PenCfg {
    /// Raised servo position, 0..=100
    pub up_position: f64,
    /// Servo speed while raising (position units per second)
    pub up_speed: f64,
    /// Extra settle after raising, may be negative to shorten the computed wait
    pub up_delay_ms: i64,
    pub down_position: f64,
    pub down_speed: f64,
    pub down_delay_ms: i64,
}

impl Default for PenCfg {
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

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Inches,
    Mm,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct StepperCfg {
    /// Plotting units for drawings and kinematic limits
    pub units: Units,
    /// Controller microstepping mode: 1 = 1/16 step ... 5 = full step
    pub microstepping_mode: u8,
    /// Explicit steps per unit; derived from `units` and mode when absent
    pub steps_per_unit: Option<f64>,
    /// Step command cadence in milliseconds
    pub timeslice_ms: u32,
}

impl Default for StepperCfg {
    fn default() -> Self {
        Self {
            units: Units::Inches,
            microstepping_mode: 2,
            steps_per_unit: None,
            timeslice_ms: 15,
        }
    }
}

impl StepperCfg {
    /// Steps per plotting unit after microstepping division.
    pub fn resolved_steps_per_unit(&self) -> f64 {
        if let Some(v) = self.steps_per_unit {
            return v;
        }
        let divider = f64::from(1u32 << self.microstepping_mode.clamp(1, 5).saturating_sub(1));
        match self.units {
            Units::Inches => STEPS_PER_INCH_MODE1 / divider,
            Units::Mm => STEPS_PER_MM_MODE1 / divider,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct ThrottleCfg {
    /// Cap vertex speeds so one device timeslice does not cut corners
    pub enabled: bool,
    /// Timeslice length assumed by the throttler (s)
    pub timeslice_s: f64,
    /// Largest tolerated deviation of a skipped vertex from the chord (units)
    pub threshold: f64,
}

impl Default for ThrottleCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            timeslice_s: 0.02,
            threshold: 0.001,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    /// Upper bound on the motor-idle poll after a plan (ms)
    pub idle_ms: u64,
    /// Interval between motor status polls (ms)
    pub idle_poll_ms: u64,
    /// Per-line serial read timeout (ms)
    pub serial_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            idle_ms: 10_000,
            idle_poll_ms: 10,
            serial_ms: 1_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct SerialCfg {
    /// Explicit device path; discovered by USB ids when absent
    pub port: Option<String>,
    pub baud: u32,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            port: None,
            baud: 9600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizeCfg {
    /// Douglas-Peucker tolerance in units; 0 only drops exactly collinear points
    pub simplify_tolerance: f64,
    /// Greedy reorder to shorten pen-up travel
    pub sort: bool,
    /// Allow paths to be drawn backwards when sorting
    pub reversable: bool,
    /// Merge consecutive paths whose gap is within this distance; 0 merges only touching ends
    pub join_tolerance: f64,
}

impl Default for OptimizeCfg {
    fn default() -> Self {
        Self {
            simplify_tolerance: 0.0,
            sort: true,
            reversable: true,
            join_tolerance: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub motion: MotionCfg,
    pub pen: PenCfg,
    pub stepper: StepperCfg,
    pub throttle: ThrottleCfg,
    pub timeouts: Timeouts,
    pub serial: SerialCfg,
    pub optimize: OptimizeCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl PenCfg {
    /// Map a 0..=100 position onto the servo pulse range, truncating.
    pub fn servo_value(position: f64) -> u32 {
        let frac = (position / 100.0).clamp(0.0, 1.0);
        (f64::from(SERVO_MIN) + f64::from(SERVO_MAX - SERVO_MIN) * frac).trunc() as u32
    }
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Motion
        let m = &self.motion;
        if !(m.acceleration.is_finite() && m.acceleration > 0.0) {
            eyre::bail!("motion.acceleration must be > 0");
        }
        if !(m.max_velocity.is_finite() && m.max_velocity > 0.0) {
            eyre::bail!("motion.max_velocity must be > 0");
        }
        if !(m.corner_factor.is_finite() && m.corner_factor >= 0.0) {
            eyre::bail!("motion.corner_factor must be >= 0");
        }

        // Pen
        let p = &self.pen;
        for (key, pos) in [("pen.up_position", p.up_position), ("pen.down_position", p.down_position)] {
            if !(0.0..=100.0).contains(&pos) {
                eyre::bail!("{key} must be in [0, 100]");
            }
        }
        for (key, speed) in [("pen.up_speed", p.up_speed), ("pen.down_speed", p.down_speed)] {
            if !(speed.is_finite() && speed > 0.0) {
                eyre::bail!("{key} must be > 0");
            }
        }
        if p.up_delay_ms.abs() > 60_000 || p.down_delay_ms.abs() > 60_000 {
            eyre::bail!("pen delays are unreasonably large (>60s)");
        }

        // Stepper
        let s = &self.stepper;
        if !(1..=5).contains(&s.microstepping_mode) {
            eyre::bail!("stepper.microstepping_mode must be in [1, 5]");
        }
        if let Some(spu) = s.steps_per_unit
            && !(spu.is_finite() && spu > 0.0)
        {
            eyre::bail!("stepper.steps_per_unit must be > 0");
        }
        if s.timeslice_ms == 0 {
            eyre::bail!("stepper.timeslice_ms must be >= 1");
        }

        // Throttle
        if self.throttle.enabled {
            if !(self.throttle.timeslice_s.is_finite() && self.throttle.timeslice_s > 0.0) {
                eyre::bail!("throttle.timeslice_s must be > 0");
            }
            if !(self.throttle.threshold.is_finite() && self.throttle.threshold >= 0.0) {
                eyre::bail!("throttle.threshold must be >= 0");
            }
        }

        // Timeouts
        if self.timeouts.idle_ms == 0 {
            eyre::bail!("timeouts.idle_ms must be >= 1");
        }
        if self.timeouts.idle_poll_ms == 0 {
            eyre::bail!("timeouts.idle_poll_ms must be >= 1");
        }
        if self.timeouts.serial_ms == 0 {
            eyre::bail!("timeouts.serial_ms must be >= 1");
        }

        // Optimize
        let o = &self.optimize;
        if !(o.simplify_tolerance.is_finite() && o.simplify_tolerance >= 0.0) {
            eyre::bail!("optimize.simplify_tolerance must be >= 0");
        }
        if !(o.join_tolerance.is_finite() && o.join_tolerance >= 0.0) {
            eyre::bail!("optimize.join_tolerance must be >= 0");
        }

        Ok(())
    }
}

/// Drawing CSV schema.
///
/// Expected headers:
/// path,x,y
///
/// Rows sharing a `path` id form one polyline in row order; paths are
/// returned in order of first appearance.
///
/// Example:
/// path,x,y
/// 0,0.0,0.0
/// 0,1.0,0.0
/// 1,2.0,2.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PointRow {
    pub path: u64,
    pub x: f64,
    pub y: f64,
}

/// Parse drawing CSV from any reader into ordered lists of (x, y) pairs.
pub fn parse_drawing_csv(input: impl std::io::Read) -> eyre::Result<Vec<Vec<(f64, f64)>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers: {}", e))?
        .clone();
    let expected = ["path", "x", "y"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "drawing CSV must have headers 'path,x,y', got: {}",
            actual.join(",")
        );
    }

    let mut slots: HashMap<u64, usize> = HashMap::new();
    let mut paths: Vec<Vec<(f64, f64)>> = Vec::new();
    for (idx, rec) in rdr.deserialize::<PointRow>().enumerate() {
        let row = match rec {
            Ok(row) => row,
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        };
        if !(row.x.is_finite() && row.y.is_finite()) {
            eyre::bail!("invalid CSV row {}: coordinates must be finite", idx + 2);
        }
        let slot = *slots.entry(row.path).or_insert_with(|| {
            paths.push(Vec::new());
            paths.len() - 1
        });
        paths[slot].push((row.x, row.y));
    }
    Ok(paths)
}

pub fn load_drawing_csv(path: &std::path::Path) -> eyre::Result<Vec<Vec<(f64, f64)>>> {
    let file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("open drawing CSV {:?}: {}", path, e))?;
    parse_drawing_csv(file).map_err(|e| eyre::eyre!("{:?}: {}", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_per_unit_follows_microstepping() {
        let mut s = StepperCfg::default();
        assert_eq!(s.resolved_steps_per_unit(), 1016.0);
        s.microstepping_mode = 1;
        assert_eq!(s.resolved_steps_per_unit(), 2032.0);
        s.units = Units::Mm;
        s.microstepping_mode = 3;
        assert_eq!(s.resolved_steps_per_unit(), 20.0);
        s.steps_per_unit = Some(123.0);
        assert_eq!(s.resolved_steps_per_unit(), 123.0);
    }

    #[test]
    fn servo_value_maps_percent_linearly() {
        assert_eq!(PenCfg::servo_value(0.0), SERVO_MIN);
        assert_eq!(PenCfg::servo_value(100.0), SERVO_MAX);
        assert_eq!(PenCfg::servo_value(60.0), 19800);
        assert_eq!(PenCfg::servo_value(50.0), 17750);
    }

    #[test]
    fn servo_value_truncates_fractional_pulse() {
        // 7500 + 20500 * 0.333 = 14326.5
        assert_eq!(PenCfg::servo_value(33.3), 14326);
        // 7500 + 20500 * 0.005 = 7602.5
        assert_eq!(PenCfg::servo_value(0.5), 7602);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = load_toml("").expect("empty config parses");
        cfg.validate().expect("defaults are valid");
        assert_eq!(cfg.motion.acceleration, 8.0);
        assert_eq!(cfg.stepper.timeslice_ms, 15);
    }
}
