//! Command execution: config mapping, transport assembly, and plot runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::{Result, WrapErr};
use plotter_config::Config;
use plotter_core::{ControllerCfg, Drawing, Plotter, StepSynthesizer};
use plotter_traits::Transport;
use serde_json::json;

use crate::cli::{Commands, LAST_IDLE_MS, MotorSwitch, OptimizeArgs, PenPosition};

/// Open the serial link to the board, by explicit path or USB discovery.
#[cfg(feature = "hardware")]
pub fn open_transport(cfg: &Config, port: Option<&str>) -> Result<Box<dyn Transport>> {
    use plotter_hardware::serial::SerialTransport;
    let timeout = std::time::Duration::from_millis(cfg.timeouts.serial_ms);
    let baud = cfg.serial.baud;
    let link = match port.or(cfg.serial.port.as_deref()) {
        Some(path) => SerialTransport::open(path, baud, timeout)
            .wrap_err_with(|| format!("opening {path}"))?,
        None => SerialTransport::discover(baud, timeout).wrap_err("discovering plotter")?,
    };
    tracing::info!(port = link.name(), baud, "plotter connected");
    Ok(Box::new(link))
}

/// Simulated board; `PLOTTER_TEST_SIM_STUCK=1` keeps it busy forever.
#[cfg(not(feature = "hardware"))]
pub fn open_transport(_cfg: &Config, _port: Option<&str>) -> Result<Box<dyn Transport>> {
    let sim = plotter_hardware::SimulatedPlotter::new();
    if std::env::var("PLOTTER_TEST_SIM_STUCK").as_deref() == Ok("1") {
        tracing::warn!("simulator forced busy");
        sim.handle().set_stuck(true);
    }
    Ok(Box::new(sim))
}

fn connect(cfg: &Config, port: Option<&str>) -> Result<Plotter> {
    let transport = open_transport(cfg, port)?;
    let ccfg = ControllerCfg::from(cfg);
    let _ = LAST_IDLE_MS.set(ccfg.timeouts.idle_ms);
    let mut plotter = Plotter::builder()
        .with_config(ccfg)
        .with_transport(transport)
        .build()?;
    plotter.begin_session();
    Ok(plotter)
}

/// Load a drawing CSV and run the optimizers, CLI flags taking precedence
/// over the `[optimize]` section.
pub fn load_drawing(args: &OptimizeArgs, cfg: &Config) -> Result<Drawing> {
    let opt = &cfg.optimize;
    let simplify = args.simplify.unwrap_or(opt.simplify_tolerance);
    let join = args.join.unwrap_or(opt.join_tolerance);
    if !(simplify.is_finite() && simplify >= 0.0) {
        eyre::bail!("--simplify must be >= 0");
    }
    if !(join.is_finite() && join >= 0.0) {
        eyre::bail!("--join must be >= 0");
    }

    let raw = plotter_config::load_drawing_csv(&args.drawing)?;
    let drawing = Drawing::try_from(raw)
        .wrap_err_with(|| format!("loading {}", args.drawing.display()))?;
    let points_in: usize = drawing.paths().iter().map(|p| p.len()).sum();

    let mut drawing = drawing.simplify(simplify);
    if opt.sort && !args.no_sort {
        drawing = drawing.sort(opt.reversable);
    }
    let drawing = drawing.join(join);
    let points_out: usize = drawing.paths().iter().map(|p| p.len()).sum();
    tracing::info!(
        paths = drawing.len(),
        points_in,
        points_out,
        simplify,
        join,
        "drawing optimized"
    );
    Ok(drawing)
}

/// Planned totals for a drawing, without touching the device.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSummary {
    pub paths: usize,
    pub draw_length: f64,
    pub travel_length: f64,
    pub motion_s: f64,
    pub pen_s: f64,
    pub ticks: u64,
}

impl PlanSummary {
    pub fn total_s(&self) -> f64 {
        self.motion_s + self.pen_s
    }
}

pub fn summarize(drawing: &Drawing, cfg: &Config) -> Result<PlanSummary> {
    let ccfg = ControllerCfg::from(cfg);
    ccfg.validate()?;
    let planner = plotter_core::Planner::new(ccfg.limits).with_throttle(ccfg.throttle);
    let plans = planner.plan_drawing(drawing)?;
    let synth = StepSynthesizer::new(ccfg.stepper.steps_per_unit, ccfg.stepper.timeslice_ms);
    let motion_s = plans.iter().map(plotter_core::MotionPlan::duration).sum();
    let ticks = plans.iter().map(|p| synth.tick_count(p)).sum();
    // One raise up front, then a lower and a raise per path.
    #[allow(clippy::cast_possible_truncation)]
    let pen_ms = u64::from(ccfg.pen.raise_delay_ms())
        + drawing.len() as u64
            * (u64::from(ccfg.pen.raise_delay_ms()) + u64::from(ccfg.pen.lower_delay_ms()));
    #[allow(clippy::cast_precision_loss)]
    let pen_s = pen_ms as f64 / 1000.0;
    Ok(PlanSummary {
        paths: drawing.len(),
        draw_length: drawing.draw_length(),
        travel_length: drawing.travel_length(),
        motion_s,
        pen_s,
        ticks,
    })
}

fn print_summary(s: &PlanSummary, json_mode: bool) {
    if json_mode {
        println!(
            "{}",
            json!({
                "paths": s.paths,
                "draw_length": s.draw_length,
                "travel_length": s.travel_length,
                "motion_s": s.motion_s,
                "pen_s": s.pen_s,
                "estimated_s": s.total_s(),
                "ticks": s.ticks,
            })
        );
    } else {
        println!("paths: {}", s.paths);
        println!("draw length: {:.3}", s.draw_length);
        println!("travel length: {:.3}", s.travel_length);
        println!("estimated time: {:.1} s", s.total_s());
    }
}

fn done(json_mode: bool, what: &str) {
    if json_mode {
        println!("{}", json!({ "status": "ok", "command": what }));
    } else {
        println!("ok");
    }
}

pub fn plot(
    args: &OptimizeArgs,
    cfg: &Config,
    port: Option<&str>,
    json_mode: bool,
    shutdown: &Arc<AtomicBool>,
) -> Result<()> {
    plot_with(args, cfg, json_mode, shutdown, || connect(cfg, port))
}

/// The device is opened before the drawing is loaded or planned.
fn plot_with<F>(
    args: &OptimizeArgs,
    cfg: &Config,
    json_mode: bool,
    shutdown: &Arc<AtomicBool>,
    open: F,
) -> Result<()>
where
    F: FnOnce() -> Result<Plotter>,
{
    let mut plotter = open()?;
    let drawing = load_drawing(args, cfg)?;
    let summary = summarize(&drawing, cfg)?;
    plotter.configure()?;
    plotter.enable_motors()?;
    let started = std::time::Instant::now();
    plotter.run_drawing_with(&drawing, |index, total| {
        tracing::info!(index, total, "path start");
        !shutdown.load(Ordering::Relaxed)
    })?;
    let elapsed_s = started.elapsed().as_secs_f64();
    if json_mode {
        println!(
            "{}",
            json!({
                "status": "complete",
                "paths": summary.paths,
                "draw_length": summary.draw_length,
                "travel_length": summary.travel_length,
                "elapsed_s": elapsed_s,
            })
        );
    } else {
        println!(
            "plot complete: {} paths, draw {:.3}, travel {:.3}",
            summary.paths, summary.draw_length, summary.travel_length
        );
    }
    Ok(())
}

/// Run one subcommand against the configured transport.
pub fn dispatch(
    cmd: &Commands,
    cfg: &Config,
    port: Option<&str>,
    json_mode: bool,
    shutdown: &Arc<AtomicBool>,
) -> Result<()> {
    match cmd {
        Commands::Plot(args) => plot(args, cfg, port, json_mode, shutdown),
        Commands::Plan(args) => {
            let drawing = load_drawing(args, cfg)?;
            print_summary(&summarize(&drawing, cfg)?, json_mode);
            Ok(())
        }
        Commands::Pen { position } => {
            let mut p = connect(cfg, port)?;
            p.configure()?;
            match position {
                PenPosition::Up => p.pen_up()?,
                PenPosition::Down => p.pen_down()?,
            }
            done(json_mode, "pen");
            Ok(())
        }
        Commands::Move { dx, dy } => {
            let mut p = connect(cfg, port)?;
            p.enable_motors()?;
            p.move_by(*dx, *dy)
                .wrap_err_with(|| format!("moving by ({dx}, {dy})"))?;
            done(json_mode, "move");
            Ok(())
        }
        Commands::Goto { x, y } => {
            let mut p = connect(cfg, port)?;
            p.enable_motors()?;
            p.goto(*x, *y)
                .wrap_err_with(|| format!("moving to ({x}, {y})"))?;
            done(json_mode, "goto");
            Ok(())
        }
        Commands::Home => {
            let mut p = connect(cfg, port)?;
            p.enable_motors()?;
            p.home().wrap_err("returning home")?;
            done(json_mode, "home");
            Ok(())
        }
        Commands::Zero => {
            connect(cfg, port)?.zero_position()?;
            done(json_mode, "zero");
            Ok(())
        }
        Commands::Motors { state } => {
            let mut p = connect(cfg, port)?;
            match state {
                MotorSwitch::On => p.enable_motors()?,
                MotorSwitch::Off => p.disable_motors()?,
            }
            done(json_mode, "motors");
            Ok(())
        }
        Commands::Version => {
            let version = connect(cfg, port)?.version()?;
            if json_mode {
                println!("{}", json!({ "version": version }));
            } else {
                println!("{version}");
            }
            Ok(())
        }
        Commands::SelfCheck => {
            let mut p = connect(cfg, port)?;
            let version = p.version().wrap_err("querying version")?;
            let busy = p.motors_busy().wrap_err("querying motor status")?;
            if json_mode {
                println!("{}", json!({ "status": "ok", "version": version, "busy": busy }));
            } else {
                println!("ok ({version})");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(path: &std::path::Path) -> OptimizeArgs {
        OptimizeArgs {
            drawing: path.to_path_buf(),
            simplify: None,
            no_sort: false,
            join: None,
        }
    }

    #[test]
    fn cli_join_override_merges_near_paths() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "path,x,y\n0,0,0\n0,1,0\n1,1.25,0\n1,1.25,1").unwrap();
        let cfg = Config::default();
        let mut args = args_for(f.path());
        assert_eq!(load_drawing(&args, &cfg).unwrap().len(), 2);
        args.join = Some(0.5);
        let joined = load_drawing(&args, &cfg).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.paths()[0].len(), 4);
    }

    #[test]
    fn negative_overrides_are_rejected() {
        let cfg = Config::default();
        let mut args = args_for(std::path::Path::new("unused.csv"));
        args.simplify = Some(-1.0);
        let err = load_drawing(&args, &cfg).unwrap_err();
        assert!(err.to_string().contains("--simplify"));
    }

    #[test]
    fn plot_fails_on_missing_device_before_reading_drawing() {
        let cfg = Config::default();
        let args = args_for(std::path::Path::new("does-not-exist.csv"));
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut opened = false;
        let err = plot_with(&args, &cfg, false, &shutdown, || {
            opened = true;
            Err(eyre::Report::new(plotter_hardware::error::HwError::NotFound))
        })
        .unwrap_err();
        assert!(opened);
        assert!(format!("{err:#}").contains("no plotter found"));
        assert!(!format!("{err:#}").contains("does-not-exist.csv"));
    }

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn plot_runs_drawing_on_opened_device() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "path,x,y\n0,0,0\n0,0.5,0").unwrap();
        let cfg = Config::default();
        let shutdown = Arc::new(AtomicBool::new(false));
        plot_with(&args_for(f.path()), &cfg, true, &shutdown, || connect(&cfg, None)).unwrap();
    }

    #[test]
    fn summary_counts_pen_settles() {
        let d = Drawing::try_from(vec![vec![(0.0, 0.0), (1.0, 0.0)]]).unwrap();
        let s = summarize(&d, &Config::default()).unwrap();
        assert_eq!(s.paths, 1);
        assert!((s.draw_length - 1.0).abs() < 1e-12);
        assert!((s.pen_s - 0.198).abs() < 1e-9);
        assert!(s.motion_s > 0.0 && s.ticks > 0);
    }
}
