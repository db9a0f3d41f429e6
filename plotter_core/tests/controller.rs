use plotter_core::mocks::{FailingTransport, SilentTransport};
use plotter_core::{
    ControllerCfg, ControllerState, Drawing, MotionController, PlotterError, Point,
    StepperSettings, Timeouts, build_controller,
};
use plotter_hardware::{SIM_VERSION, SimHandle, SimulatedPlotter};
use plotter_traits::{ManualClock, Transport};
use rstest::rstest;

fn cfg() -> ControllerCfg {
    ControllerCfg {
        throttle: None,
        ..ControllerCfg::default()
    }
}

fn sim_controller(cfg: ControllerCfg) -> (MotionController<SimulatedPlotter>, SimHandle, ManualClock) {
    let sim = SimulatedPlotter::new();
    let handle = sim.handle();
    let clock = ManualClock::new();
    let c = build_controller(sim, cfg, Some(Box::new(clock.clone()))).unwrap();
    (c, handle, clock)
}

fn plotter_error(err: &eyre::Report) -> &PlotterError {
    err.downcast_ref::<PlotterError>()
        .unwrap_or_else(|| panic!("not a PlotterError: {err:?}"))
}

fn position(handle: &SimHandle, spu: f64) -> Point {
    let (a, b) = handle.steps();
    plotter_core::steps::from_axes(a as f64 / spu, b as f64 / spu)
}

#[test]
fn right_angle_path_reaches_its_end() {
    let (mut c, handle, _clock) = sim_controller(cfg());
    c.begin_session();
    let path = [Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)];
    let plan = c.planner().plan(&path).unwrap();
    c.run_path(&path).unwrap();

    let spu = c.synthesizer().steps_per_unit();
    assert_eq!(spu, 1016.0);
    let end = position(&handle, spu);
    assert!(end.distance(Point::new(1.0, 1.0)) <= 1.5 / spu, "ended at {end:?}");
    assert!(handle.moved_ms() as f64 >= plan.duration() * 1000.0);
    assert!(c.synthesizer().residual().is_bounded());
    assert!(!handle.frames_named("QM").is_empty());
}

#[test]
fn pen_moves_carry_settle_delay() {
    let (mut c, handle, _clock) = sim_controller(cfg());
    assert_eq!(c.state(), ControllerState::Idle);
    c.pen_down().unwrap();
    assert_eq!(c.state(), ControllerState::PenDown);
    assert!(!handle.pen_is_up());
    c.pen_up().unwrap();
    assert_eq!(c.state(), ControllerState::PenUp);
    assert!(handle.pen_is_up());
    assert_eq!(handle.frames_named("SP"), vec!["SP,0,66", "SP,1,66"]);
    assert_eq!(handle.pen_delay_ms(), 132);
}

#[test]
fn configure_sends_servo_settings() {
    let (mut c, handle, _clock) = sim_controller(cfg());
    c.configure().unwrap();
    assert_eq!(handle.servo(4), Some(19800));
    assert_eq!(handle.servo(5), Some(17750));
    assert_eq!(handle.servo(11), Some(750));
    assert_eq!(handle.servo(12), Some(750));
}

#[test]
fn configure_truncates_fractional_servo_values() {
    let mut cfg = cfg();
    cfg.pen.up_position = 33.3;
    cfg.pen.up_speed = 10.3;
    let (mut c, handle, _clock) = sim_controller(cfg);
    c.configure().unwrap();
    assert_eq!(handle.servo(4), Some(14326));
    assert_eq!(handle.servo(11), Some(51));
}

#[test]
fn motors_enable_with_microstepping_mode() {
    let (mut c, handle, _clock) = sim_controller(cfg());
    c.enable_motors().unwrap();
    assert_eq!(handle.motor_modes(), (2, 2));
    c.disable_motors().unwrap();
    assert_eq!(handle.motor_modes(), (0, 0));
    assert_eq!(c.version().unwrap(), SIM_VERSION);
}

#[test]
fn stuck_motors_time_out() {
    let cfg = ControllerCfg {
        timeouts: Timeouts {
            idle_ms: 100,
            idle_poll_ms: 10,
        },
        ..cfg()
    };
    let (mut c, handle, clock) = sim_controller(cfg);
    handle.set_stuck(true);
    let err = c
        .run_path(&[Point::ORIGIN, Point::new(0.1, 0.0)])
        .unwrap_err();
    match plotter_error(&err) {
        PlotterError::IdleTimeout { waited_ms } => assert!(*waited_ms >= 100),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(clock.elapsed().as_millis() >= 100);
    // 100 ms at one poll per 10 ms, plus the first poll.
    assert!(handle.frames_named("QM").len() <= 12);
}

#[test]
fn device_rejection_is_surfaced() {
    // Far too many steps per unit: the board refuses the step rate.
    let cfg = ControllerCfg {
        stepper: StepperSettings {
            steps_per_unit: 1.0e6,
            ..StepperSettings::default()
        },
        ..cfg()
    };
    let (mut c, _handle, _clock) = sim_controller(cfg);
    let err = c
        .run_path(&[Point::ORIGIN, Point::new(1.0, 0.0)])
        .unwrap_err();
    match plotter_error(&err) {
        PlotterError::Device { command, response } => {
            assert_eq!(*command, "XM");
            assert!(response.starts_with('!'));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn disconnect_mid_drawing_aborts() {
    let (mut c, handle, _clock) = sim_controller(cfg());
    handle.disconnect_after(5);
    let d = Drawing::try_from(vec![vec![(0.5, 0.5), (1.0, 0.5)]]).unwrap();
    let err = c.run_drawing(&d).unwrap_err();
    assert!(matches!(plotter_error(&err), PlotterError::Transport(_)));
    assert!(format!("{err:#}").contains("disconnected"));
}

#[rstest]
#[case::failing(Box::new(FailingTransport) as Box<dyn Transport>, false)]
#[case::silent(Box::new(SilentTransport::default()) as Box<dyn Transport>, true)]
fn transport_failures_are_typed(#[case] transport: Box<dyn Transport>, #[case] timeout: bool) {
    let mut c = build_controller(transport, cfg(), Some(Box::new(ManualClock::new()))).unwrap();
    let err = c.pen_up().unwrap_err();
    let e = plotter_error(&err);
    if timeout {
        assert_eq!(*e, PlotterError::Timeout);
    } else {
        assert!(matches!(e, PlotterError::Transport(_)));
    }
}

#[test]
fn residual_persists_across_paths() {
    // 0.3 step per move on both axes.
    let cfg = ControllerCfg {
        stepper: StepperSettings {
            steps_per_unit: 4.0,
            ..StepperSettings::default()
        },
        ..cfg()
    };
    let (mut c, handle, _clock) = sim_controller(cfg);
    c.begin_session();
    let mut x = 0.0;
    for _ in 0..4 {
        c.run_path(&[Point::new(x, 0.0), Point::new(x + 0.075, 0.0)]).unwrap();
        x += 0.075;
    }
    assert_eq!(handle.steps(), (1, 1));

    c.begin_session();
    assert_eq!(c.synthesizer().residual().a, 0.0);
}

#[test]
fn drawing_returns_home_with_pen_up() {
    let (mut c, handle, _clock) = sim_controller(cfg());
    let d = Drawing::try_from(vec![
        vec![(0.5, 0.5), (1.5, 0.5), (1.5, 1.5), (0.5, 1.5), (0.5, 0.5)],
        vec![(2.0, 2.0), (2.5, 2.25)],
    ])
    .unwrap();
    c.begin_session();
    c.run_drawing(&d).unwrap();

    let spu = c.synthesizer().steps_per_unit();
    assert!(position(&handle, spu).distance(Point::ORIGIN) <= 1.5 / spu);
    assert!(handle.pen_is_up());
    assert_eq!(c.state(), ControllerState::PenUp);
    let sp = handle.frames_named("SP");
    assert_eq!(sp.iter().filter(|f| f.starts_with("SP,0")).count(), 2);
    assert_eq!(sp.first().map(String::as_str), Some("SP,1,66"));
    assert_eq!(sp.last().map(String::as_str), Some("SP,1,66"));
    assert_eq!(c.plan_drawing(&d).unwrap().len(), 5);
}

#[test]
fn interrupt_stops_before_next_path() {
    let (mut c, handle, _clock) = sim_controller(cfg());
    let d = Drawing::try_from(vec![
        vec![(0.5, 0.5), (1.0, 0.5)],
        vec![(1.0, 1.0), (0.5, 1.0)],
    ])
    .unwrap();
    let err = c.run_drawing_with(&d, |index, _| index < 1).unwrap_err();
    assert_eq!(*plotter_error(&err), PlotterError::Interrupted { index: 1 });
    assert!(handle.pen_is_up());
    assert_eq!(handle.frames_named("SP").iter().filter(|f| f.starts_with("SP,0")).count(), 1);
}

#[test]
fn goto_and_move_by_travel_pen_up() {
    let (mut c, handle, _clock) = sim_controller(cfg());
    c.pen_down().unwrap();
    c.goto(1.0, 0.5).unwrap();
    assert!(handle.pen_is_up());
    let spu = c.synthesizer().steps_per_unit();
    assert!(c.read_position().unwrap().distance(Point::new(1.0, 0.5)) <= 1.5 / spu);

    c.move_by(-0.5, 0.25).unwrap();
    assert!(position(&handle, spu).distance(Point::new(0.5, 0.75)) <= 2.0 / spu);

    c.home().unwrap();
    assert!(position(&handle, spu).distance(Point::ORIGIN) <= 2.0 / spu);

    c.zero_position().unwrap();
    assert_eq!(handle.steps(), (0, 0));
    assert_eq!(c.read_position().unwrap(), Point::ORIGIN);
}
