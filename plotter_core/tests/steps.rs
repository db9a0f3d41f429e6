use plotter_core::planner::plan;
use plotter_core::steps::{from_axes, to_axes};
use plotter_core::{KinematicLimits, Point, StepSynthesizer};
use proptest::prelude::*;
use rstest::rstest;

fn pts(v: &[(f64, f64)]) -> Vec<Point> {
    v.iter().copied().map(Point::from).collect()
}

#[rstest]
#[case(1016.0, 15)]
#[case(2032.0, 15)]
#[case(80.0, 10)]
#[case(127.0, 1)]
fn diagonal_move_lands_within_one_step(#[case] spu: f64, #[case] timeslice_ms: u32) {
    let p = plan(&pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]), KinematicLimits::default()).unwrap();
    let mut synth = StepSynthesizer::new(spu, timeslice_ms);
    let (mut a, mut b) = (0i64, 0i64);
    for cmd in synth.synthesize(&p) {
        assert_eq!(cmd.duration_ms, timeslice_ms);
        a += i64::from(cmd.delta_a);
        b += i64::from(cmd.delta_b);
    }
    // (1, 1) maps to a = 2, b = 0.
    assert!((a as f64 - 2.0 * spu).abs() <= 1.0);
    assert!((b as f64).abs() <= 1.0);
    let end = synth.steps_to_point(a, b);
    assert!(end.distance(Point::new(1.0, 1.0)) <= 1.5 / spu);
    assert!(synth.residual().is_bounded());
}

#[test]
fn default_diagonal_defers_shortfall_to_residual() {
    // (0,0) -> (1,0) -> (1,1) at 1016 steps/inch, 15 ms ticks.
    let p = plan(&pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]), KinematicLimits::default()).unwrap();
    let mut synth = StepSynthesizer::new(1016.0, 15);
    let (mut a, mut b) = (0i64, 0i64);
    for cmd in synth.synthesize(&p) {
        a += i64::from(cmd.delta_a);
        b += i64::from(cmd.delta_b);
    }
    assert!((a - 2032).abs() <= 1, "a = {a}");
    assert!(b.abs() <= 1, "b = {b}");
    // Emitted plus carried equals the ideal count.
    let r = synth.residual();
    assert!((a as f64 + r.a - 2032.0).abs() < 1e-6);
    assert!((b as f64 + r.b).abs() < 1e-6);
}

#[test]
fn residual_carries_across_plans_until_reset() {
    // Each move is 0.3 step on both axes.
    let mut synth = StepSynthesizer::new(4.0, 15);
    let short = plan(&pts(&[(0.0, 0.0), (0.075, 0.0)]), KinematicLimits::default()).unwrap();
    let mut total = 0i64;
    for _ in 0..3 {
        total += synth.synthesize(&short).map(|c| i64::from(c.delta_a)).sum::<i64>();
    }
    assert_eq!(total, 0);
    total += synth.synthesize(&short).map(|c| i64::from(c.delta_a)).sum::<i64>();
    assert_eq!(total, 1);
    assert!((synth.residual().a - 0.2).abs() < 1e-9);

    synth.reset();
    assert_eq!(synth.residual().a, 0.0);
    assert_eq!(synth.residual().b, 0.0);
}

#[test]
fn last_tick_keeps_the_full_timeslice() {
    let p = plan(&pts(&[(0.0, 0.0), (0.3, 0.0)]), KinematicLimits::default()).unwrap();
    let mut synth = StepSynthesizer::new(1016.0, 15);
    let ticks: Vec<_> = synth.synthesize(&p).collect();
    let covered = ticks.len() as f64 * 0.015;
    assert!(covered >= p.duration());
    assert!(covered - p.duration() < 0.015);
    assert_eq!(ticks.last().unwrap().duration_ms, 15);
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 48, .. ProptestConfig::default() })]

    #[test]
    fn residual_stays_below_one_step(
        path in prop::collection::vec((-3.0f64..3.0, -3.0f64..3.0), 2..8),
        spu in 50.0f64..3000.0,
    ) {
        let path = pts(&path);
        let p = plan(&path, KinematicLimits::default()).unwrap();
        let mut synth = StepSynthesizer::new(spu, 15);
        let (mut a, mut b) = (0i64, 0i64);
        for cmd in synth.synthesize(&p) {
            a += i64::from(cmd.delta_a);
            b += i64::from(cmd.delta_b);
        }
        prop_assert!(synth.residual().is_bounded());

        let (ta, tb) = to_axes(path[path.len() - 1] - path[0]);
        prop_assert!((a as f64 - ta * spu).abs() < 1.0 + 1e-6);
        prop_assert!((b as f64 - tb * spu).abs() < 1.0 + 1e-6);
    }

    #[test]
    fn axes_transform_inverts(x in -100.0f64..100.0, y in -100.0f64..100.0) {
        let (a, b) = to_axes(Point::new(x, y));
        let back = from_axes(a, b);
        prop_assert!((back.x - x).abs() < 1e-9 && (back.y - y).abs() < 1e-9);
    }
}
