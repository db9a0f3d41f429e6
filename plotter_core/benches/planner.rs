use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use plotter_core::{Drawing, KinematicLimits, Path, Planner, Point, StepSynthesizer, Throttle};

// Dense spiral: many short segments with gentle corners.
fn spiral(n: usize) -> Vec<Point> {
    (0..n)
        .map(|i| {
            let t = i as f64 * 0.05;
            let r = 0.1 + t * 0.02;
            Point::new(4.0 + r * t.cos(), 4.0 + r * t.sin())
        })
        .collect()
}

// Scattered short strokes for the sort benchmark.
fn strokes(n: usize, seed: u32) -> Vec<Path> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        f64::from(x) / (f64::from(u32::MAX) + 1.0) * 10.0
    };
    (0..n)
        .map(|_| {
            let a = Point::new(next(), next());
            Path::new(vec![a, Point::new(a.x + 0.1, a.y + 0.05)]).expect("finite stroke")
        })
        .collect()
}

pub fn bench_plan(c: &mut Criterion) {
    let points = spiral(2_000);
    let planner = Planner::new(KinematicLimits::default());
    c.bench_function("plan_spiral_2000", |b| {
        b.iter(|| planner.plan(black_box(&points)))
    });

    let throttled = planner.clone().with_throttle(Some(Throttle::default()));
    c.bench_function("plan_spiral_2000_throttled", |b| {
        b.iter(|| throttled.plan(black_box(&points)))
    });
}

pub fn bench_steps(c: &mut Criterion) {
    let plan = Planner::new(KinematicLimits::default())
        .plan(&spiral(2_000))
        .unwrap_or_else(|e| panic!("plan failed: {e}"));
    c.bench_function("synthesize_spiral", |b| {
        b.iter_batched(
            || StepSynthesizer::new(1016.0, 15),
            |mut s| s.synthesize(black_box(&plan)).count(),
            BatchSize::SmallInput,
        )
    });
}

pub fn bench_sort(c: &mut Criterion) {
    let drawing = Drawing::new(strokes(1_000, 7));
    c.bench_function("sort_1000_strokes", |b| b.iter(|| black_box(&drawing).sort(true)));
}

criterion_group!(benches, bench_plan, bench_steps, bench_sort);
criterion_main!(benches);
