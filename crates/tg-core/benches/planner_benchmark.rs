use criterion::{criterion_group, criterion_main, Criterion};
use tg_core::axes::AxesConfig;
use tg_core::model::{GCodeState, MoveBlock, MoveType};
use tg_core::planner::Planner;

fn zigzag_block(i: usize, length: f64) -> MoveBlock {
    let dir = if i % 2 == 0 {
        [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]
    } else {
        [0.7071, 0.7071, 0.0, 0.0, 0.0, 0.0]
    };
    let mut b = MoveBlock::default();
    b.length = length;
    b.unit_vector = dir;
    b.gcode = GCodeState {
        feed_rate: 3000.0,
        ..GCodeState::default()
    };
    b.move_type = MoveType::Aline;
    b
}

fn replan_full_ring(c: &mut Criterion) {
    c.bench_function("replan_full_ring", |b| {
        b.iter(|| {
            let mut planner = Planner::new(AxesConfig::default());
            for i in 0..40 {
                planner.enqueue(zigzag_block(i, 5.0));
            }
            planner.replan();
        })
    });
}

fn replan_many_small_segments(c: &mut Criterion) {
    c.bench_function("replan_many_small_segments", |b| {
        b.iter(|| {
            let mut planner = Planner::new(AxesConfig::default());
            for i in 0..40 {
                planner.enqueue(zigzag_block(i, 0.05));
            }
            planner.replan();
        })
    });
}

criterion_group!(benches, replan_full_ring, replan_many_small_segments);
criterion_main!(benches);
