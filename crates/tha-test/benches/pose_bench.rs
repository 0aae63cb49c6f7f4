//! Benchmarks for the per-tick pose pipeline

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tha_core::PoseVector;
use tha_motion::{MotionConfig, MotionOffsets, MotionStack};
use tha_pose::{EmotionLibrary, Interpolator, InterpolatorConfig, PoseCompositor};

fn bench_interpolator_advance(c: &mut Criterion) {
    let mut interpolator =
        Interpolator::new(InterpolatorConfig::default(), PoseVector::uniform(1.0)).unwrap();
    let target = PoseVector::neutral();

    c.bench_function("interpolator_advance", |b| {
        b.iter(|| {
            interpolator.set_target(target);
            interpolator.advance(black_box(0.04)).unwrap();
            black_box(interpolator.current().get(tha_core::Channel::HeadX))
        })
    });
}

fn bench_motion_advance(c: &mut Criterion) {
    let mut motion = MotionStack::new(&MotionConfig::default(), 1).unwrap();
    motion.set_talking(true);
    let mut offsets = MotionOffsets::new();

    c.bench_function("motion_advance", |b| {
        b.iter(|| {
            motion.advance_into(black_box(0.04), &mut offsets);
            black_box(offsets.len())
        })
    });
}

fn bench_compose(c: &mut Criterion) {
    let library = EmotionLibrary::builtin();
    let base = library.get("joy").unwrap().target_pose();
    let mut motion = MotionStack::new(&MotionConfig::default(), 2).unwrap();
    motion.set_talking(true);
    let offsets = motion.advance_all(0.04);
    let compositor = PoseCompositor::default();

    c.bench_function("compose", |b| {
        b.iter(|| black_box(compositor.compose(black_box(&base), &offsets)))
    });
}

fn bench_dominant_emotion(c: &mut Criterion) {
    let library = EmotionLibrary::builtin();
    let scores: Vec<(String, f32)> = library
        .names()
        .enumerate()
        .map(|(i, name)| (name.to_string(), (i as f32 * 0.37).fract()))
        .collect();

    c.bench_function("dominant_emotion", |b| {
        b.iter(|| black_box(library.dominant(scores.iter().map(|(n, s)| (n.as_str(), *s)))))
    });
}

criterion_group!(
    benches,
    bench_interpolator_advance,
    bench_motion_advance,
    bench_compose,
    bench_dominant_emotion,
);
criterion_main!(benches);
