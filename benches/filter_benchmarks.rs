//! Benchmarks for smoothing and face box derivation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use face_overlay::face_box::{derive_face_box, BoxPadding};
use face_overlay::filters::exponential::ExponentialSmoother;
use face_overlay::filters::expression::ExpressionSmoother;
use face_overlay::filters::rotation::RotationSmoother;
use face_overlay::filters::Smoother;
use face_overlay::stabilizer::AvatarStabilizer;
use face_overlay::types::{ExpressionWeights, FrameSize, LandmarkPoint, PoseSnapshot, TransformMatrix};
use nalgebra::{UnitQuaternion, Vector2};
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(16);

/// Noisy 468-point mesh around the frame center
fn noisy_mesh() -> Vec<LandmarkPoint> {
    (0..468)
        .map(|i| {
            let angle = i as f32 * 0.0134;
            let x = 0.5 + 0.15 * angle.cos() + 0.01 * rand::random::<f32>();
            let y = 0.5 + 0.2 * angle.sin() + 0.01 * rand::random::<f32>();
            LandmarkPoint::new(x, y)
        })
        .collect()
}

fn noisy_matrices(count: usize) -> Vec<TransformMatrix> {
    (0..count)
        .map(|i| {
            let t = i as f32 * 0.1;
            let rotation = UnitQuaternion::from_euler_angles(
                0.2 * t.sin() + 0.02 * rand::random::<f32>(),
                0.3 * t.cos() + 0.02 * rand::random::<f32>(),
                0.05 * rand::random::<f32>(),
            );
            let mut matrix = [0.0; 16];
            matrix.copy_from_slice(rotation.to_homogeneous().as_slice());
            matrix
        })
        .collect()
}

fn benchmark_smoothers(c: &mut Criterion) {
    let mut group = c.benchmark_group("smoothers");

    let positions: Vec<Vector2<f32>> = (0..100)
        .map(|i| {
            let t = i as f32 * 0.1;
            Vector2::new(320.0 + 40.0 * t.sin(), 240.0 + 30.0 * t.cos()) + Vector2::new(rand::random(), rand::random())
        })
        .collect();
    let matrices = noisy_matrices(100);
    let weights: Vec<ExpressionWeights> = (0..100)
        .map(|_| {
            ["jawOpen", "mouthSmileLeft", "browInnerUp", "eyeBlinkLeft", "eyeLookInLeft", "eyeLookOutRight"]
                .iter()
                .map(|name| ((*name).to_string(), rand::random::<f32>()))
                .collect()
        })
        .collect();

    group.bench_with_input(BenchmarkId::new("sequence_100", "position"), &positions, |b, data| {
        let mut smoother = ExponentialSmoother::<Vector2<f32>>::new(12.0);
        b.iter(|| {
            smoother.reset();
            for &p in data {
                black_box(smoother.apply(black_box(p), FRAME));
            }
        });
    });

    group.bench_with_input(BenchmarkId::new("sequence_100", "rotation"), &matrices, |b, data| {
        let mut smoother = RotationSmoother::new(12.0, true);
        b.iter(|| {
            smoother.reset();
            for m in data {
                black_box(smoother.apply_matrix(black_box(m), FRAME));
            }
        });
    });

    group.bench_with_input(BenchmarkId::new("sequence_100", "expressions"), &weights, |b, data| {
        let mut smoother = ExpressionSmoother::default();
        b.iter(|| {
            smoother.reset();
            for w in data {
                black_box(smoother.apply(black_box(w)));
            }
        });
    });

    group.finish();
}

fn benchmark_face_box(c: &mut Criterion) {
    let mut group = c.benchmark_group("face_box");
    let mesh = noisy_mesh();
    let frame = FrameSize::new(1280, 720);

    for (name, padding) in [("mask", BoxPadding::MASK), ("avatar", BoxPadding::AVATAR)] {
        group.bench_with_input(BenchmarkId::new("derive_468", name), &mesh, |b, mesh| {
            b.iter(|| black_box(derive_face_box(black_box(mesh), frame, padding, true)));
        });
    }

    group.finish();
}

fn benchmark_avatar_frame(c: &mut Criterion) {
    let matrices = noisy_matrices(1);
    let snapshot = PoseSnapshot::new(noisy_mesh(), Some(matrices[0]), None, Duration::ZERO);
    let frame = FrameSize::new(1280, 720);

    c.bench_function("avatar_update", |b| {
        let mut avatar = AvatarStabilizer::default();
        avatar.set_continuous(true);
        let mut now = Duration::ZERO;
        b.iter(|| {
            now += FRAME;
            black_box(avatar.update(Some(&snapshot), frame, now, FRAME))
        });
    });
}

criterion_group!(benches, benchmark_smoothers, benchmark_face_box, benchmark_avatar_frame);
criterion_main!(benches);
