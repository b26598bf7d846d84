//! 单周期核心计算耗时
//!
//! 控制周期预算通常在亚毫秒级，这里测量 7 自由度下各核心函数的耗时。

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use nalgebra::{DMatrix, DVector, Vector3};
use osc_kernel::{axis_angle_to_rotation, nullspace_torques, opspace_matrices, orientation_error};

fn fixture() -> (DMatrix<f64>, DMatrix<f64>, DMatrix<f64>, DMatrix<f64>) {
    let mass = DMatrix::from_fn(7, 7, |r, c| {
        if r == c {
            1.0 + 0.2 * r as f64
        } else if r.abs_diff(c) == 1 {
            0.1
        } else {
            0.0
        }
    });
    let j_full = DMatrix::from_fn(6, 7, |r, c| {
        if r == c {
            1.0
        } else {
            0.1 * ((r * 7 + c) as f64).sin()
        }
    });
    let j_pos = j_full.rows(0, 3).into_owned();
    let j_ori = j_full.rows(3, 3).into_owned();
    (mass, j_full, j_pos, j_ori)
}

fn bench_opspace_matrices(c: &mut Criterion) {
    let (mass, j_full, j_pos, j_ori) = fixture();

    c.bench_function("opspace_matrices_7dof", |b| {
        b.iter(|| {
            opspace_matrices(
                black_box(&mass),
                black_box(&j_full),
                black_box(&j_pos),
                black_box(&j_ori),
            )
        })
    });
}

fn bench_nullspace_torques(c: &mut Criterion) {
    let (mass, j_full, j_pos, j_ori) = fixture();
    let Ok(matrices) = opspace_matrices(&mass, &j_full, &j_pos, &j_ori) else {
        panic!("fixture must be well-conditioned");
    };
    let posture = DVector::from_vec(vec![0.0, -1.18, 0.0, 2.18, 0.0, 0.57, 3.3161]);
    let q = DVector::from_element(7, 0.1);
    let qd = DVector::from_element(7, 0.01);

    c.bench_function("nullspace_torques_7dof", |b| {
        b.iter(|| {
            nullspace_torques(
                black_box(&mass),
                black_box(&matrices.nullspace),
                black_box(&posture),
                black_box(&q),
                black_box(&qd),
                black_box(10.0),
            )
        })
    });
}

fn bench_orientation_error(c: &mut Criterion) {
    let desired = axis_angle_to_rotation(&Vector3::new(0.1, -0.2, 0.3));
    let current = axis_angle_to_rotation(&Vector3::new(-0.4, 0.0, 0.2));

    c.bench_function("orientation_error", |b| {
        b.iter(|| orientation_error(black_box(&desired), black_box(&current)))
    });
}

criterion_group!(
    benches,
    bench_opspace_matrices,
    bench_nullspace_torques,
    bench_orientation_error
);
criterion_main!(benches);
