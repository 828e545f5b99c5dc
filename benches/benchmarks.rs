use std::sync::Arc;

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use nalgebra::DVector;

use blatter_rs::discretization::{GridTopology, LocalExchange, NodeField, Periodicity};
use blatter_rs::models::column_shear::ColumnShearModel;
use blatter_rs::models::setups::Slab;
use blatter_rs::numerics::hierarchy::GridLevel;
use blatter_rs::numerics::solver::PhysicsModel;
use blatter_rs::physics::flow_law::{ice_hardness, FlowLaw};
use blatter_rs::physics::node_type::classify;
use blatter_rs::physics::parameters::build_parameters;
use blatter_rs::{Blatter, BlatterConfig};

fn grid_sizes() -> Vec<usize> {
    vec![50, 200]
}

fn column_counts() -> Vec<usize> {
    vec![9, 17, 33]
}

fn slab_config(mx: usize, mz: usize) -> BlatterConfig {
    let mut config = BlatterConfig::default();
    config.grid.mx = mx;
    config.grid.my = 3;
    config.grid.dx = 1e3;
    config.grid.dy = 1e3;
    config.mz = mz;
    config.coarsening_factor = 2;
    config.newton.mg_levels = 3;
    config
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    for &size in &grid_sizes() {
        let grid = GridTopology::serial(size, size, 1e3, 1e3, Periodicity::None).unwrap();
        let half = size as f64 / 2.0;
        let thickness = NodeField::from_global_fn(&grid, |i, j| {
            let r2 = ((i as f64 - half).powi(2) + (j as f64 - half).powi(2)) / (half * half);
            (1000.0 * (1.0 - r2)).max(0.0)
        });
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                let types = classify(&grid, std::hint::black_box(&thickness), 10.0, &LocalExchange);
                std::hint::black_box(types);
            });
        });
    }
    group.finish();
}

fn bench_column_jacobian(c: &mut Criterion) {
    let mut group = c.benchmark_group("column_jacobian");
    for &mz in &column_counts() {
        let config = slab_config(11, mz);
        let grid = Arc::new(config.grid.topology(0).unwrap());
        let inputs = Slab::default().inputs(&grid);
        let parameters = build_parameters(
            &grid,
            &inputs,
            &config.constants,
            config.min_thickness,
            &LocalExchange,
        );
        let hardness = ice_hardness(
            &config.flow_law,
            &parameters,
            &inputs.enthalpy,
            &config.constants,
            mz,
        );
        let level = GridLevel::new(0, Arc::clone(&grid), mz, parameters, hardness);
        let model = ColumnShearModel::new(
            config.constants,
            config.sliding,
            config.flow_law.exponent(),
            config.min_thickness,
        );
        let x = DVector::from_element(model.size(&level), 1e-6);
        group.bench_with_input(BenchmarkId::from_parameter(mz), &mz, |b, &_| {
            b.iter(|| {
                let (_res, jac) = model.residual_and_jacobian(&level, 1e-20, std::hint::black_box(&x));
                std::hint::black_box(jac);
            });
        });
    }
    group.finish();
}

fn bench_slab_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("slab_update");
    group.sample_size(10);
    for &mz in &column_counts() {
        let config = slab_config(11, mz);
        group.bench_with_input(BenchmarkId::from_parameter(mz), &mz, |b, &_| {
            b.iter_batched(
                || Blatter::from_config(config).unwrap(),
                |mut blatter| {
                    let inputs = Slab::default().inputs(blatter.grid());
                    let _ = blatter.update(&inputs);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify, bench_column_jacobian, bench_slab_update);
criterion_main!(benches);
