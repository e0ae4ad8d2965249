// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use num::Complex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use orbitplot::presets;
use orbitplot::sampler::Trajectory;
use orbitplot::systems::{Duffing, Mandelbrot, Oscillator};
use orbitplot::{render, CancelToken, DynamicalSystem};

fn trace_orbits(c: &mut Criterion) {
    c.bench_function("trace a slow mandelbrot escape", |b| {
        let mut trajectory = Trajectory::with_capacity(2000);
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| {
            let start = Mandelbrot.start(black_box(Complex::new(-0.75, 0.05)), &mut rng);
            trajectory.trace(&Mandelbrot, start, 2000, &mut rng)
        })
    });

    c.bench_function("integrate 100 duffing periods", |b| {
        let oscillator = Oscillator::new(Duffing::default());
        let mut trajectory = Trajectory::with_capacity(100);
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| {
            let start = oscillator.start(black_box(Complex::new(0.0, 2.0)), &mut rng);
            trajectory.trace(&oscillator, start, 100, &mut rng)
        })
    });
}

fn small_render(c: &mut Criterion) {
    let mut scene = presets::buddha(80, 60, Complex::new(-2.103, -1.238), Complex::new(1.201, 1.240)).unwrap();
    scene.config.policy.max_iterations = 500;
    scene.config.seed = Some(7);
    c.bench_function("buddhabrot 80x60", |b| {
        b.iter(|| render(&scene.system, &scene.config, &CancelToken::new()).unwrap())
    });
}

criterion_group!(benches, trace_orbits, small_render);
criterion_main!(benches);
