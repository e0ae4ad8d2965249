// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The multi-threaded render.
//!
//! One thread enumerates the rows of the sample plane into a queue.
//! A fixed number of workers pull rows off it, trace the orbits of
//! every sample in the row, and send what they draw down a bounded
//! channel; a full channel makes the workers wait.  The thread that
//! called [`render`] is the only one that ever writes a histogram: it
//! drains the channel until every worker has hung up, then freezes the
//! result.  Nothing is returned until every thread has been joined.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::accumulator::{Accumulator, Batch, Histogram};
use crate::error::{RenderError, Result};
use crate::planes::PlaneMapper;
use crate::sampler::{SamplePolicy, Worker};
use crate::systems::DynamicalSystem;

/// A flag that asks a render to stop taking new rows.  Clones share
/// the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Ask every render holding this token to stop.  Rows that are
    /// already being sampled are finished and delivered.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a render needs apart from the system itself.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    /// The canvas orbits are drawn on.
    pub view: PlaneMapper,
    /// The plane orbits are seeded from.  Its rows are the units of
    /// work handed to the threads.
    pub samples: PlaneMapper,
    /// How orbits are seeded, traced and drawn.
    pub policy: SamplePolicy,
    /// Number of sampling threads.
    pub workers: usize,
    /// How many batches may wait for the accumulator before workers
    /// block.
    pub queue_depth: usize,
    /// Seed for the master generator.  `None` seeds it from the OS.
    pub seed: Option<u64>,
}

impl RenderConfig {
    /// Seed orbits on the canvas itself, one thread per CPU.
    pub fn new(view: PlaneMapper, policy: SamplePolicy) -> Self {
        RenderConfig {
            view,
            samples: view,
            policy,
            workers: num_cpus::get(),
            queue_depth: 10_000,
            seed: None,
        }
    }

    /// Seed orbits from a different plane than the one they are drawn on.
    pub fn with_samples(mut self, samples: PlaneMapper) -> Self {
        self.samples = samples;
        self
    }

    /// Set the number of sampling threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(RenderError::InvalidConfig(
                "at least one worker thread is needed".to_string(),
            ));
        }
        if self.queue_depth == 0 {
            return Err(RenderError::InvalidConfig(
                "the contribution queue needs room for at least one batch".to_string(),
            ));
        }
        self.policy.validate()
    }
}

/// The outcome of a render.
#[derive(Clone, Debug)]
pub struct Rendered {
    /// One frozen histogram per channel of the sample policy.
    pub histograms: Vec<Histogram>,
    /// Rows of the sample plane that were fully sampled.
    pub rows_completed: usize,
    /// Rows in the sample plane.
    pub rows_total: usize,
    /// Batches the accumulator merged.
    pub batches: usize,
}

impl Rendered {
    /// Whether every row was sampled, that is, the render was not
    /// cancelled part way.
    pub fn is_complete(&self) -> bool {
        self.rows_completed == self.rows_total
    }

    /// Fraction of the rows that were sampled.
    pub fn completeness(&self) -> f64 {
        if self.rows_total == 0 {
            return 1.0;
        }
        self.rows_completed as f64 / self.rows_total as f64
    }
}

/// Draw `system` according to `config`.  Blocks until every sampling
/// thread has finished, or until `cancel` is triggered and the rows in
/// progress are done.
#[tracing::instrument(skip_all)]
pub fn render<S>(system: &S, config: &RenderConfig, cancel: &CancelToken) -> Result<Rendered>
where
    S: DynamicalSystem,
{
    config.validate()?;

    let mut master = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let seeds: Vec<u64> = (0..config.workers).map(|_| master.gen()).collect();

    let rows_total = config.samples.height();
    let channels = config.policy.channels();
    let mut accumulator = Accumulator::new(config.view.integral_plane, channels, config.policy.scale());
    let completed = AtomicUsize::new(0);

    info!(
        width = config.view.width(),
        height = config.view.height(),
        rows = rows_total,
        orbits = config.samples.len() * config.policy.sub_pixels,
        streaming = config.policy.streams(),
        workers = config.workers,
        "sampling started"
    );

    let (row_sender, row_receiver) = channel::unbounded::<usize>();
    let (batch_sender, batch_receiver) = channel::bounded::<Batch>(config.queue_depth);

    crossbeam::scope(|spawner| {
        spawner.spawn(move |_| {
            for row in 0..rows_total {
                if row_sender.send(row).is_err() {
                    break;
                }
            }
        });

        for (id, seed) in seeds.into_iter().enumerate() {
            let rows = row_receiver.clone();
            let batches = batch_sender.clone();
            let completed = &completed;
            spawner.spawn(move |_| {
                let rng = StdRng::seed_from_u64(seed);
                let mut worker = Worker::new(system, &config.samples, &config.view, &config.policy, rng);
                let mut done = 0;
                while !cancel.is_cancelled() {
                    let row = match rows.recv() {
                        Ok(row) => row,
                        Err(_) => break,
                    };
                    if !worker.sample_row(row, |batch| batches.send(batch).is_ok()) {
                        break;
                    }
                    done += 1;
                    completed.fetch_add(1, Ordering::Relaxed);
                }
                debug!(worker = id, rows = done, "worker finished");
            });
        }

        // Only the workers may keep the channels open.
        drop(row_receiver);
        drop(batch_sender);

        accumulator.drain(batch_receiver.iter());
    })
    .map_err(|_| RenderError::WorkerPanicked)?;

    let rows_completed = completed.into_inner();
    if rows_completed < rows_total {
        warn!(rows_completed, rows_total, "sampling stopped before every row was drawn");
    }

    let batches = accumulator.batches();
    let histograms = accumulator.freeze();
    let mass: f64 = histograms.iter().map(Histogram::total).sum();
    info!(batches, mass, "sampling finished");

    Ok(Rendered {
        histograms,
        rows_completed,
        rows_total,
        batches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planes::Projection;
    use crate::sampler::{Jitter, Routing};
    use num::Complex;

    struct Still;

    impl DynamicalSystem for Still {
        type State = Complex<f64>;

        fn start<R: Rng + ?Sized>(&self, point: Complex<f64>, _rng: &mut R) -> Complex<f64> {
            point
        }

        fn next<R: Rng + ?Sized>(&self, z: Complex<f64>, _step: usize, _rng: &mut R) -> Complex<f64> {
            z
        }

        fn is_terminal(&self, _z: &Complex<f64>, _steps: usize) -> bool {
            false
        }

        fn position(&self, z: &Complex<f64>) -> Complex<f64> {
            *z
        }
    }

    /// Wanders randomly so the result depends on the generator.
    struct Drunk;

    impl DynamicalSystem for Drunk {
        type State = Complex<f64>;

        fn start<R: Rng + ?Sized>(&self, point: Complex<f64>, _rng: &mut R) -> Complex<f64> {
            point
        }

        fn next<R: Rng + ?Sized>(&self, z: Complex<f64>, _step: usize, rng: &mut R) -> Complex<f64> {
            z + Complex::new(rng.gen_range(-0.3..0.3), rng.gen_range(-0.3..0.3))
        }

        fn is_terminal(&self, z: &Complex<f64>, _steps: usize) -> bool {
            !(z.norm() < 2.0)
        }

        fn position(&self, z: &Complex<f64>) -> Complex<f64> {
            *z
        }
    }

    struct Explodes;

    impl DynamicalSystem for Explodes {
        type State = Complex<f64>;

        fn start<R: Rng + ?Sized>(&self, point: Complex<f64>, _rng: &mut R) -> Complex<f64> {
            point
        }

        fn next<R: Rng + ?Sized>(&self, _z: Complex<f64>, _step: usize, _rng: &mut R) -> Complex<f64> {
            panic!("boom")
        }

        fn is_terminal(&self, _z: &Complex<f64>, _steps: usize) -> bool {
            false
        }

        fn position(&self, z: &Complex<f64>) -> Complex<f64> {
            *z
        }
    }

    fn config(workers: usize) -> RenderConfig {
        let view = PlaneMapper::new(8, 8, Complex::new(-1.0, -1.0), Complex::new(1.0, 1.0)).unwrap();
        let policy = SamplePolicy {
            sub_pixels: 3,
            max_iterations: 4,
            jitter: Jitter::Center,
            routing: Routing::All,
            projection: Projection::Nearest,
            ..SamplePolicy::default()
        };
        RenderConfig::new(view, policy).with_workers(workers).with_seed(17)
    }

    #[test]
    fn thread_count_does_not_change_the_picture() {
        let one = render(&Still, &config(1), &CancelToken::new()).unwrap();
        let four = render(&Still, &config(4), &CancelToken::new()).unwrap();
        assert!(one.is_complete() && four.is_complete());
        assert_eq!(one.histograms, four.histograms);
        // 3 samples of 4 steps each, on every one of the 64 pixels.
        assert!(one.histograms[0].cells().iter().all(|&c| c == 12.0));
    }

    #[test]
    fn a_fixed_seed_repeats_on_one_thread() {
        let config = RenderConfig {
            policy: SamplePolicy {
                jitter: Jitter::Uniform,
                projection: Projection::Bilinear,
                routing: Routing::Escaped { below: usize::MAX },
                max_iterations: 30,
                ..config(1).policy
            },
            ..config(1)
        };
        let a = render(&Drunk, &config, &CancelToken::new()).unwrap();
        let b = render(&Drunk, &config, &CancelToken::new()).unwrap();
        assert_eq!(a.histograms, b.histograms);
        assert!(a.histograms[0].total() > 0.0);
    }

    #[test]
    fn cancelling_first_draws_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let rendered = render(&Still, &config(2), &cancel).unwrap();
        assert_eq!(rendered.rows_completed, 0);
        assert_eq!(rendered.rows_total, 8);
        assert!(!rendered.is_complete());
        assert_eq!(rendered.completeness(), 0.0);
        assert_eq!(rendered.histograms[0].total(), 0.0);
    }

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn bad_configurations_are_refused() {
        let no_workers = config(0);
        assert!(render(&Still, &no_workers, &CancelToken::new()).is_err());
        let no_queue = RenderConfig {
            queue_depth: 0,
            ..config(1)
        };
        assert!(no_queue.validate().is_err());
    }

    #[test]
    fn panicking_workers_fail_the_render() {
        match render(&Explodes, &config(2), &CancelToken::new()) {
            Err(RenderError::WorkerPanicked) => {}
            other => panic!("expected a worker panic, got {:?}", other.map(|r| r.rows_completed)),
        }
    }
}
