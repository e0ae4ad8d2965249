// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tracing orbits and deciding what they are worth.
//!
//! A [`Worker`] belongs to one sampling thread.  Given a row of the
//! sample plane, it seeds `sub_pixels` orbits inside every pixel of
//! that row, traces each one, asks the [`Routing`] whether (and into
//! which channel) it should be drawn, and deposits the points it
//! keeps into its sparse [`Hits`].  After each pixel the hits are
//! handed out as batches for the accumulator.

use num::Complex;
use rand::Rng;

use crate::accumulator::{Batch, Hits};
use crate::error::{RenderError, Result};
use crate::planes::{Pixel, PlaneMapper, Projection};
use crate::systems::DynamicalSystem;

/// Where inside a sample pixel each orbit starts.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Jitter {
    /// Anywhere in the pixel, uniformly.
    Uniform,
    /// At the pixel's center, every time.
    Center,
}

/// How a finished orbit ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fate {
    /// It reached a terminal state after this many steps.
    Escaped(usize),
    /// It used up all of its steps.
    Exhausted(usize),
}

impl Fate {
    /// Steps taken either way.
    pub fn steps(self) -> usize {
        match self {
            Fate::Escaped(n) | Fate::Exhausted(n) => n,
        }
    }
}

/// Which orbits get drawn, and into which channel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Routing {
    /// Every orbit, into channel 0.  For systems that never escape.
    All,
    /// Orbits that escape in fewer than `below` steps, into channel 0.
    /// The rest are thrown away: this is the Buddhabrot filter.
    Escaped {
        /// Exclusive limit on the escape time.
        below: usize,
    },
    /// Orbits that escape early into channel 0, orbits that escape
    /// late into channel 1.
    Split {
        /// Escapes in fewer steps than this are early.
        early_below: usize,
        /// Whether orbits that never escape count as late ones rather
        /// than being thrown away.
        keep_bounded: bool,
    },
}

impl Routing {
    /// The channel for an orbit, or `None` to discard it.
    pub fn route(&self, fate: Fate) -> Option<usize> {
        match (*self, fate) {
            (Routing::All, _) => Some(0),
            (Routing::Escaped { below }, Fate::Escaped(n)) if n < below => Some(0),
            (Routing::Escaped { .. }, _) => None,
            (Routing::Split { early_below, .. }, Fate::Escaped(n)) if n < early_below => Some(0),
            (Routing::Split { .. }, Fate::Escaped(_)) => Some(1),
            (Routing::Split { keep_bounded, .. }, Fate::Exhausted(_)) => {
                if keep_bounded {
                    Some(1)
                } else {
                    None
                }
            }
        }
    }

    /// The channel every orbit goes to when the routing does not care
    /// how orbits end.  Such orbits can be drawn while they are traced.
    pub fn fixed_channel(&self) -> Option<usize> {
        match *self {
            Routing::All => Some(0),
            Routing::Split {
                early_below: 0,
                keep_bounded: true,
            } => Some(1),
            _ => None,
        }
    }

    /// How many channels the routing can send to.
    pub fn channels(&self) -> usize {
        match self {
            Routing::All | Routing::Escaped { .. } => 1,
            Routing::Split { .. } => 2,
        }
    }
}

/// What a kept orbit draws.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Plot {
    /// Every point it visits.
    Orbit,
    /// Only its starting point, weighted by the system's escape value.
    /// This is ordinary escape-time rendering.
    EscapeTime,
}

/// How bright each orbit point is.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Brightness {
    /// Every point the same.
    Flat(f64),
    /// The k-th point gets `min(step * k, cap)`, so the later points of
    /// an orbit are brighter than its first few.
    Ramp {
        /// Growth per point.
        step: f64,
        /// Ceiling.
        cap: f64,
    },
}

impl Brightness {
    /// Weight of the point at index `k` of its orbit.
    pub fn weight(&self, k: usize) -> f64 {
        match *self {
            Brightness::Flat(w) => w,
            Brightness::Ramp { step, cap } => (step * k as f64).min(cap),
        }
    }
}

/// Whether a pixel's samples are summed or averaged.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Accumulation {
    /// Plain sums.
    Raw,
    /// Sums divided by the number of samples per pixel.
    Average,
}

/// Everything about how orbits are seeded, traced and drawn.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SamplePolicy {
    /// Orbits seeded in each sample pixel.
    pub sub_pixels: usize,
    /// Longest orbit traced.
    pub max_iterations: usize,
    /// Leading orbit points that are traced but never drawn.
    pub warmup: usize,
    /// Where orbits start inside their pixel.
    pub jitter: Jitter,
    /// Which orbits are drawn.
    pub routing: Routing,
    /// What a drawn orbit puts on the canvas.
    pub plot: Plot,
    /// How points land on the canvas.
    pub projection: Projection,
    /// How bright each point is.
    pub brightness: Brightness,
    /// Sum or average per sample pixel.
    pub accumulation: Accumulation,
}

impl Default for SamplePolicy {
    fn default() -> Self {
        SamplePolicy {
            sub_pixels: 1,
            max_iterations: 100,
            warmup: 0,
            jitter: Jitter::Uniform,
            routing: Routing::Escaped { below: usize::MAX },
            plot: Plot::Orbit,
            projection: Projection::Bilinear,
            brightness: Brightness::Flat(1.0),
            accumulation: Accumulation::Raw,
        }
    }
}

impl SamplePolicy {
    /// Number of histogram channels the policy fills.
    pub fn channels(&self) -> usize {
        self.routing.channels()
    }

    /// Factor applied to every weight as it is accumulated.
    pub fn scale(&self) -> f64 {
        match self.accumulation {
            Accumulation::Raw => 1.0,
            Accumulation::Average => 1.0 / self.sub_pixels.max(1) as f64,
        }
    }

    /// Whether orbits are drawn point by point as they are traced,
    /// rather than stored whole and drawn once their fate is known.
    pub fn streams(&self) -> bool {
        self.plot == Plot::Orbit && self.routing.fixed_channel().is_some()
    }

    /// Reject policies that cannot draw anything sensible.
    pub fn validate(&self) -> Result<()> {
        if self.sub_pixels == 0 {
            return Err(RenderError::InvalidConfig(
                "at least one sample per pixel is needed".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(RenderError::InvalidConfig(
                "orbits need at least one iteration".to_string(),
            ));
        }
        let weights = match self.brightness {
            Brightness::Flat(w) => vec![w],
            Brightness::Ramp { step, cap } => vec![step, cap],
        };
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(RenderError::InvalidConfig(
                "brightness must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// A reusable buffer holding the states of one orbit, in order.  The
/// starting state is not included; the first entry is the state after
/// one step.
#[derive(Clone, Debug)]
pub struct Trajectory<S> {
    states: Vec<S>,
}

impl<S: Copy> Trajectory<S> {
    /// An empty buffer with room for `capacity` states.
    pub fn with_capacity(capacity: usize) -> Self {
        Trajectory {
            states: Vec::with_capacity(capacity),
        }
    }

    /// Replace the buffer's contents with the orbit of `start`, run
    /// until the system says it is done or `max_iterations` steps
    /// have been taken.
    pub fn trace<Sys, R>(&mut self, system: &Sys, start: S, max_iterations: usize, rng: &mut R) -> Fate
    where
        Sys: DynamicalSystem<State = S>,
        R: Rng + ?Sized,
    {
        let states = &mut self.states;
        states.clear();
        follow(system, start, max_iterations, rng, |_, state| states.push(*state))
    }

    /// The states of the last orbit traced.
    pub fn states(&self) -> &[S] {
        &self.states
    }

    /// The final state of the last orbit traced.
    pub fn last(&self) -> Option<&S> {
        self.states.last()
    }
}

/// Run the orbit of `start`, handing each state to `visit` along with
/// its index, until the system says it is done or `max_iterations`
/// steps have been taken.  Nothing is kept.
pub fn follow<Sys, R, F>(system: &Sys, start: Sys::State, max_iterations: usize, rng: &mut R, mut visit: F) -> Fate
where
    Sys: DynamicalSystem,
    R: Rng + ?Sized,
    F: FnMut(usize, &Sys::State),
{
    let mut state = start;
    for step in 0..max_iterations {
        state = system.next(state, step, rng);
        visit(step, &state);
        if system.is_terminal(&state, step + 1) {
            return Fate::Escaped(step + 1);
        }
    }
    Fate::Exhausted(max_iterations)
}

/// Deposit the `k`-th point of an orbit, unless it is still warming up
/// or too dim to see.
fn draw<S: DynamicalSystem>(
    system: &S,
    view: &PlaneMapper,
    policy: &SamplePolicy,
    hits: &mut Hits,
    channel: usize,
    k: usize,
    state: &S::State,
) {
    if k < policy.warmup {
        return;
    }
    let weight = policy.brightness.weight(k);
    if weight <= 0.0 {
        return;
    }
    let position = system.position(state);
    view.deposit(policy.projection, &position, weight, |offset, w| hits.add(channel, offset, w));
}

/// One sampling thread's view of the render.
pub struct Worker<'a, S: DynamicalSystem, R> {
    system: &'a S,
    samples: &'a PlaneMapper,
    view: &'a PlaneMapper,
    policy: &'a SamplePolicy,
    rng: R,
    trajectory: Trajectory<S::State>,
    hits: Hits,
}

impl<'a, S, R> Worker<'a, S, R>
where
    S: DynamicalSystem,
    R: Rng,
{
    /// A worker seeding orbits on `samples` and drawing them on `view`.
    pub fn new(
        system: &'a S,
        samples: &'a PlaneMapper,
        view: &'a PlaneMapper,
        policy: &'a SamplePolicy,
        rng: R,
    ) -> Self {
        Worker {
            system,
            samples,
            view,
            policy,
            rng,
            trajectory: Trajectory::with_capacity(if policy.streams() {
                0
            } else {
                policy.max_iterations.min(1 << 16)
            }),
            hits: Hits::new(policy.channels()),
        }
    }

    /// Trace one orbit seeded at `point` and stage what it draws.
    pub fn sample_point(&mut self, point: Complex<f64>) {
        let Worker {
            system,
            view,
            policy,
            rng,
            trajectory,
            hits,
            ..
        } = self;
        let (system, view, policy): (&S, &PlaneMapper, &SamplePolicy) = (*system, *view, *policy);

        let start = system.start(point, rng);
        let exhausted = Fate::Exhausted(policy.max_iterations);
        if system.never_terminates(&start) && policy.routing.route(exhausted).is_none() {
            return;
        }

        if policy.streams() {
            if let Some(channel) = policy.routing.fixed_channel() {
                follow(system, start, policy.max_iterations, rng, |k, state| {
                    draw(system, view, policy, hits, channel, k, state)
                });
            }
            return;
        }

        let fate = trajectory.trace(system, start, policy.max_iterations, rng);
        let channel = match policy.routing.route(fate) {
            Some(channel) => channel,
            None => return,
        };

        match policy.plot {
            Plot::Orbit => {
                for (k, state) in trajectory.states().iter().enumerate() {
                    draw(system, view, policy, hits, channel, k, state);
                }
            }
            Plot::EscapeTime => {
                let value = match (fate, trajectory.last()) {
                    (Fate::Escaped(steps), Some(last)) => system.escape_value(last, steps),
                    _ => fate.steps() as f64,
                };
                view.deposit(policy.projection, &point, value, |offset, w| {
                    hits.add(channel, offset, w)
                });
            }
        }
    }

    /// Seed and trace every orbit belonging to one sample pixel.
    pub fn sample_pixel(&mut self, pixel: Pixel) {
        for _ in 0..self.policy.sub_pixels {
            let (fx, fy) = match self.policy.jitter {
                Jitter::Uniform => (self.rng.gen::<f64>(), self.rng.gen::<f64>()),
                Jitter::Center => (0.5, 0.5),
            };
            let point = self.samples.footprint_point(&pixel, fx, fy);
            self.sample_point(point);
        }
    }

    /// Sample a whole row, handing the staged hits to `emit` after each
    /// pixel.  Stops early, returning false, as soon as `emit` does.
    pub fn sample_row<F>(&mut self, row: usize, mut emit: F) -> bool
    where
        F: FnMut(Batch) -> bool,
    {
        for column in 0..self.samples.width() {
            self.sample_pixel(Pixel(column, row));
            for batch in self.hits.drain() {
                if !emit(batch) {
                    return false;
                }
            }
        }
        true
    }

    /// Whatever is staged and not yet handed out.
    pub fn drain(&mut self) -> Vec<Batch> {
        self.hits.drain()
    }
}
