// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The dynamical systems the renderers iterate.
//!
//! A system is a pure rule for getting from one state to the next.
//! It owns no per-orbit data: the state is passed in and a new state
//! is handed back, so one system value can be shared by every
//! sampling thread.  Systems that need chance (jitter, kicks, branch
//! choices) draw from the generator they are given, which belongs to
//! the calling thread.

use num::Complex;
use rand::Rng;

pub mod escape;
pub mod oscillator;
pub mod tree;

pub use self::escape::{EscapeMap, Linear, Mandelbrot, PowerMap};
pub use self::oscillator::{Duffing, Oscillator};
pub use self::tree::{NodeId, Tree, TreeWalk};

/// A rule for iterating a point.
pub trait DynamicalSystem: Sync {
    /// Whatever the system needs to remember between steps.
    type State: Copy + Send;

    /// The state an orbit begins in when seeded from `point`, a
    /// location on the sample plane.
    fn start<R: Rng + ?Sized>(&self, point: Complex<f64>, rng: &mut R) -> Self::State;

    /// Advance one step.  `step` counts the steps already taken by
    /// this orbit.
    fn next<R: Rng + ?Sized>(&self, state: Self::State, step: usize, rng: &mut R) -> Self::State;

    /// Whether the orbit is finished after `steps` steps.  Systems
    /// must treat a state that has overflowed to infinity or NaN as
    /// finished.
    fn is_terminal(&self, state: &Self::State, steps: usize) -> bool;

    /// Where the state lands on the plane being drawn.
    fn position(&self, state: &Self::State) -> Complex<f64>;

    /// Whether an orbit starting in `state` is already known never to
    /// terminate, so that tracing it would be wasted work.
    fn never_terminates(&self, _state: &Self::State) -> bool {
        false
    }

    /// The brightness escape-time rendering assigns to an orbit that
    /// terminated in `state` after `steps` steps.
    fn escape_value(&self, _state: &Self::State, steps: usize) -> f64 {
        steps as f64
    }
}
