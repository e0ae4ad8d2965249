// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A periodically driven, damped, nonlinear oscillator, sampled once
//! per forcing period.  Plotting those samples gives a Poincaré
//! section of the flow: a strange attractor when the forcing is strong
//! enough.
//!
//! Every step is kept; nothing escapes.  A long orbit can settle onto
//! a single periodic cycle, so each step gives the state a small random
//! kick to keep it wandering over the whole attractor.

use num::Complex;
use rand::Rng;
use std::f64::consts::PI;

use super::DynamicalSystem;

/// `y'' + delta y' + alpha y + beta y^3 = gamma cos(omega t)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Duffing {
    /// Damping.
    pub delta: f64,
    /// Linear stiffness.
    pub alpha: f64,
    /// Cubic stiffness.
    pub beta: f64,
    /// Forcing amplitude.
    pub gamma: f64,
    /// Forcing frequency.
    pub omega: f64,
}

impl Default for Duffing {
    fn default() -> Self {
        Duffing {
            delta: 0.018,
            alpha: 0.22,
            beta: 3.3,
            gamma: 32.657,
            omega: 2.03,
        }
    }
}

impl Duffing {
    /// `y''` at time `t`, displacement `y` and velocity `yp`.
    pub fn acceleration(&self, t: f64, y: f64, yp: f64) -> f64 {
        self.gamma * (self.omega * t).cos() - self.delta * yp - self.alpha * y - self.beta * y.powi(3)
    }

    /// The length of one forcing cycle.
    pub fn period(&self) -> f64 {
        2.0 * PI / self.omega
    }
}

/// One classical Runge-Kutta step of `y'' = f(t, y, y')`.
pub fn rk4_step<F>(f: &F, t: f64, y: f64, yp: f64, h: f64) -> (f64, f64)
where
    F: Fn(f64, f64, f64) -> f64,
{
    let half = 0.5 * h;

    let (k1y, k1v) = (yp, f(t, y, yp));
    let (k2y, k2v) = (yp + half * k1v, f(t + half, y + half * k1y, yp + half * k1v));
    let (k3y, k3v) = (yp + half * k2v, f(t + half, y + half * k2y, yp + half * k2v));
    let (k4y, k4v) = (yp + h * k3v, f(t + h, y + h * k3y, yp + h * k3v));

    (
        y + h / 6.0 * (k1y + 2.0 * k2y + 2.0 * k3y + k4y),
        yp + h / 6.0 * (k1v + 2.0 * k2v + 2.0 * k3v + k4v),
    )
}

/// Carry `(y, y')` from `t0` to `t0 + span` in `substeps` equal RK4 steps.
pub fn integrate<F>(f: &F, t0: f64, y: f64, yp: f64, span: f64, substeps: usize) -> (f64, f64)
where
    F: Fn(f64, f64, f64) -> f64,
{
    let substeps = substeps.max(1);
    let h = span / substeps as f64;
    (0..substeps).fold((y, yp), |(y, yp), i| rk4_step(f, t0 + i as f64 * h, y, yp, h))
}

/// A point in phase space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PhasePoint {
    /// Displacement.
    pub y: f64,
    /// Velocity.
    pub yp: f64,
}

/// The stroboscopic map of a [`Duffing`] oscillator.
///
/// Positions are reported with velocity on the real axis and
/// displacement on the imaginary axis, and orbits seeded from a sample
/// point read it the same way.
#[derive(Copy, Clone, Debug)]
pub struct Oscillator {
    /// The equation being integrated.
    pub equation: Duffing,
    /// RK4 steps per forcing period.
    pub substeps: usize,
    /// Largest random nudge applied after each period, as (velocity,
    /// displacement).  One pixel of the view in each direction works
    /// well.
    pub kick: (f64, f64),
}

impl Oscillator {
    /// An oscillator integrated with 50 steps per period and no kicks.
    pub fn new(equation: Duffing) -> Self {
        Oscillator {
            equation,
            substeps: 50,
            kick: (0.0, 0.0),
        }
    }

    /// Set the largest kick.
    pub fn with_kick(mut self, velocity: f64, displacement: f64) -> Self {
        self.kick = (velocity.abs(), displacement.abs());
        self
    }
}

impl DynamicalSystem for Oscillator {
    type State = PhasePoint;

    fn start<R: Rng + ?Sized>(&self, point: Complex<f64>, _rng: &mut R) -> PhasePoint {
        PhasePoint {
            y: point.im,
            yp: point.re,
        }
    }

    fn next<R: Rng + ?Sized>(&self, state: PhasePoint, _step: usize, rng: &mut R) -> PhasePoint {
        let equation = self.equation;
        let accel = move |t: f64, y: f64, yp: f64| equation.acceleration(t, y, yp);
        // The forcing repeats every period, so each period can start at t = 0.
        let (y, yp) = integrate(&accel, 0.0, state.y, state.yp, equation.period(), self.substeps);
        PhasePoint {
            y: y + (rng.gen::<f64>() - 0.5) * 2.0 * self.kick.1,
            yp: yp + (rng.gen::<f64>() - 0.5) * 2.0 * self.kick.0,
        }
    }

    fn is_terminal(&self, state: &PhasePoint, _steps: usize) -> bool {
        !(state.y.is_finite() && state.yp.is_finite())
    }

    fn position(&self, state: &PhasePoint) -> Complex<f64> {
        Complex::new(state.yp, state.y)
    }
}
