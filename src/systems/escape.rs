// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Escape maps: iterated functions on the complex plane whose orbits
//! either run away past some radius or stay bounded forever.
//!
//! The Mandelbrot iteration keeps `c` fixed per orbit and starts from
//! zero, so its state carries both numbers.  The other maps here keep
//! `c` as a parameter of the map and start from the sample point
//! itself, which is the Julia-set arrangement.

use num::Complex;
use rand::Rng;
use std::f64::consts::PI;

use super::DynamicalSystem;

/// `z -> z^N + C`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PowerMap {
    /// The exponent N.  Whole exponents use repeated multiplication.
    pub exponent: f64,
    /// The additive constant C.
    pub c: Complex<f64>,
}

impl PowerMap {
    /// Constructor.
    pub fn new(exponent: f64, c: Complex<f64>) -> Self {
        PowerMap { exponent, c }
    }

    /// Apply the map once.
    pub fn apply(&self, z: Complex<f64>) -> Complex<f64> {
        let n = self.exponent;
        let power = if n.fract() == 0.0 && n.abs() <= f64::from(i32::MAX) {
            z.powi(n as i32)
        } else {
            z.powf(n)
        };
        power + self.c
    }
}

/// `z -> z * multiply + add`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Linear {
    /// Scale and rotation.
    pub multiply: Complex<f64>,
    /// Translation.
    pub add: Complex<f64>,
}

impl Linear {
    /// Apply the transform once.
    pub fn apply(&self, z: Complex<f64>) -> Complex<f64> {
        z * self.multiply + self.add
    }
}

/// A Julia-style escape map.  The power maps are applied in turn, one
/// per step, so two maps alternate between even and odd steps.  Each
/// step may then be followed by an affine transform and a small random
/// nudge in a uniformly chosen direction.
#[derive(Clone, Debug)]
pub struct EscapeMap {
    maps: Vec<PowerMap>,
    post: Option<Linear>,
    jitter: f64,
    escape_radius: f64,
}

impl EscapeMap {
    /// A single power map that escapes at `escape_radius`.
    pub fn new(map: PowerMap, escape_radius: f64) -> Self {
        EscapeMap {
            maps: vec![map],
            post: None,
            jitter: 0.0,
            escape_radius,
        }
    }

    /// A Julia set of `z^N + C`, escaping at the largest radius whose
    /// N-th power still fits in an f64.  The large radius keeps the
    /// smooth escape value, `log(log|z|)`, well behaved.
    pub fn julia(exponent: f64, c: Complex<f64>) -> Self {
        EscapeMap::new(PowerMap::new(exponent, c), f64::MAX.powf(1.0 / exponent))
    }

    /// Add a map to the rotation.
    pub fn alternating(mut self, map: PowerMap) -> Self {
        self.maps.push(map);
        self
    }

    /// Follow every step with `post`.
    pub fn with_post(mut self, post: Linear) -> Self {
        self.post = Some(post);
        self
    }

    /// Nudge every step by up to `radius` in a random direction.
    pub fn with_jitter(mut self, radius: f64) -> Self {
        self.jitter = radius.max(0.0);
        self
    }

    /// The radius past which an orbit counts as escaped.
    pub fn escape_radius(&self) -> f64 {
        self.escape_radius
    }
}

impl DynamicalSystem for EscapeMap {
    type State = Complex<f64>;

    fn start<R: Rng + ?Sized>(&self, point: Complex<f64>, _rng: &mut R) -> Complex<f64> {
        point
    }

    fn next<R: Rng + ?Sized>(&self, z: Complex<f64>, step: usize, rng: &mut R) -> Complex<f64> {
        let mut z = self.maps[step % self.maps.len()].apply(z);
        if let Some(post) = self.post {
            z = post.apply(z);
        }
        if self.jitter > 0.0 {
            // sqrt keeps the nudge uniform over the disc.
            let r = self.jitter * rng.gen::<f64>().sqrt();
            z += Complex::from_polar(r, 2.0 * PI * rng.gen::<f64>());
        }
        z
    }

    fn is_terminal(&self, z: &Complex<f64>, _steps: usize) -> bool {
        // NaN compares false, so diverged orbits land here too.
        !(z.norm() < self.escape_radius)
    }

    fn position(&self, z: &Complex<f64>) -> Complex<f64> {
        *z
    }

    fn escape_value(&self, z: &Complex<f64>, steps: usize) -> f64 {
        let n = self.maps[0].exponent;
        let smooth = steps as f64 + 1.0 - z.norm().ln().ln() / n.ln();
        if smooth.is_finite() {
            smooth
        } else {
            steps as f64
        }
    }
}

/// The state of a Mandelbrot orbit: the running value and the point
/// that seeded it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MandelbrotState {
    /// The running value, starting at zero.
    pub z: Complex<f64>,
    /// The seed point.
    pub c: Complex<f64>,
}

/// The classic `z -> z^2 + c`, starting at zero, escaping at |z| = 2.
/// Plotting the orbits of the points that escape gives the Buddhabrot.
#[derive(Copy, Clone, Debug, Default)]
pub struct Mandelbrot;

const D4: f64 = 1.0 / 4.0;
const D16: f64 = D4 / 4.0;

/// A quick test against the two regions of the Mandelbrot set known
/// never to escape: the main cardioid and the period-2 bulb.  False
/// means the point certainly lies in one of them.  True only means it
/// lies in neither; it may still be inside the set and has to be
/// iterated to find out.
pub fn maybe_outside(point: Complex<f64>) -> bool {
    let y = point.im.powi(2);
    let q = y + (point.re - D4).powi(2);
    q * (q + point.re - D4) > (y * D4) && (point.re + 1.0_f64).powi(2) + y > D16
}

impl DynamicalSystem for Mandelbrot {
    type State = MandelbrotState;

    fn start<R: Rng + ?Sized>(&self, point: Complex<f64>, _rng: &mut R) -> MandelbrotState {
        MandelbrotState {
            z: Complex::new(0.0, 0.0),
            c: point,
        }
    }

    fn next<R: Rng + ?Sized>(&self, s: MandelbrotState, _step: usize, _rng: &mut R) -> MandelbrotState {
        MandelbrotState {
            z: s.z * s.z + s.c,
            c: s.c,
        }
    }

    fn is_terminal(&self, s: &MandelbrotState, _steps: usize) -> bool {
        !(s.z.norm_sqr() < 4.0)
    }

    fn position(&self, s: &MandelbrotState) -> Complex<f64> {
        s.z
    }

    fn never_terminates(&self, s: &MandelbrotState) -> bool {
        !maybe_outside(s.c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn whole_exponents_match_repeated_multiplication() {
        let z = Complex::new(0.3, -0.4);
        let map = PowerMap::new(3.0, Complex::new(0.1, 0.2));
        let expected = z * z * z + Complex::new(0.1, 0.2);
        assert!((map.apply(z) - expected).norm() < 1e-15);
    }

    #[test]
    fn fractional_exponents_fall_back_to_powf() {
        let z = Complex::new(4.0, 0.0);
        let map = PowerMap::new(0.5, Complex::new(0.0, 0.0));
        assert!((map.apply(z) - Complex::new(2.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn maps_alternate_by_step() {
        let system = EscapeMap::new(PowerMap::new(1.0, Complex::new(1.0, 0.0)), 100.0)
            .alternating(PowerMap::new(1.0, Complex::new(10.0, 0.0)));
        let mut rng = rng();
        let mut z = system.start(Complex::new(0.0, 0.0), &mut rng);
        let mut seen = vec![];
        for step in 0..3 {
            z = system.next(z, step, &mut rng);
            seen.push(z.re);
        }
        assert_eq!(seen, vec![1.0, 11.0, 12.0]);
    }

    #[test]
    fn post_transform_follows_the_power_map() {
        let system = EscapeMap::new(PowerMap::new(2.0, Complex::new(1.0, 0.0)), 100.0).with_post(Linear {
            multiply: Complex::new(0.0, 1.0),
            add: Complex::new(0.5, 0.0),
        });
        let z = system.next(Complex::new(1.0, 0.0), 0, &mut rng());
        assert_eq!(z, Complex::new(0.5, 2.0));
    }

    #[test]
    fn jitter_stays_inside_its_radius() {
        let system = EscapeMap::new(PowerMap::new(1.0, Complex::new(0.0, 0.0)), 100.0).with_jitter(0.25);
        let mut rng = rng();
        let start = Complex::new(1.0, 1.0);
        let mut moved = false;
        for step in 0..1000 {
            let z = system.next(start, step, &mut rng);
            assert!((z - start).norm() <= 0.25 + 1e-12);
            moved |= z != start;
        }
        assert!(moved);
    }

    #[test]
    fn escape_is_checked_against_the_radius() {
        let system = EscapeMap::new(PowerMap::new(2.0, Complex::new(0.0, 0.0)), 10.0);
        assert!(!system.is_terminal(&Complex::new(9.9, 0.0), 1));
        assert!(system.is_terminal(&Complex::new(10.0, 0.0), 1));
        assert!(system.is_terminal(&Complex::new(f64::INFINITY, 0.0), 1));
        assert!(system.is_terminal(&Complex::new(f64::NAN, 0.0), 1));
    }

    #[test]
    fn points_beyond_the_radius_escape_after_one_step() {
        let system = EscapeMap::new(PowerMap::new(2.0, Complex::new(0.09, -0.575)), 10.0);
        let mut rng = rng();
        let z0 = system.start(Complex::new(12.0, 3.0), &mut rng);
        let z1 = system.next(z0, 0, &mut rng);
        assert!(system.is_terminal(&z1, 1));
    }

    #[test]
    fn julia_radius_keeps_the_power_finite() {
        let system = EscapeMap::julia(6.0, Complex::new(0.7, 0.42));
        let r = system.escape_radius();
        assert!(r.is_finite());
        assert!(r > 1.0e50);
    }

    #[test]
    fn smooth_escape_value_follows_the_log_log_formula() {
        let system = EscapeMap::julia(6.0, Complex::new(0.7, 0.42));
        let z = Complex::new(1.0e10, 0.0);
        let expected = 12.0 + 1.0 - (1.0e10_f64).ln().ln() / 6.0_f64.ln();
        assert!((system.escape_value(&z, 12) - expected).abs() < 1e-12);
        // No smooth value exists inside the unit circle.
        assert_eq!(system.escape_value(&Complex::new(0.5, 0.0), 3), 3.0);
    }

    #[test]
    fn cardioid_and_bulb_are_skipped() {
        let mut rng = rng();
        for c in &[Complex::new(0.0, 0.0), Complex::new(-1.0, 0.0), Complex::new(0.1, 0.1)] {
            let state = Mandelbrot.start(*c, &mut rng);
            assert!(Mandelbrot.never_terminates(&state), "{}", c);
        }
        let state = Mandelbrot.start(Complex::new(1.0, 0.0), &mut rng);
        assert!(!Mandelbrot.never_terminates(&state));
    }

    #[test]
    fn mandelbrot_orbits_start_at_zero() {
        let mut rng = rng();
        let mut state = Mandelbrot.start(Complex::new(1.0, 0.0), &mut rng);
        assert_eq!(Mandelbrot.position(&state), Complex::new(0.0, 0.0));
        state = Mandelbrot.next(state, 0, &mut rng);
        assert_eq!(state.z, Complex::new(1.0, 0.0));
        assert!(!Mandelbrot.is_terminal(&state, 1));
        state = Mandelbrot.next(state, 1, &mut rng);
        assert_eq!(state.z, Complex::new(2.0, 0.0));
        assert!(Mandelbrot.is_terminal(&state, 2));
    }
}
