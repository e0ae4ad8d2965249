// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use num::Complex;
use rand::Rng;

use orbitplot::sampler::{Accumulation, Brightness, Jitter, Routing};
use orbitplot::systems::{EscapeMap, PowerMap};
use orbitplot::tone::{Bleed, Colorizer};
use orbitplot::{
    render, CancelToken, DynamicalSystem, Pixel, PlaneMapper, Projection, RenderConfig, SamplePolicy, ToneCurve,
};

/// Goes nowhere.
struct FixedPoint {
    radius: f64,
}

impl DynamicalSystem for FixedPoint {
    type State = Complex<f64>;

    fn start<R: Rng + ?Sized>(&self, point: Complex<f64>, _rng: &mut R) -> Complex<f64> {
        point
    }

    fn next<R: Rng + ?Sized>(&self, z: Complex<f64>, _step: usize, _rng: &mut R) -> Complex<f64> {
        z
    }

    fn is_terminal(&self, z: &Complex<f64>, _steps: usize) -> bool {
        !(z.norm() < self.radius)
    }

    fn position(&self, z: &Complex<f64>) -> Complex<f64> {
        *z
    }
}

/// Cancels its own render as soon as the first orbit starts.
struct Impatient {
    cancel: CancelToken,
}

impl DynamicalSystem for Impatient {
    type State = Complex<f64>;

    fn start<R: Rng + ?Sized>(&self, point: Complex<f64>, _rng: &mut R) -> Complex<f64> {
        self.cancel.cancel();
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

fn square() -> PlaneMapper {
    PlaneMapper::new(4, 4, Complex::new(-1.0, -1.0), Complex::new(1.0, 1.0)).unwrap()
}

fn centered(sub_pixels: usize, projection: Projection) -> RenderConfig {
    let policy = SamplePolicy {
        sub_pixels,
        max_iterations: 5,
        jitter: Jitter::Center,
        routing: Routing::All,
        projection,
        brightness: Brightness::Flat(1.0),
        accumulation: Accumulation::Raw,
        ..SamplePolicy::default()
    };
    RenderConfig::new(square(), policy).with_workers(3).with_seed(1)
}

#[test]
fn fixed_points_splat_across_their_neighborhood() {
    let rendered = render(&FixedPoint { radius: 100.0 }, &centered(1, Projection::Bilinear), &CancelToken::new()).unwrap();
    assert!(rendered.is_complete());
    let h = &rendered.histograms[0];

    // Pixel centers sit halfway between grid lines, so every point is
    // shared equally by four cells, a quarter of 5 each.  Cells on the
    // top row and left column have fewer neighbors sending to them.
    for y in 0..4 {
        for x in 0..4 {
            let expected = match (x, y) {
                (0, 0) => 1.25,
                (0, _) | (_, 0) => 2.5,
                _ => 5.0,
            };
            assert!((h.get(Pixel(x, y)) - expected).abs() < 1e-12, "({}, {}) = {}", x, y, h.get(Pixel(x, y)));
        }
    }
    assert!((h.total() - 61.25).abs() < 1e-9);
}

#[test]
fn nearest_projection_keeps_each_orbit_on_its_pixel() {
    let rendered = render(&FixedPoint { radius: 100.0 }, &centered(3, Projection::Nearest), &CancelToken::new()).unwrap();
    let h = &rendered.histograms[0];
    assert!(h.cells().iter().all(|&c| c == 15.0));
    assert_eq!(h.total(), 5.0 * 3.0 * 16.0);
}

#[test]
fn averaging_divides_by_the_sample_count() {
    let mut config = centered(4, Projection::Nearest);
    config.policy.accumulation = Accumulation::Average;
    let rendered = render(&FixedPoint { radius: 100.0 }, &config, &CancelToken::new()).unwrap();
    assert!(rendered.histograms[0].cells().iter().all(|&c| (c - 5.0).abs() < 1e-12));
}

#[test]
fn an_identity_escape_map_behaves_like_a_fixed_point() {
    let identity = EscapeMap::new(PowerMap::new(1.0, Complex::new(0.0, 0.0)), 100.0);
    let expected = render(&FixedPoint { radius: 100.0 }, &centered(1, Projection::Bilinear), &CancelToken::new()).unwrap();
    let actual = render(&identity, &centered(1, Projection::Bilinear), &CancelToken::new()).unwrap();
    assert_eq!(expected.histograms, actual.histograms);
}

#[test]
fn escaped_routing_drops_orbits_that_never_leave() {
    let mut config = centered(1, Projection::Nearest);
    config.policy.routing = Routing::Escaped { below: usize::MAX };
    let rendered = render(&FixedPoint { radius: 100.0 }, &config, &CancelToken::new()).unwrap();
    assert_eq!(rendered.histograms[0].total(), 0.0);

    // Now every orbit escapes on its first step.
    let rendered = render(&FixedPoint { radius: 0.1 }, &config, &CancelToken::new()).unwrap();
    assert_eq!(rendered.histograms[0].total(), 16.0);
}

#[test]
fn split_routing_fills_two_channels_that_color_together() {
    let mut config = centered(1, Projection::Nearest);
    config.policy.routing = Routing::Split {
        early_below: 3,
        keep_bounded: true,
    };
    let rendered = render(&FixedPoint { radius: 100.0 }, &config, &CancelToken::new()).unwrap();
    assert_eq!(rendered.histograms.len(), 2);
    assert_eq!(rendered.histograms[0].total(), 0.0);
    assert_eq!(rendered.histograms[1].total(), 80.0);

    let colorizer = Bleed {
        curve: ToneCurve::new(0.2),
        gain: 2.5,
    };
    let buffer = colorizer.colorize(&rendered.histograms).unwrap();
    // Green at two and a half times full scale: green is full and red
    // takes what is left.
    assert_eq!(buffer.get(1, 1), Some([u16::MAX, u16::MAX, 0, u16::MAX]));
}

#[test]
fn cancellation_finishes_the_row_in_progress() {
    let cancel = CancelToken::new();
    let system = Impatient { cancel: cancel.clone() };
    let config = centered(1, Projection::Nearest).with_workers(1);
    let rendered = render(&system, &config, &cancel).unwrap();
    assert_eq!(rendered.rows_completed, 1);
    assert!(!rendered.is_complete());
    assert_eq!(rendered.completeness(), 0.25);
    // The whole first row, and nothing else.
    let h = &rendered.histograms[0];
    assert_eq!(h.total(), 4.0 * 5.0);
    assert!((0..4).all(|x| h.get(Pixel(x, 0)) == 5.0));
}
