// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The renderers, as ready-made scenes.
//!
//! Each function here returns a [`Scene`]: a system, the planes and
//! policy to sample it with, and how to color and store the result.
//! The defaults reproduce the stock pictures; every field is public so
//! that callers (the `orbits` binary, mostly) can override any of them
//! before rendering.

use std::path::Path;

use num::Complex;
use rand::Rng;
use tracing::info;

use crate::accumulator::Histogram;
use crate::error::{RenderError, Result};
use crate::pipeline::{render, CancelToken, RenderConfig, Rendered};
use crate::planes::{PlaneMapper, Projection};
use crate::sampler::{Brightness, Jitter, Plot, Routing, SamplePolicy};
use crate::sink::{write_image, PixelFormat};
use crate::systems::{DynamicalSystem, Duffing, EscapeMap, Mandelbrot, Oscillator, PowerMap, Tree, TreeWalk};
use crate::tone::{ColorBuffer, ColorScheme, ToneCurve};

/// Something to draw and how to draw it.
#[derive(Clone, Debug)]
pub struct Scene<S> {
    /// The system whose orbits are drawn.
    pub system: S,
    /// Planes, sampling policy and threading.
    pub config: RenderConfig,
    /// Range compression before coloring.
    pub curve: ToneCurve,
    /// How the histograms become color.
    pub color: ColorScheme,
    /// Layout of the written file.
    pub format: PixelFormat,
}

impl<S: DynamicalSystem> Scene<S> {
    /// Sample and color the scene.
    pub fn render(&self, cancel: &CancelToken) -> Result<(Rendered, ColorBuffer)> {
        let rendered = render(&self.system, &self.config, cancel)?;
        let peaks: Vec<f64> = rendered.histograms.iter().map(Histogram::max).collect();
        info!(?peaks, gamma = self.curve.gamma, color = ?self.color, "tone mapping");
        let buffer = self.color.colorizer(self.curve).colorize(&rendered.histograms)?;
        Ok((rendered, buffer))
    }

    /// Sample, color and write the scene to `path`.
    pub fn render_to<P: AsRef<Path>>(&self, path: P, cancel: &CancelToken) -> Result<Rendered> {
        let (rendered, buffer) = self.render(cancel)?;
        write_image(path, &buffer, self.format)?;
        Ok(rendered)
    }
}

/// The Buddhabrot: every orbit of `z^2 + c` that escapes, drawn over
/// the rectangle between `leftlower` and `rightupper`.
pub fn buddha(
    width: usize,
    height: usize,
    leftlower: Complex<f64>,
    rightupper: Complex<f64>,
) -> Result<Scene<Mandelbrot>> {
    let view = PlaneMapper::new(width, height, leftlower, rightupper)?;
    let policy = SamplePolicy {
        sub_pixels: 1,
        max_iterations: 2000,
        routing: Routing::Escaped { below: usize::MAX },
        projection: Projection::Nearest,
        ..SamplePolicy::default()
    };
    Ok(Scene {
        system: Mandelbrot,
        config: RenderConfig::new(view, policy),
        curve: ToneCurve::new(0.5),
        color: ColorScheme::Gray,
        format: PixelFormat::Gray8,
    })
}

/// Orbits of a map that alternates between `z^N + c` and
/// `z^(N+1) + c`, seeded over a wide region and viewed up close.
/// Orbits escaping in under 20 steps glow blue, later ones green.
pub fn escape(width: usize, height: usize, exponent: f64, c: Complex<f64>) -> Result<Scene<EscapeMap>> {
    let system = EscapeMap::new(PowerMap::new(exponent, c), 10.0).alternating(PowerMap::new(exponent + 1.0, c));
    let view = PlaneMapper::centered(width, height, Complex::new(0.0, -0.6), 1.2)?;
    // Seeds cover -4..4 on the real axis and start at -4 on the
    // imaginary one, which stretches with the aspect ratio.
    let aspect = width as f64 / height.max(1) as f64;
    let samples = PlaneMapper::new(width, height, Complex::new(-4.0, -4.0), Complex::new(4.0, -4.0 + 8.0 * aspect))?;
    let policy = SamplePolicy {
        sub_pixels: 1000,
        max_iterations: 100,
        jitter: Jitter::Uniform,
        routing: Routing::Split {
            early_below: 20,
            keep_bounded: false,
        },
        projection: Projection::Bilinear,
        brightness: Brightness::Ramp { step: 0.1, cap: 1.0 },
        ..SamplePolicy::default()
    };
    Ok(Scene {
        system,
        config: RenderConfig::new(view, policy).with_samples(samples),
        curve: ToneCurve::new(0.2),
        color: ColorScheme::Bleed { gain: 2.5 },
        format: PixelFormat::Rgba16,
    })
}

/// The filled Julia set of `z^N + c`, shaded by smooth escape time in
/// light blue.
pub fn julia(width: usize, height: usize, exponent: f64, c: Complex<f64>) -> Result<Scene<EscapeMap>> {
    let view = PlaneMapper::centered(width, height, Complex::new(0.0, 0.0), 2.25)?;
    let policy = SamplePolicy {
        sub_pixels: 10,
        max_iterations: 1000,
        routing: Routing::Escaped { below: usize::MAX },
        plot: Plot::EscapeTime,
        projection: Projection::Nearest,
        ..SamplePolicy::default()
    };
    Ok(Scene {
        system: EscapeMap::julia(exponent, c),
        config: RenderConfig::new(view, policy),
        curve: ToneCurve::default(),
        color: ColorScheme::Tint([0x7fff, 0xafff, 0xffff]),
        format: PixelFormat::Rgba16,
    })
}

/// The Poincaré section of a driven Duffing oscillator, plotted as
/// velocity across and displacement up.  One long orbit is seeded per
/// worker thread; their first 10 000 periods are discarded while they
/// settle onto the attractor.
pub fn poincare(width: usize, height: usize, equation: Duffing) -> Result<Scene<Oscillator>> {
    let view = PlaneMapper::new(width, height, Complex::new(-30.0, 0.2), Complex::new(30.0, 4.0))?;
    let (dx, dy) = view.pixel_size();
    let policy = SamplePolicy {
        sub_pixels: 1,
        max_iterations: 110_000,
        warmup: 10_000,
        routing: Routing::All,
        projection: Projection::Nearest,
        ..SamplePolicy::default()
    };
    let config = RenderConfig::new(view, policy);
    // Each orbit is one row, and rows are what the workers share out.
    let samples = config.view.with_resolution(1, config.workers)?;
    Ok(Scene {
        system: Oscillator::new(equation).with_kick(dx, dy),
        config: config.with_samples(samples),
        curve: ToneCurve::default(),
        color: ColorScheme::Heat,
        format: PixelFormat::Rgba16,
    })
}

/// The shapes of tree the `tree` renderer can grow.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TreeShape {
    /// Even splits, both branches turning by the same angle.
    Symmetric,
    /// A fixed uneven split at every junction.
    Balanced,
    /// A different random split at every junction.
    Random,
}

/// Deepest random tree that can be grown.  Random junctions are not
/// shared, so a random tree of `n` layers holds `2^n - 1` of them.
pub const MAX_RANDOM_LAYERS: usize = 20;

impl TreeShape {
    /// Grow a tree of this shape and stand it on a trunk.  `left_p`
    /// only matters for [`TreeShape::Balanced`] and `angle` not at all
    /// for [`TreeShape::Random`].
    pub fn grow<R: Rng + ?Sized>(self, layers: usize, angle: f64, left_p: f64, rng: &mut R) -> Result<Tree> {
        if !(left_p > 0.0 && left_p < 1.0) {
            return Err(RenderError::InvalidConfig(format!(
                "the left branch probability {} is not strictly between 0 and 1",
                left_p
            )));
        }
        let crown = match self {
            TreeShape::Symmetric => Tree::symmetric(layers, angle),
            TreeShape::Balanced => Tree::balanced_constant(layers, angle, left_p),
            TreeShape::Random if layers > MAX_RANDOM_LAYERS => {
                return Err(RenderError::InvalidConfig(format!(
                    "a random tree of {} layers is too large; at most {} are allowed",
                    layers, MAX_RANDOM_LAYERS
                )));
            }
            TreeShape::Random => Tree::random_balanced(layers, rng),
        };
        Ok(crown.with_trunk())
    }
}

/// A random walk over `tree`, ten million points in all, counted per
/// pixel in 16-bit gray.
pub fn tree(width: usize, height: usize, tree: Tree) -> Result<Scene<TreeWalk>> {
    let view = PlaneMapper::centered(width, height, Complex::new(0.5, 2.5), 6.0)?;
    // Where a walk starts has no effect; the sample plane only sets
    // how many walks there are.  One per row spreads them over up to a
    // hundred workers.
    let samples = view.with_resolution(1, 100)?;
    let policy = SamplePolicy {
        sub_pixels: 1,
        max_iterations: 100_000,
        routing: Routing::All,
        projection: Projection::Nearest,
        ..SamplePolicy::default()
    };
    Ok(Scene {
        system: TreeWalk::new(tree)?,
        config: RenderConfig::new(view, policy).with_samples(samples),
        curve: ToneCurve::default(),
        color: ColorScheme::Gray,
        format: PixelFormat::Gray16,
    })
}
