#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Orbit plotter
//!
//! The Buddhabrot takes the points that escape the Mandelbrot set
//! and, instead of coloring them by how fast they escape, plots every
//! point their orbit passes through on the way out.  Millions of
//! orbits later, the pixel counts form a picture.
//!
//! This crate does the same thing for any iterated system.  A
//! [`DynamicalSystem`] says how to get from one state to the next and
//! when to stop; the [`pipeline`] seeds orbits across a sample plane
//! on every core, projects each point onto the canvas (optionally
//! sharing it between the four nearest pixels), and sums the results
//! on a single thread into frozen [`Histogram`]s.  The [`tone`] module
//! squeezes those unbounded counts into color, and [`sink`] writes
//! the image.
//!
//! The [`presets`] module packages five renderers: the Buddhabrot, an
//! alternating escape map, a smooth-shaded Julia set, the Poincaré
//! section of a driven Duffing oscillator, and a random walk over an
//! IFS tree.

pub mod accumulator;
pub mod error;
pub mod pipeline;
pub mod planes;
pub mod presets;
pub mod sampler;
pub mod sink;
pub mod systems;
pub mod tone;

pub use accumulator::{Accumulator, Histogram};
pub use error::{RenderError, Result};
pub use pipeline::{render, CancelToken, RenderConfig, Rendered};
pub use planes::{Pixel, PlaneMapper, Projection};
pub use presets::Scene;
pub use sampler::SamplePolicy;
pub use sink::{write_image, PixelFormat};
pub use systems::DynamicalSystem;
pub use tone::{ColorBuffer, ColorScheme, Colorizer, ToneCurve};
