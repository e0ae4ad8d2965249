// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Turning frozen histograms into color.
//!
//! Histograms have no upper bound; pixels do.  A [`ToneCurve`]
//! compresses the range with a power law and normalizes against the
//! brightest cell, and a [`Colorizer`] decides what the normalized
//! values look like.  The colorizers are interchangeable: each renderer
//! picks one through a [`ColorScheme`].

use itertools::Itertools;

use crate::accumulator::Histogram;
use crate::error::{RenderError, Result};

/// The largest value a 16-bit channel holds.
pub const CHANNEL_MAX: f64 = 65535.0;

/// A compressive power-law curve.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ToneCurve {
    /// Exponent applied to every cell.  Below one, faint cells are
    /// lifted relative to bright ones.
    pub gamma: f64,
}

impl Default for ToneCurve {
    fn default() -> Self {
        ToneCurve { gamma: 1.0 }
    }
}

impl ToneCurve {
    /// A curve with exponent `gamma`.
    pub fn new(gamma: f64) -> Self {
        ToneCurve { gamma }
    }

    /// Curve one value.
    pub fn apply(&self, value: f64) -> f64 {
        if value <= 0.0 {
            0.0
        } else if self.gamma == 1.0 {
            value
        } else {
            value.powf(self.gamma)
        }
    }

    /// Curve every cell of a histogram and scale so that the brightest
    /// becomes one.
    pub fn map(&self, histogram: &Histogram) -> Vec<f64> {
        let curved: Vec<f64> = histogram.cells().iter().map(|&h| self.apply(h)).collect();
        normalize(&curved)
    }
}

/// Divide by the largest value, or by one if nothing is positive, so
/// that an empty histogram stays black instead of turning into NaN.
/// Normalizing something already normalized changes nothing.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let max = values.iter().cloned().fold(0.0, f64::max);
    let max = if max > 0.0 { max } else { 1.0 };
    values.iter().map(|v| v / max).collect()
}

/// The blue channel's excess spills into green, and green's into red.
/// Red clips.  Inputs are in channel units; the result, as `[red,
/// green, blue]`, never leaves `0..=CHANNEL_MAX`.
pub fn bleed(blue: f64, green: f64) -> [f64; 3] {
    let blue = blue.max(0.0);
    let green = green.max(0.0) + (blue - CHANNEL_MAX).max(0.0);
    let red = (green - CHANNEL_MAX).max(0.0);
    [red.min(CHANNEL_MAX), green.min(CHANNEL_MAX), blue.min(CHANNEL_MAX)]
}

/// The heat palette: black through blue, magenta and pink to white as
/// `p` runs from zero to one.
pub fn heat(p: f64) -> [u16; 3] {
    let y = CHANNEL_MAX * p.max(0.0) * 2.0;
    let (r, g, b) = if y < CHANNEL_MAX {
        (0.0, 0.0, y)
    } else if y < 1.5 * CHANNEL_MAX {
        (2.0 * (y - CHANNEL_MAX), 0.0, CHANNEL_MAX)
    } else if y < 2.0 * CHANNEL_MAX {
        (CHANNEL_MAX, 2.0 * (y - 1.5 * CHANNEL_MAX), CHANNEL_MAX)
    } else {
        (CHANNEL_MAX, CHANNEL_MAX, CHANNEL_MAX)
    };
    [channel(r), channel(g), channel(b)]
}

fn channel(value: f64) -> u16 {
    if value.is_nan() {
        return 0;
    }
    value.max(0.0).min(CHANNEL_MAX) as u16
}

/// A finished RGBA image with 16 bits per channel.  There is no way to
/// change one once it is built.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorBuffer {
    width: usize,
    height: usize,
    pixels: Vec<[u16; 4]>,
}

impl ColorBuffer {
    /// Wrap `pixels`, row by row.
    pub fn new(width: usize, height: usize, pixels: Vec<[u16; 4]>) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(RenderError::InvalidConfig(format!(
                "{} pixels do not fill a {}x{} image",
                pixels.len(),
                width,
                height
            )));
        }
        Ok(ColorBuffer {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Every pixel, row by row.
    pub fn pixels(&self) -> &[[u16; 4]] {
        &self.pixels
    }

    /// The pixel at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> Option<[u16; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y * self.width + x])
    }

    /// Interleaved RGBA, 16 bits per channel.
    pub fn to_rgba16(&self) -> Vec<u16> {
        self.pixels.iter().flat_map(|p| p.iter().cloned()).collect()
    }

    /// Interleaved RGBA, 8 bits per channel.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| p.iter().map(|&c| (c >> 8) as u8)).collect()
    }

    /// Luma, 16 bits per pixel.
    pub fn to_gray16(&self) -> Vec<u16> {
        self.pixels.iter().map(|&p| luma(p)).collect()
    }

    /// Luma, 8 bits per pixel.
    pub fn to_gray8(&self) -> Vec<u8> {
        self.pixels.iter().map(|&p| (luma(p) >> 8) as u8).collect()
    }
}

// Rec. 601 weights; gray pixels come back unchanged.
fn luma(p: [u16; 4]) -> u16 {
    let [r, g, b, _] = p;
    let y = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    channel(y.round())
}

/// Something that can paint frozen histograms.
pub trait Colorizer: Send + Sync {
    /// Paint.  The histograms are the channels of one render, all of
    /// the same size.
    fn colorize(&self, histograms: &[Histogram]) -> Result<ColorBuffer>;
}

fn first(histograms: &[Histogram]) -> Result<&Histogram> {
    histograms
        .first()
        .ok_or_else(|| RenderError::InvalidConfig("there is no histogram to color".to_string()))
}

/// One channel, tinted.  A white tint gives plain grayscale.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Monochrome {
    /// Compression applied before coloring.
    pub curve: ToneCurve,
    /// Red, green and blue of the brightest cell.
    pub tint: [u16; 3],
}

impl Monochrome {
    /// Plain grayscale.
    pub fn gray(curve: ToneCurve) -> Self {
        Monochrome {
            curve,
            tint: [u16::MAX; 3],
        }
    }
}

impl Colorizer for Monochrome {
    fn colorize(&self, histograms: &[Histogram]) -> Result<ColorBuffer> {
        let histogram = first(histograms)?;
        let pixels = self
            .curve
            .map(histogram)
            .into_iter()
            .map(|v| {
                let [r, g, b] = self.tint;
                [
                    channel(v * f64::from(r)),
                    channel(v * f64::from(g)),
                    channel(v * f64::from(b)),
                    u16::MAX,
                ]
            })
            .collect();
        ColorBuffer::new(histogram.width(), histogram.height(), pixels)
    }
}

/// Two channels: the first drawn in blue, the second in green, each
/// normalized on its own and multiplied by `gain`.  Whatever a channel
/// cannot hold glows into the next one up instead of clipping.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bleed {
    /// Compression applied to each channel before coloring.
    pub curve: ToneCurve,
    /// Brightness multiplier.  Above one, the brightest cells bleed.
    pub gain: f64,
}

impl Colorizer for Bleed {
    fn colorize(&self, histograms: &[Histogram]) -> Result<ColorBuffer> {
        let blue = first(histograms)?;
        let blues = self.curve.map(blue);
        let greens = match histograms.get(1) {
            Some(green) => self.curve.map(green),
            None => vec![0.0; blues.len()],
        };
        let scale = CHANNEL_MAX * self.gain;
        let pixels = blues
            .iter()
            .zip(greens.iter())
            .map(|(b, g)| {
                let [r, g, b] = bleed(b * scale, g * scale);
                [channel(r), channel(g), channel(b), u16::MAX]
            })
            .collect();
        ColorBuffer::new(blue.width(), blue.height(), pixels)
    }
}

/// The heat palette, indexed by each cell's rank among the distinct
/// values of the histogram rather than by the value itself.  A few
/// extremely bright cells cannot wash the rest of the image out.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RankHeat;

impl Colorizer for RankHeat {
    fn colorize(&self, histograms: &[Histogram]) -> Result<ColorBuffer> {
        let histogram = first(histograms)?;
        let distinct: Vec<f64> = histogram
            .cells()
            .iter()
            .cloned()
            .sorted_by(|a, b| a.total_cmp(b))
            .dedup()
            .collect();
        let count = distinct.len().max(1) as f64;
        let pixels = histogram
            .cells()
            .iter()
            .map(|v| {
                let rank = distinct
                    .binary_search_by(|probe| probe.total_cmp(v))
                    .unwrap_or_else(|i| i);
                let [r, g, b] = heat(rank as f64 / count);
                [r, g, b, u16::MAX]
            })
            .collect();
        ColorBuffer::new(histogram.width(), histogram.height(), pixels)
    }
}

/// The color policies a renderer can pick from.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ColorScheme {
    /// Grayscale.
    Gray,
    /// One channel in a single hue.
    Tint([u16; 3]),
    /// Blue and green with overflow bleed.
    Bleed {
        /// Brightness multiplier.
        gain: f64,
    },
    /// Rank-ordered heat palette.
    Heat,
}

impl ColorScheme {
    /// The colorizer for this scheme.  The heat palette works on ranks
    /// and ignores the curve.
    pub fn colorizer(self, curve: ToneCurve) -> Box<dyn Colorizer> {
        match self {
            ColorScheme::Gray => Box::new(Monochrome::gray(curve)),
            ColorScheme::Tint(tint) => Box::new(Monochrome { curve, tint }),
            ColorScheme::Bleed { gain } => Box::new(Bleed { curve, gain }),
            ColorScheme::Heat => Box::new(RankHeat),
        }
    }
}
