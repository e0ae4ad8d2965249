// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the PlaneMapper struct, which describes a relationship
//! between a rectangle on the integral plane with an origin at 0,0 in
//! the upper left (the way images are laid out in memory), and a
//! rectangle on the real plane with an arbitrary pair of corners
//! defining the leftlower and rightupper corners of the real plane.
//!
//! Every renderer uses two of these: one describing where orbits
//! start (the sample plane) and one describing the canvas that orbit
//! points are projected onto (the view).
use num::Complex;

use crate::error::{RenderError, Result};

/// Describes the width and height of an integral plane that is assumed to start at
/// 0,0 and all values are assumed to be non-negative integers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntegralPlane(pub usize, pub usize);

/// Describes the lower-left corner and upper-right corner of the
/// Complex plane, treating the real part of each value as the
/// x-component and the imaginary part of each value as the
/// y-component.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ComplexPlane(pub Complex<f64>, pub Complex<f64>);

/// Describes the column, row of a pixel in a region.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// How a point's unit of brightness lands on the grid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Projection {
    /// All of it goes to the pixel containing the point.
    Nearest,
    /// It is shared among the 2x2 block of pixels surrounding the
    /// point, in proportion to how close the point is to each.
    Bilinear,
}

/// A bilinear splat: the upper-left pixel of a 2x2 neighborhood and
/// the share of brightness each of the four pixels receives, in the
/// order upper-left, upper-right, lower-left, lower-right.
///
/// The upper-left pixel may sit one cell outside the grid (column or
/// row -1), which is why it is signed.  Use [`Splat::cells`] to get
/// only the cells that actually exist.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Splat {
    /// Column of the upper-left cell.
    pub left: isize,
    /// Row of the upper-left cell.
    pub top: isize,
    /// Shares of brightness; they always sum to one.
    pub weights: [f64; 4],
}

const NEIGHBORS: [(isize, isize); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

impl Splat {
    /// The in-bounds cells of the splat as (offset, weight) pairs.
    /// Each of the four candidates is checked on its own, so a splat
    /// straddling an edge yields fewer than four cells.
    pub fn cells(&self, plane: IntegralPlane) -> impl Iterator<Item = (usize, f64)> {
        let Splat { left, top, weights } = *self;
        let IntegralPlane(width, height) = plane;
        (0..4).filter_map(move |i| {
            let (dx, dy) = NEIGHBORS[i];
            let (x, y) = (left + dx, top + dy);
            if x < 0 || y < 0 || x as usize >= width || y as usize >= height {
                return None;
            }
            Some((y as usize * width + x as usize, weights[i]))
        })
    }
}

/// Contains the definitions of two planes: an integral cartesian plane,
/// and a complex, real cartesian plane.  Maps points from one to the
/// other.  'leftlower' may seem ungrammatical, but it fits with our
/// x,y schema.
#[derive(Copy, Clone, Debug)]
pub struct PlaneMapper {
    /// The size of the integral cartesian plane.  Its upper-left
    /// corner is 0,0.
    pub integral_plane: IntegralPlane,
    /// The two coordinates defining the complex cartesian plane,
    /// left-lower and right-upper
    pub complex_plane: ComplexPlane,
    // Pixels per unit of the complex plane, horizontally and vertically.
    grid_factors: (f64, f64),
}

impl PlaneMapper {
    /// Constructor.  Takes the size of the integral plane, and two
    /// points describing the complex plane.
    pub fn new(
        width: usize,
        height: usize,
        leftlower: Complex<f64>,
        rightupper: Complex<f64>,
    ) -> Result<PlaneMapper> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidPlane(format!(
                "the integral plane {}x{} has no pixels",
                width, height
            )));
        }

        let finite = |c: Complex<f64>| c.re.is_finite() && c.im.is_finite();
        if !finite(leftlower) || !finite(rightupper) {
            return Err(RenderError::InvalidPlane(
                "the corners of the complex plane must be finite".to_string(),
            ));
        }

        if rightupper.re <= leftlower.re {
            return Err(RenderError::InvalidPlane(
                "The left lower corner is not to the left of the right upper corner.".to_string(),
            ));
        }

        if rightupper.im <= leftlower.im {
            return Err(RenderError::InvalidPlane(
                "The left lower corner is not lower than the right upper corner".to_string(),
            ));
        }

        let grid_factors = (
            (width as f64) / (rightupper.re - leftlower.re),
            (height as f64) / (rightupper.im - leftlower.im),
        );

        Ok(PlaneMapper {
            integral_plane: IntegralPlane(width, height),
            complex_plane: ComplexPlane(leftlower, rightupper),
            grid_factors,
        })
    }

    /// A plane of square pixels, `view_height` units tall, centered on
    /// `center`.  The width follows from the aspect ratio.
    pub fn centered(
        width: usize,
        height: usize,
        center: Complex<f64>,
        view_height: f64,
    ) -> Result<PlaneMapper> {
        if height == 0 {
            return Err(RenderError::InvalidPlane(
                "the integral plane has no rows".to_string(),
            ));
        }
        let half = Complex::new(
            view_height * 0.5 * (width as f64) / (height as f64),
            view_height * 0.5,
        );
        PlaneMapper::new(width, height, center - half, center + half)
    }

    /// The same complex plane, sampled at a different resolution.
    pub fn with_resolution(&self, width: usize, height: usize) -> Result<PlaneMapper> {
        let ComplexPlane(leftlower, rightupper) = self.complex_plane;
        PlaneMapper::new(width, height, leftlower, rightupper)
    }

    /// The total number of points in the integral grid.  Used to
    /// calculate memory needs.
    pub fn len(&self) -> usize {
        self.integral_plane.0 * self.integral_plane.1
    }

    /// Describes that the integral plane is of a size.
    pub fn is_empty(&self) -> bool {
        self.integral_plane.0 == 0 || self.integral_plane.1 == 0
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.integral_plane.0
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.integral_plane.1
    }

    /// The size of one pixel on the complex plane, horizontally and
    /// vertically.
    pub fn pixel_size(&self) -> (f64, f64) {
        (1.0 / self.grid_factors.0, 1.0 / self.grid_factors.1)
    }

    /// Given a complex number, return its continuous position on the
    /// integral plane, in pixels from the upper-left corner.  Nothing
    /// is clamped; the result may lie outside the grid.
    pub fn point_to_grid(&self, point: &Complex<f64>) -> (f64, f64) {
        let ComplexPlane(leftlower, rightupper) = self.complex_plane;
        (
            (point.re - leftlower.re) * self.grid_factors.0,
            (rightupper.im - point.im) * self.grid_factors.1,
        )
    }

    /// Given a complex number corresponding to a location on the
    /// complex cartesian plane, find the pixel that contains it, if
    /// any does.
    pub fn point_to_pixel(&self, point: &Complex<f64>) -> Option<Pixel> {
        let (left, top) = self.point_to_grid(point);
        if !(left >= 0.0 && top >= 0.0) {
            // Also catches NaN.
            return None;
        }
        let (left, top) = (left.floor(), top.floor());
        if left >= self.integral_plane.0 as f64 || top >= self.integral_plane.1 as f64 {
            return None;
        }
        Some(Pixel(left as usize, top as usize))
    }

    /// Given a pixel on the integral cartesian plane, return the point
    /// on the complex cartesian plane at that pixel's upper-left
    /// corner.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        self.footprint_point(pixel, 0.0, 0.0)
    }

    /// A point inside a pixel's footprint.  `fx` and `fy` are the
    /// fractions of the way across and down the pixel, so (0.5, 0.5)
    /// is the pixel's center.
    pub fn footprint_point(&self, pixel: &Pixel, fx: f64, fy: f64) -> Complex<f64> {
        let ComplexPlane(leftlower, rightupper) = self.complex_plane;
        Complex::new(
            leftlower.re + (pixel.0 as f64 + fx) / self.grid_factors.0,
            rightupper.im - (pixel.1 as f64 + fy) / self.grid_factors.1,
        )
    }

    /// Since the Buddhabrot actually tracks the progress of a complex
    /// number as it orbits the Mandelbrot set's interior, we have to
    /// map those complex numbers back to the pixel plane, and then
    /// increment those points on the pixel plane as the orbit passes
    /// through them.  This function takes a point, maps it to pixel
    /// coordinates, then returns the linear offset from the root of
    /// the image buffer in memory.
    pub fn point_to_offset(&self, point: &Complex<f64>) -> Option<usize> {
        self.point_to_pixel(point)
            .map(|Pixel(left, top)| top * self.integral_plane.0 + left)
    }

    /// Project a point for bilinear splatting.  Returns `None` when
    /// the point is far enough outside the grid that not even the
    /// one-cell halo around it is touched, or when the point is not
    /// finite.
    pub fn project(&self, point: &Complex<f64>) -> Option<Splat> {
        let (x, y) = self.point_to_grid(point);
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let IntegralPlane(width, height) = self.integral_plane;
        if x < -1.0 || x >= width as f64 || y < -1.0 || y >= height as f64 {
            return None;
        }
        let (fx, fy) = (x.floor(), y.floor());
        let (dx, dy) = (x - fx, y - fy);
        Some(Splat {
            left: fx as isize,
            top: fy as isize,
            weights: [
                (1.0 - dx) * (1.0 - dy),
                dx * (1.0 - dy),
                (1.0 - dx) * dy,
                dx * dy,
            ],
        })
    }

    /// Hand `weight` units of brightness for `point` to `emit`, as
    /// one or more (offset, share) calls depending on the projection.
    /// Points that land nowhere emit nothing.
    pub fn deposit<F>(&self, projection: Projection, point: &Complex<f64>, weight: f64, mut emit: F)
    where
        F: FnMut(usize, f64),
    {
        match projection {
            Projection::Nearest => {
                if let Some(offset) = self.point_to_offset(point) {
                    emit(offset, weight);
                }
            }
            Projection::Bilinear => {
                if let Some(splat) = self.project(point) {
                    for (offset, share) in splat.cells(self.integral_plane) {
                        emit(offset, weight * share);
                    }
                }
            }
        }
    }
}
