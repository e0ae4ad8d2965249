// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The things that can actually go wrong.  Points leaving the frame,
//! orbits that never escape, and orbits that run off to infinity are
//! all normal outcomes of sampling and are not represented here.

use failure::Fail;

/// Everything that can stop a render.
#[derive(Debug, Fail)]
pub enum RenderError {
    /// The two planes could not be related to one another.
    #[fail(display = "invalid plane: {}", _0)]
    InvalidPlane(String),

    /// A configuration value makes the render meaningless.
    #[fail(display = "invalid configuration: {}", _0)]
    InvalidConfig(String),

    /// At least one sampling thread panicked; its share of the
    /// histogram cannot be trusted.
    #[fail(display = "a sampling worker panicked")]
    WorkerPanicked,

    /// Creating the output directory or file failed.
    #[fail(display = "i/o failure: {}", _0)]
    Io(#[cause] std::io::Error),

    /// The raster codec refused the buffer or the destination.
    #[fail(display = "could not encode image: {}", _0)]
    Image(#[cause] image::ImageError),
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Io(err)
    }
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(err) => RenderError::Io(err),
            other => RenderError::Image(other),
        }
    }
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, RenderError>;
