// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Writing a finished image to disk.  The format follows the file
//! extension: `.png` takes any layout; the PNM family wants one that
//! fits it (`.pgm` for gray, `.pam` for color with alpha).

use std::fs;
use std::path::Path;

use image::{ImageBuffer, Luma, Rgba};
use tracing::info;

use crate::error::{RenderError, Result};
use crate::tone::ColorBuffer;

/// The channel layout written to the file.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PixelFormat {
    /// Color with alpha, 8 bits per channel.
    Rgba8,
    /// Color with alpha, 16 bits per channel.
    Rgba16,
    /// Luma, 8 bits.
    Gray8,
    /// Luma, 16 bits.
    Gray16,
}

fn dimensions(buffer: &ColorBuffer) -> Result<(u32, u32)> {
    let convert = |n: usize| {
        if n > u32::MAX as usize {
            Err(RenderError::InvalidConfig(format!("{} pixels is too large for an image", n)))
        } else {
            Ok(n as u32)
        }
    };
    Ok((convert(buffer.width())?, convert(buffer.height())?))
}

fn mismatch() -> RenderError {
    RenderError::InvalidConfig("pixel data does not match the image size".to_string())
}

/// Encode `buffer` as `format` and write it to `path`, creating any
/// missing parent directories.  Nothing is retried.
pub fn write_image<P: AsRef<Path>>(path: P, buffer: &ColorBuffer, format: PixelFormat) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let (width, height) = dimensions(buffer)?;
    match format {
        PixelFormat::Rgba8 => ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, buffer.to_rgba8())
            .ok_or_else(mismatch)?
            .save(path)?,
        PixelFormat::Rgba16 => ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, buffer.to_rgba16())
            .ok_or_else(mismatch)?
            .save(path)?,
        PixelFormat::Gray8 => ImageBuffer::<Luma<u8>, _>::from_raw(width, height, buffer.to_gray8())
            .ok_or_else(mismatch)?
            .save(path)?,
        PixelFormat::Gray16 => ImageBuffer::<Luma<u16>, _>::from_raw(width, height, buffer.to_gray16())
            .ok_or_else(mismatch)?
            .save(path)?,
    }

    info!(path = %path.display(), width, height, ?format, "image written");
    Ok(())
}
