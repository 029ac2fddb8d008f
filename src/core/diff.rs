//! Pixel difference renderer.
//!
//! Visualizes where two same-size images differ: per-channel output is
//! `clamp(|a - b| * DIFF_GAIN, 0, 255)` with alpha forced fully opaque.
//! Images of differing dimensions are rejected rather than clamped to
//! their overlap; in every supported workflow (embed result vs original,
//! attack output vs original) dimensions are equal by construction, so a
//! mismatch signals user error and a partial diff would mislead.

use crate::core::config::DIFF_GAIN;
use crate::core::raster::{self, RasterError};
use image::{Rgba, RgbaImage};
use std::path::Path;

/// Headline numbers for a rendered diff map, shown alongside the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffSummary {
    pub width: u32,
    pub height: u32,
    /// Pixels with at least one nonzero RGB channel after amplification.
    pub changed_pixels: u64,
    /// Largest amplified channel value in the map.
    pub max_delta: u8,
}

/// Compute the amplified absolute-difference map of two rasters.
pub fn diff_map(a: &RgbaImage, b: &RgbaImage) -> Result<RgbaImage, RasterError> {
    let (wa, ha) = a.dimensions();
    let (wb, hb) = b.dimensions();
    if (wa, ha) != (wb, hb) {
        return Err(RasterError::SizeMismatch(wa, ha, wb, hb));
    }

    let mut out = RgbaImage::new(wa, ha);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let pa = a.get_pixel(x, y);
        let pb = b.get_pixel(x, y);
        let amp = |ca: u8, cb: u8| -> u8 {
            let delta = (ca as i32 - cb as i32).unsigned_abs() * DIFF_GAIN;
            delta.min(255) as u8
        };
        *pixel = Rgba([
            amp(pa[0], pb[0]),
            amp(pa[1], pb[1]),
            amp(pa[2], pb[2]),
            255,
        ]);
    }
    Ok(out)
}

/// Summarize a diff map for display.
pub fn summarize(map: &RgbaImage) -> DiffSummary {
    let (width, height) = map.dimensions();
    let mut changed_pixels = 0u64;
    let mut max_delta = 0u8;
    for pixel in map.pixels() {
        let m = pixel[0].max(pixel[1]).max(pixel[2]);
        if m > 0 {
            changed_pixels += 1;
        }
        max_delta = max_delta.max(m);
    }
    DiffSummary {
        width,
        height,
        changed_pixels,
        max_delta,
    }
}

/// Decode both images (joining on both completions), then render their
/// difference. Either decode failing fails the whole render; no partial
/// map is produced and any previously rendered map is left untouched by
/// the caller.
pub async fn render_difference(
    path_a: impl AsRef<Path>,
    path_b: impl AsRef<Path>,
) -> Result<(RgbaImage, DiffSummary), RasterError> {
    let (a, b) = raster::decode_pair(path_a, path_b).await?;
    let map = diff_map(&a, &b)?;
    let summary = summarize(&map);
    Ok((map, summary))
}
