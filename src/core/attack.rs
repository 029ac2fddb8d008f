//! Geometric attack simulator.
//!
//! Re-creates a rotation+scale tampering attack against a watermarked
//! image entirely client-side. The output raster keeps the source's
//! dimensions: content rotated or scaled beyond the frame is clipped,
//! the frame never resizes. Sampling is inverse-mapped nearest-neighbour,
//! so the transform is a pure function of `(source, rotation, scale)`:
//! identical inputs reproduce pixel-identical output, and the
//! `(0°, 1.0)` case is the exact identity.

use crate::core::config::ATTACKED_FILE_NAME;
use crate::core::raster::{self, RasterError};
use crate::core::resources::ImageResource;
use image::RgbaImage;

/// Transient parameters driving the simulator. Not persisted anywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackParameters {
    /// Degrees, clockwise positive.
    pub rotation_degrees: f64,
    /// Uniform scale around the canvas center.
    pub scale_factor: f64,
}

impl Default for AttackParameters {
    fn default() -> Self {
        Self {
            rotation_degrees: 0.0,
            scale_factor: 1.0,
        }
    }
}

impl AttackParameters {
    pub fn is_identity(&self) -> bool {
        self.rotation_degrees == 0.0 && self.scale_factor == 1.0
    }
}

/// Rotate and scale `src` around its center, clipping to the source frame.
pub fn apply_attack(src: &RgbaImage, rotation_degrees: f64, scale_factor: f64) -> RgbaImage {
    let (w, h) = src.dimensions();
    let mut out = RgbaImage::new(w, h);
    if scale_factor <= 0.0 {
        // Degenerate scale collapses the image to nothing; the UI clamps
        // well above zero, but the function stays total.
        return out;
    }

    let theta = rotation_degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let cx = w as f64 / 2.0;
    let cy = h as f64 / 2.0;

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        // Inverse mapping: rotate the destination pixel back by -theta
        // and divide out the scale, both around the canvas center.
        // Screen coordinates are y-down, so this matrix is clockwise
        // for positive theta in the forward direction.
        let dx = x as f64 + 0.5 - cx;
        let dy = y as f64 + 0.5 - cy;
        let sx = (dx * cos + dy * sin) / scale_factor + cx;
        let sy = (-dx * sin + dy * cos) / scale_factor + cy;

        let sxi = sx.floor() as i64;
        let syi = sy.floor() as i64;
        if sxi >= 0 && syi >= 0 && (sxi as u32) < w && (syi as u32) < h {
            *pixel = *src.get_pixel(sxi as u32, syi as u32);
        }
    }
    out
}

/// Run the attack and export the result as a PNG resource named
/// deterministically, ready to be handed over as a suspect image.
pub fn export_attacked(
    src: &RgbaImage,
    params: AttackParameters,
) -> Result<ImageResource, RasterError> {
    let attacked = apply_attack(src, params.rotation_degrees, params.scale_factor);
    let png = raster::encode_png(&attacked)?;
    Ok(ImageResource::new(png, "image/png", ATTACKED_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 11 % 256) as u8, 99, 255])
        })
    }

    #[test]
    fn test_identity_reproduces_source() {
        let src = gradient(17, 13);
        let out = apply_attack(&src, 0.0, 1.0);
        assert_eq!(out.dimensions(), src.dimensions());
        assert_eq!(out, src);
    }

    #[test]
    fn test_idempotent_for_same_parameters() {
        let src = gradient(32, 24);
        let a = apply_attack(&src, 10.0, 1.1);
        let b = apply_attack(&src, 10.0, 1.1);
        assert_eq!(a, b, "same inputs must give pixel-identical output");

        // And the exported PNG bytes are byte-identical too.
        let ra = export_attacked(&src, AttackParameters { rotation_degrees: 10.0, scale_factor: 1.1 }).unwrap();
        let rb = export_attacked(&src, AttackParameters { rotation_degrees: 10.0, scale_factor: 1.1 }).unwrap();
        assert_eq!(ra.bytes(), rb.bytes());
    }

    #[test]
    fn test_frame_never_resizes() {
        let src = gradient(20, 10);
        for (rot, scale) in [(45.0, 1.5), (-45.0, 0.5), (10.0, 1.1)] {
            let out = apply_attack(&src, rot, scale);
            assert_eq!(out.dimensions(), (20, 10));
        }
    }

    #[test]
    fn test_downscale_leaves_transparent_border() {
        let src = RgbaImage::from_pixel(20, 20, Rgba([200, 0, 0, 255]));
        let out = apply_attack(&src, 0.0, 0.5);
        // Corner is outside the shrunken content, so it stays unset.
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        // Center still carries the source color.
        assert_eq!(*out.get_pixel(10, 10), Rgba([200, 0, 0, 255]));
    }

    #[test]
    fn test_rotation_moves_content() {
        let mut src = RgbaImage::from_pixel(21, 21, Rgba([0, 0, 0, 255]));
        src.put_pixel(20, 10, Rgba([255, 255, 255, 255])); // right edge, mid height
        let out = apply_attack(&src, 45.0, 1.0);
        assert_ne!(out, src);
        // Center pixel is the rotation fixed point.
        assert_eq!(*out.get_pixel(10, 10), *src.get_pixel(10, 10));
    }

    #[test]
    fn test_export_named_deterministically() {
        let src = gradient(8, 8);
        let res = export_attacked(&src, AttackParameters::default()).unwrap();
        assert_eq!(res.name(), "attacked.png");
        assert_eq!(res.mime_type(), "image/png");
        // The export must round-trip back to the attacked raster.
        let back = crate::core::raster::decode_bytes(res.bytes()).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn test_zero_scale_is_total() {
        let src = gradient(4, 4);
        let out = apply_attack(&src, 0.0, 0.0);
        assert!(out.pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
    }
}
