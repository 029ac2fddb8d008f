//! Raster decode/encode helpers shared by the diff renderer and the
//! attack simulator.
//!
//! Decoding is blocking CPU work, so it runs on the tokio blocking pool.
//! When two images are needed at once (diff rendering), `decode_pair`
//! joins on both decodes explicitly: neither completion order matters,
//! and a failure on either side fails the pair without partial output.

use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("image decode failed: {0}")]
    Decode(image::ImageError),
    #[error("image encode failed: {0}")]
    Encode(image::ImageError),
    #[error("image dimensions differ: {0}x{1} vs {2}x{3}")]
    SizeMismatch(u32, u32, u32, u32),
    #[error("decode task aborted")]
    Aborted,
}

/// Decode an in-memory encoded image into an RGBA raster.
pub fn decode_bytes(bytes: &[u8]) -> Result<RgbaImage, RasterError> {
    let img = image::load_from_memory(bytes).map_err(RasterError::Decode)?;
    Ok(img.to_rgba8())
}

/// Read and decode an image file off the async executor.
pub async fn decode_file(path: impl AsRef<Path>) -> Result<RgbaImage, RasterError> {
    let path = path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(&path).map_err(|source| RasterError::Read {
            path: path.clone(),
            source,
        })?;
        decode_bytes(&bytes)
    })
    .await
    .map_err(|_| RasterError::Aborted)?
}

/// Decode two image files concurrently, completing only once BOTH have
/// finished. This is the synchronization barrier the diff renderer
/// relies on; completion order between the two decodes is irrelevant.
pub async fn decode_pair(
    path_a: impl AsRef<Path>,
    path_b: impl AsRef<Path>,
) -> Result<(RgbaImage, RgbaImage), RasterError> {
    tokio::try_join!(decode_file(path_a), decode_file(path_b))
}

/// Encode a raster as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, RasterError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(RasterError::Encode)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        })
    }

    #[test]
    fn test_png_roundtrip() {
        let img = checker(8, 6);
        let png = encode_png(&img).unwrap();
        let back = decode_bytes(&png).unwrap();
        assert_eq!(back.dimensions(), (8, 6));
        assert_eq!(back, img);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            decode_bytes(b"not an image"),
            Err(RasterError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_decode_pair_joins_both() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        std::fs::write(&a, encode_png(&checker(4, 4)).unwrap()).unwrap();
        std::fs::write(&b, encode_png(&checker(5, 3)).unwrap()).unwrap();

        let (ra, rb) = decode_pair(&a, &b).await.unwrap();
        assert_eq!(ra.dimensions(), (4, 4));
        assert_eq!(rb.dimensions(), (5, 3));
    }

    #[tokio::test]
    async fn test_decode_pair_fails_if_either_missing() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        std::fs::write(&a, encode_png(&checker(4, 4)).unwrap()).unwrap();

        let missing = dir.path().join("nope.png");
        assert!(decode_pair(&a, &missing).await.is_err());
        assert!(decode_pair(&missing, &a).await.is_err());
    }
}
