//! Best-effort thumbnail derivation for stored images.
//!
//! Decodes by extension, fits the image into a configured bounding box with
//! Lanczos3 resampling, and re-encodes in the source format. Only jpeg, png
//! and gif have codec support; other image extensions are accepted for
//! upload but never thumbnailed, which the retrieval fallback tolerates.

use crate::error::StoreError;
use image::imageops::FilterType;
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// Thumbnail generator bounded to a maximum box size.
#[derive(Debug, Clone, Copy)]
pub struct Thumbnailer {
    max_width: u32,
    max_height: u32,
}

impl Thumbnailer {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    /// Whether an extension (lowercase, with dot) has a thumbnail codec.
    pub fn supports(ext: &str) -> bool {
        format_for(ext).is_some()
    }

    /// Derive a thumbnail of `origin` at `thumb_path`.
    ///
    /// Decode, resize and encode are synchronous CPU work and run on the
    /// blocking pool. The origin file is only read, never touched.
    pub async fn derive(&self, origin: &Path, thumb_path: &Path) -> Result<(), StoreError> {
        let ext = origin
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        let format =
            format_for(&ext).ok_or_else(|| StoreError::UnsupportedFormat(ext.clone()))?;

        let origin = origin.to_path_buf();
        let thumb_path = thumb_path.to_path_buf();
        let (max_width, max_height) = (self.max_width, self.max_height);

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let file = std::fs::File::open(&origin)?;
            let img = image::ImageReader::with_format(std::io::BufReader::new(file), format)
                .decode()
                .map_err(|e| StoreError::Decode(e.to_string()))?;

            // Box-fit: the larger dimension shrinks to the bound, aspect
            // ratio preserved. Images already inside the box pass through
            // unscaled.
            let resized = if img.width() <= max_width && img.height() <= max_height {
                img
            } else {
                img.resize(max_width, max_height, FilterType::Lanczos3)
            };

            if let Some(parent) = thumb_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            resized
                .save_with_format(&thumb_path, format)
                .map_err(|e| StoreError::Encode(e.to_string()))?;

            debug!(
                path = %thumb_path.display(),
                width = resized.width(),
                height = resized.height(),
                "Derived thumbnail"
            );
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }
}

fn format_for(ext: &str) -> Option<ImageFormat> {
    match ext {
        ".jpg" | ".jpeg" => Some(ImageFormat::Jpeg),
        ".png" => Some(ImageFormat::Png),
        ".gif" => Some(ImageFormat::Gif),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[tokio::test]
    async fn bounds_large_image_preserving_aspect() {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("big.png");
        let thumb = dir.path().join("thumb").join("big.png");
        write_png(&origin, 400, 300);

        Thumbnailer::new(200, 200).derive(&origin, &thumb).await.unwrap();

        let out = image::open(&thumb).unwrap();
        assert_eq!(out.width(), 200);
        assert_eq!(out.height(), 150);
    }

    #[tokio::test]
    async fn does_not_upscale_small_image() {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("small.png");
        let thumb = dir.path().join("small-thumb.png");
        write_png(&origin, 50, 40);

        Thumbnailer::new(200, 200).derive(&origin, &thumb).await.unwrap();

        let out = image::open(&thumb).unwrap();
        assert_eq!((out.width(), out.height()), (50, 40));
    }

    #[tokio::test]
    async fn rejects_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("icon.bmp");
        std::fs::write(&origin, b"not really a bmp").unwrap();

        let err = Thumbnailer::new(200, 200)
            .derive(&origin, &dir.path().join("icon-thumb.bmp"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedFormat(ext) if ext == ".bmp"));
    }

    #[tokio::test]
    async fn garbage_bytes_fail_decode() {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("fake.png");
        std::fs::write(&origin, b"definitely not a png").unwrap();

        let err = Thumbnailer::new(200, 200)
            .derive(&origin, &dir.path().join("fake-thumb.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn supports_matches_codec_set() {
        assert!(Thumbnailer::supports(".jpg"));
        assert!(Thumbnailer::supports(".jpeg"));
        assert!(Thumbnailer::supports(".png"));
        assert!(Thumbnailer::supports(".gif"));
        assert!(!Thumbnailer::supports(".bmp"));
        assert!(!Thumbnailer::supports(".svg"));
        assert!(!Thumbnailer::supports(".ico"));
    }
}
