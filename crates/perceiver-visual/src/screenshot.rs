//! Screenshot preparation for the vision model
use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use tracing::debug;

use crate::errors::VisualError;

/// Longest side sent to the vision model.
pub const MAX_VISION_DIMENSION: u32 = 2048;

#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub base64: String,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

impl PreparedImage {
    pub fn data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.base64)
    }
}

/// Loads the screenshot, downscales it to [`MAX_VISION_DIMENSION`] and encodes it as base64 PNG.
pub async fn prepare_for_vision(path: &Path) -> Result<PreparedImage, VisualError> {
    let bytes = tokio::fs::read(path).await?;
    encode_for_vision(&bytes)
}

pub fn encode_for_vision(bytes: &[u8]) -> Result<PreparedImage, VisualError> {
    if bytes.is_empty() {
        return Err(VisualError::InvalidInput("empty screenshot".into()));
    }
    let img = image::load_from_memory(bytes)?;
    let (width, height) = img.dimensions();
    let (img, resized) = downscale(img, MAX_VISION_DIMENSION);
    if resized {
        debug!(from_w = width, from_h = height, to_w = img.width(), to_h = img.height(), "screenshot downscaled");
    }

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageOutputFormat::Png)?;
    Ok(PreparedImage {
        base64: STANDARD.encode(out.into_inner()),
        width: img.width(),
        height: img.height(),
        resized,
    })
}

fn downscale(img: DynamicImage, max_side: u32) -> (DynamicImage, bool) {
    let (w, h) = img.dimensions();
    if w <= max_side && h <= max_side {
        return (img, false);
    }
    let ratio = max_side as f64 / w.max(h) as f64;
    let nw = ((w as f64 * ratio).round() as u32).max(1);
    let nh = ((h as f64 * ratio).round() as u32).max(1);
    (img.resize_exact(nw, nh, FilterType::Lanczos3), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let buf: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgba([200, 10, 10, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(buf)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn small_images_keep_their_size() {
        let prepared = encode_for_vision(&png(64, 32)).unwrap();
        assert_eq!((prepared.width, prepared.height), (64, 32));
        assert!(!prepared.resized);
        assert!(prepared.data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn large_images_are_capped_on_the_long_side() {
        let prepared = encode_for_vision(&png(4096, 1024)).unwrap();
        assert_eq!(prepared.width, MAX_VISION_DIMENSION);
        assert_eq!(prepared.height, 512);
        assert!(prepared.resized);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            encode_for_vision(b"not an image"),
            Err(VisualError::ImageProcessing(_))
        ));
        assert!(encode_for_vision(&[]).is_err());
    }
}
