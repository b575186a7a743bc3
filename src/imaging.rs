//! Screenshot image processing
//!
//! Decodes client uploads, shrinks them to fit 1920×1080 and re-encodes as
//! JPEG, optionally producing a Gaussian-blurred copy. Everything here is CPU
//! bound; callers run it on the blocking pool.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use thiserror::Error;

pub const MAX_WIDTH: u32 = 1920;
pub const MAX_HEIGHT: u32 = 1080;
pub const JPEG_QUALITY: u8 = 85;
pub const BLUR_SIGMA: f32 = 20.0;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unreadable image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode jpeg: {0}")]
    Encode(#[source] image::ImageError),
}

/// Encoded outputs for one screenshot
#[derive(Debug, Clone)]
pub struct ProcessedScreenshot {
    pub original: Vec<u8>,
    pub blurred: Option<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

/// Decode base64 image data, with or without a `data:` URL prefix
pub fn decode_base64_image(data: &str) -> Result<Vec<u8>, ImageError> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    Ok(STANDARD.decode(payload.trim())?)
}

pub fn process_screenshot(bytes: &[u8], blur: bool) -> Result<ProcessedScreenshot, ImageError> {
    let decoded = image::load_from_memory(bytes).map_err(ImageError::Decode)?;
    let fitted = fit_within(decoded, MAX_WIDTH, MAX_HEIGHT);
    let (width, height) = fitted.dimensions();
    let rgb = fitted.to_rgb8();

    let original = encode_jpeg(&rgb)?;
    let blurred = if blur {
        let blurred = image::imageops::blur(&rgb, BLUR_SIGMA);
        Some(encode_jpeg(&blurred)?)
    } else {
        None
    };

    Ok(ProcessedScreenshot {
        original,
        blurred,
        width,
        height,
    })
}

/// Scale down preserving aspect ratio; never enlarges
fn fit_within(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_width && height <= max_height {
        return image;
    }
    image.resize(max_width, max_height, FilterType::Lanczos3)
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, ImageError> {
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(image)
        .map_err(ImageError::Encode)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn large_images_fit_inside_bounds() {
        let processed = process_screenshot(&png(3840, 1600), false).unwrap();
        assert_eq!(processed.width, 1920);
        assert_eq!(processed.height, 800);
        assert!(processed.blurred.is_none());

        let decoded = image::load_from_memory(&processed.original).unwrap();
        assert_eq!(decoded.dimensions(), (1920, 800));
    }

    #[test]
    fn small_images_are_not_enlarged() {
        let processed = process_screenshot(&png(640, 480), true).unwrap();
        assert_eq!((processed.width, processed.height), (640, 480));
        assert!(processed.blurred.is_some());
        assert_ne!(processed.blurred.unwrap(), processed.original);
    }

    #[test]
    fn data_url_prefix_is_accepted() {
        let raw = STANDARD.encode(png(4, 4));
        let from_url = decode_base64_image(&format!("data:image/png;base64,{raw}")).unwrap();
        let plain = decode_base64_image(&raw).unwrap();
        assert_eq!(from_url, plain);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            decode_base64_image("not base64!!"),
            Err(ImageError::Base64(_))
        ));
        assert!(matches!(
            process_screenshot(b"not an image", false),
            Err(ImageError::Decode(_))
        ));
    }
}
