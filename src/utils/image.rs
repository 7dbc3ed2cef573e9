//! Utility functions for image handling.
//!
//! This module provides functions for loading scans from disk, composing
//! token rasters side by side, and encoding rasters for transport.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, imageops};

use crate::core::SheetError;
use crate::core::constants::WHITE;
use crate::domain::EvidenceFormat;

/// Loads an image from a file path and converts it to RgbImage.
///
/// # Errors
///
/// Returns `SheetError::ImageLoad` if the file cannot be opened or decoded.
pub fn load_image(path: &std::path::Path) -> Result<RgbImage, SheetError> {
    let img = image::open(path).map_err(SheetError::ImageLoad)?;
    Ok(img.to_rgb8())
}

/// Places `images` left to right on a white canvas.
///
/// The canvas is as tall as the tallest image; shorter images are top-aligned.
/// An empty slice yields a 1x1 white canvas.
pub fn hconcat_on_white(images: &[&RgbImage]) -> RgbImage {
    let width: u32 = images.iter().map(|img| img.width()).sum();
    let height = images.iter().map(|img| img.height()).max().unwrap_or(0);
    let mut canvas = RgbImage::from_pixel(width.max(1), height.max(1), Rgb([WHITE; 3]));

    let mut x = 0i64;
    for img in images {
        imageops::overlay(&mut canvas, *img, x, 0);
        x += i64::from(img.width());
    }
    canvas
}

/// Encodes `image` in `format`.
pub fn encode_image(image: &RgbImage, format: EvidenceFormat) -> Result<Vec<u8>, SheetError> {
    let (image_format, name) = match format {
        EvidenceFormat::Png => (ImageFormat::Png, "png"),
        EvidenceFormat::Jpeg => (ImageFormat::Jpeg, "jpeg"),
    };
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut bytes, image_format)
        .map_err(|e| SheetError::encode_error(name, e))?;
    Ok(bytes.into_inner())
}

/// Encodes `image` in `format` and returns the bytes as standard base64.
pub fn encode_image_base64(image: &RgbImage, format: EvidenceFormat) -> Result<String, SheetError> {
    Ok(STANDARD.encode(encode_image(image, format)?))
}
