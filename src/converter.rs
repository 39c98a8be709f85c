use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use std::io::Cursor;

use crate::ResizeFilter;

/// A shrunk image, already JPEG-encoded
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub original_dimensions: (u32, u32),
    pub dimensions: (u32, u32),
    pub bytes: Vec<u8>,
}

pub struct ImageConverter {
    quality: u8,
    scale: f64,
    filter: ResizeFilter,
}

impl ImageConverter {
    pub fn new(quality: u8, scale: f64, filter: ResizeFilter) -> Self {
        Self {
            quality,
            scale,
            filter,
        }
    }

    /// Target size for a `width`x`height` image: each side multiplied by
    /// `scale` and truncated, never below one pixel.
    pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
        let shrink = |side: u32| ((side as f64 * scale).floor() as u32).max(1);
        (shrink(width), shrink(height))
    }

    /// Decode an image, guessing the format from its content.
    ///
    /// An EXIF orientation tag is applied, so the result is upright.
    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .context("Failed to inspect image data")?
            .into_decoder()
            .context("Failed to decode image")?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let mut img = DynamicImage::from_decoder(decoder).context("Failed to decode image")?;
        img.apply_orientation(orientation);

        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("Invalid image dimensions: {}x{}", width, height);
        }
        Ok(img)
    }

    pub fn target_dimensions(&self, img: &DynamicImage) -> (u32, u32) {
        let (width, height) = img.dimensions();
        Self::scaled_dimensions(width, height, self.scale)
    }

    /// Resize and encode as JPEG at the configured quality
    pub fn transform(&self, img: &DynamicImage) -> Result<EncodedImage> {
        let original_dimensions = img.dimensions();
        let (width, height) = self.target_dimensions(img);

        // JPEG has no alpha channel
        let rgb = img.to_rgb8();
        let resized = image::imageops::resize(&rgb, width, height, self.filter.into());

        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut bytes, self.quality);
        DynamicImage::ImageRgb8(resized)
            .write_with_encoder(encoder)
            .context("Failed to encode JPEG")?;

        Ok(EncodedImage {
            original_dimensions,
            dimensions: (width, height),
            bytes,
        })
    }
}
