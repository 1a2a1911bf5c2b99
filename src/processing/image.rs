use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageOutputFormat};

use crate::models::{BoundingBox, FaceThumbnail, RegionFraction};
use crate::utils::VerificationError;

pub struct ImageProcessor;

impl ImageProcessor {
    pub fn decode(image_data: &[u8]) -> Result<DynamicImage, VerificationError> {
        image::load_from_memory(image_data)
            .map_err(|e| VerificationError::ImageProcessingError(format!("Failed to decode image: {}", e)))
    }

    /// Crops a detected face with padding and resamples it to a `size` square.
    ///
    /// Padding is `padding_ratio` of the box's smaller side on every edge; the
    /// padded rectangle is clamped to the image bounds.
    pub fn crop_face(
        image: &DynamicImage,
        bbox: &BoundingBox,
        padding_ratio: f32,
        size: u32,
    ) -> Result<FaceThumbnail, VerificationError> {
        let (width, height) = image.dimensions();
        let padding = bbox.width.min(bbox.height) * padding_ratio;

        let left = (bbox.x - padding).max(0.0);
        let top = (bbox.y - padding).max(0.0);
        let right = (bbox.x + bbox.width + padding).min(width as f32);
        let bottom = (bbox.y + bbox.height + padding).min(height as f32);

        if !(right > left && bottom > top) {
            return Err(VerificationError::ImageProcessingError(format!(
                "Face box {:?} lies outside the {}x{} image",
                bbox, width, height
            )));
        }

        Self::crop_pixels(
            image,
            left.floor() as u32,
            top.floor() as u32,
            (right - left).round() as u32,
            (bottom - top).round() as u32,
            size,
        )
    }

    /// Crops a fixed proportional region, used when no face was detected on a document.
    pub fn crop_region(
        image: &DynamicImage,
        region: &RegionFraction,
        size: u32,
    ) -> Result<FaceThumbnail, VerificationError> {
        let (width, height) = image.dimensions();
        Self::crop_pixels(
            image,
            (width as f32 * region.x).floor() as u32,
            (height as f32 * region.y).floor() as u32,
            (width as f32 * region.width).round() as u32,
            (height as f32 * region.height).round() as u32,
            size,
        )
    }

    pub fn full_frame(image: &DynamicImage, size: u32) -> Result<FaceThumbnail, VerificationError> {
        let (width, height) = image.dimensions();
        Self::crop_pixels(image, 0, 0, width, height, size)
    }

    fn crop_pixels(
        image: &DynamicImage,
        x: u32,
        y: u32,
        crop_width: u32,
        crop_height: u32,
        size: u32,
    ) -> Result<FaceThumbnail, VerificationError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || size == 0 {
            return Err(VerificationError::ImageProcessingError(
                "Cannot crop an empty image".to_string(),
            ));
        }
        let x = x.min(width - 1);
        let y = y.min(height - 1);
        let crop_width = crop_width.min(width - x).max(1);
        let crop_height = crop_height.min(height - y).max(1);

        let cropped = image.crop_imm(x, y, crop_width, crop_height).to_rgb8();
        let resized = imageops::resize(&cropped, size, size, FilterType::Lanczos3);
        Ok(FaceThumbnail::new(resized))
    }

    pub fn mirror(image: &DynamicImage) -> DynamicImage {
        image.fliph()
    }

    pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, VerificationError> {
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Jpeg(quality))
            .map_err(|e| VerificationError::ImageProcessingError(format!("Failed to encode image: {}", e)))?;
        Ok(buffer)
    }
}
