use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::contrast::equalize_histogram;
use log::{info, warn};
use serde::Serialize;

use crate::models::{Descriptor, ExtractedFace, FaceThumbnail, SimilaritySource};
use crate::utils::VerificationError;

/// Side of the square grayscale images compared by the visual fallback.
const VISUAL_SIZE: u32 = 64;
const SSIM_WINDOW: u32 = 8;
const SSIM_C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const SSIM_C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);
/// Below this grayscale standard deviation a thumbnail carries no structure to compare.
const MIN_VISUAL_CONTRAST: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Similarity {
    /// Percentage in `0..=100`.
    pub score: u8,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceMatch {
    pub score: u8,
    pub distance: Option<f32>,
    pub source: SimilaritySource,
    /// False when a thumbnail was too flat for the visual comparison to mean anything.
    pub comparable: bool,
}

pub struct FaceComparator;

impl FaceComparator {
    /// Maps a descriptor distance onto a percentage.
    ///
    /// Distances up to 0.4 are strong matches (85-100), up to 0.6 good
    /// (60-85), up to 0.8 weak (30-60), and anything further drops to zero.
    pub fn calibrate(distance: f32) -> u8 {
        let d = distance as f64;
        let raw = if d <= 0.4 {
            85.0 + (0.4 - d) * 37.5
        } else if d <= 0.6 {
            60.0 + (0.6 - d) * 125.0
        } else if d <= 0.8 {
            30.0 + (0.8 - d) * 150.0
        } else {
            (30.0 - (d - 0.8) * 100.0).max(0.0)
        };
        raw.round().clamp(0.0, 100.0) as u8
    }

    pub fn compare(a: &Descriptor, b: &Descriptor) -> Result<Similarity, VerificationError> {
        let distance = a.euclidean_distance(b)?;
        if !distance.is_finite() {
            return Err(VerificationError::InvalidDescriptor(
                "descriptor distance is not finite".to_string(),
            ));
        }
        Ok(Similarity {
            score: Self::calibrate(distance),
            distance,
        })
    }

    /// Deterministic structural similarity of two thumbnails, `0..=100`.
    ///
    /// Both images are reduced to equalised grayscale before comparison so
    /// lighting differences between a printed card and a camera frame count less.
    /// Returns `None` when either thumbnail is near-uniform (a covered lens, a
    /// blank card region), since equalisation would turn both into the same image.
    pub fn visual_similarity(a: &FaceThumbnail, b: &FaceThumbnail) -> Option<u8> {
        let a = Self::downscale(a);
        let b = Self::downscale(b);
        let (contrast_a, contrast_b) = (Self::contrast(&a), Self::contrast(&b));
        if contrast_a < MIN_VISUAL_CONTRAST || contrast_b < MIN_VISUAL_CONTRAST {
            warn!(
                "Thumbnail too uniform for visual comparison (contrast {:.1} / {:.1})",
                contrast_a, contrast_b
            );
            return None;
        }
        let a = equalize_histogram(&a);
        let b = equalize_histogram(&b);

        let mut total = 0.0;
        let mut windows = 0u32;
        for wy in (0..VISUAL_SIZE).step_by(SSIM_WINDOW as usize) {
            for wx in (0..VISUAL_SIZE).step_by(SSIM_WINDOW as usize) {
                total += Self::window_ssim(&a, &b, wx, wy);
                windows += 1;
            }
        }
        let ssim = if windows == 0 { 0.0 } else { total / windows as f64 };
        Some((ssim.clamp(0.0, 1.0) * 100.0).round() as u8)
    }

    fn downscale(thumbnail: &FaceThumbnail) -> GrayImage {
        let gray = imageops::grayscale(thumbnail.image());
        imageops::resize(&gray, VISUAL_SIZE, VISUAL_SIZE, FilterType::Triangle)
    }

    /// Standard deviation of the pixel values.
    fn contrast(image: &GrayImage) -> f64 {
        let n = (image.width() * image.height()) as f64;
        if n == 0.0 {
            return 0.0;
        }
        let mean = image.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
        let variance = image
            .pixels()
            .map(|p| {
                let d = p[0] as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        variance.sqrt()
    }

    fn window_ssim(a: &GrayImage, b: &GrayImage, x0: u32, y0: u32) -> f64 {
        let n = (SSIM_WINDOW * SSIM_WINDOW) as f64;
        let mut sum_a = 0.0;
        let mut sum_b = 0.0;
        for y in y0..y0 + SSIM_WINDOW {
            for x in x0..x0 + SSIM_WINDOW {
                sum_a += a.get_pixel(x, y)[0] as f64;
                sum_b += b.get_pixel(x, y)[0] as f64;
            }
        }
        let mean_a = sum_a / n;
        let mean_b = sum_b / n;

        let mut var_a = 0.0;
        let mut var_b = 0.0;
        let mut covariance = 0.0;
        for y in y0..y0 + SSIM_WINDOW {
            for x in x0..x0 + SSIM_WINDOW {
                let da = a.get_pixel(x, y)[0] as f64 - mean_a;
                let db = b.get_pixel(x, y)[0] as f64 - mean_b;
                var_a += da * da;
                var_b += db * db;
                covariance += da * db;
            }
        }
        var_a /= n - 1.0;
        var_b /= n - 1.0;
        covariance /= n - 1.0;

        ((2.0 * mean_a * mean_b + SSIM_C1) * (2.0 * covariance + SSIM_C2))
            / ((mean_a * mean_a + mean_b * mean_b + SSIM_C1) * (var_a + var_b + SSIM_C2))
    }

    /// Scores two extracted faces, preferring descriptors when both exist.
    pub fn compare_faces(document: &ExtractedFace, selfie: &ExtractedFace) -> FaceMatch {
        if let (Some(a), Some(b)) = (document.descriptor(), selfie.descriptor()) {
            match Self::compare(a, b) {
                Ok(similarity) => {
                    info!(
                        "Descriptor distance {:.3}, similarity {}%",
                        similarity.distance, similarity.score
                    );
                    return FaceMatch {
                        score: similarity.score,
                        distance: Some(similarity.distance),
                        source: SimilaritySource::Descriptor,
                        comparable: true,
                    };
                }
                Err(e) => warn!("Descriptor comparison failed, using visual comparison: {}", e),
            }
        }

        match Self::visual_similarity(document.thumbnail(), selfie.thumbnail()) {
            Some(score) => {
                info!("Visual fallback similarity {}%", score);
                FaceMatch {
                    score,
                    distance: None,
                    source: SimilaritySource::VisualFallback,
                    comparable: true,
                }
            }
            None => FaceMatch {
                score: 0,
                distance: None,
                source: SimilaritySource::VisualFallback,
                comparable: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FaceOrigin;
    use image::{Rgb, RgbImage};

    fn gradient(invert: bool) -> FaceThumbnail {
        FaceThumbnail::new(RgbImage::from_fn(120, 120, |x, y| {
            let v = ((x * 2 + y) % 256) as u8;
            let v = if invert { 255 - v } else { v };
            Rgb([v, v / 2, 255 - v / 3])
        }))
    }

    #[test]
    fn test_calibration_segments() {
        assert_eq!(FaceComparator::calibrate(0.0), 100);
        assert_eq!(FaceComparator::calibrate(0.1), 96);
        assert_eq!(FaceComparator::calibrate(0.35), 87);
        assert_eq!(FaceComparator::calibrate(0.4), 85);
        assert_eq!(FaceComparator::calibrate(0.45), 79);
        assert_eq!(FaceComparator::calibrate(0.6), 60);
        assert_eq!(FaceComparator::calibrate(0.7), 45);
        assert_eq!(FaceComparator::calibrate(0.8), 30);
        assert_eq!(FaceComparator::calibrate(0.9), 20);
        assert_eq!(FaceComparator::calibrate(1.5), 0);
    }

    #[test]
    fn test_calibration_is_monotonic() {
        let mut previous = 100;
        for step in 0..=200 {
            let score = FaceComparator::calibrate(step as f32 * 0.01);
            assert!(score <= previous, "non-monotonic at {}", step);
            previous = score;
        }
    }

    #[test]
    fn test_compare_is_symmetric() {
        let a = Descriptor::new(vec![0.1, 0.2, 0.3, 0.4]);
        let b = Descriptor::new(vec![0.3, 0.1, 0.0, 0.2]);
        let ab = FaceComparator::compare(&a, &b).unwrap();
        let ba = FaceComparator::compare(&b, &a).unwrap();
        assert_eq!(ab.score, ba.score);
        assert_eq!(FaceComparator::compare(&a, &a).unwrap().score, 100);
    }

    #[test]
    fn test_compare_rejects_mismatched_lengths() {
        let a = Descriptor::new(vec![0.0; 128]);
        let b = Descriptor::new(vec![0.0; 127]);
        assert!(FaceComparator::compare(&a, &b).is_err());
    }

    #[test]
    fn test_visual_similarity_is_deterministic() {
        let a = gradient(false);
        let b = gradient(true);
        assert_eq!(FaceComparator::visual_similarity(&a, &a), Some(100));
        let first = FaceComparator::visual_similarity(&a, &b).unwrap();
        assert_eq!(Some(first), FaceComparator::visual_similarity(&a, &b));
        assert_eq!(Some(first), FaceComparator::visual_similarity(&b, &a));
        assert!(first < 100);
    }

    #[test]
    fn test_flat_thumbnails_are_not_comparable() {
        let black = FaceThumbnail::new(RgbImage::from_pixel(300, 300, Rgb([0, 0, 0])));
        let beige = FaceThumbnail::new(RgbImage::from_pixel(300, 300, Rgb([200, 190, 180])));
        assert_eq!(FaceComparator::visual_similarity(&black, &beige), None);
        assert_eq!(FaceComparator::visual_similarity(&black, &black), None);
        assert_eq!(FaceComparator::visual_similarity(&gradient(false), &black), None);

        let document = ExtractedFace::fallback(beige, FaceOrigin::RegionFallback);
        let selfie = ExtractedFace::fallback(black, FaceOrigin::FullFrame);
        let matched = FaceComparator::compare_faces(&document, &selfie);
        assert!(!matched.comparable);
        assert_eq!(matched.score, 0);
        assert_eq!(matched.source, SimilaritySource::VisualFallback);
    }

    #[test]
    fn test_compare_faces_falls_back_without_descriptors() {
        let document = ExtractedFace::fallback(gradient(false), FaceOrigin::RegionFallback);
        let selfie = ExtractedFace::detected(gradient(false), Descriptor::new(vec![0.0; 128]));
        let matched = FaceComparator::compare_faces(&document, &selfie);
        assert_eq!(matched.source, SimilaritySource::VisualFallback);
        assert_eq!(matched.distance, None);
        assert_eq!(matched.score, 100);
        assert!(matched.comparable);
    }

    #[test]
    fn test_compare_faces_uses_descriptors() {
        let document = ExtractedFace::detected(gradient(false), Descriptor::new(vec![0.0; 4]));
        let selfie = ExtractedFace::detected(gradient(true), Descriptor::new(vec![0.35, 0.0, 0.0, 0.0]));
        let matched = FaceComparator::compare_faces(&document, &selfie);
        assert_eq!(matched.source, SimilaritySource::Descriptor);
        assert_eq!(matched.score, 87);
    }

    #[test]
    fn test_mismatched_descriptors_fall_back() {
        let document = ExtractedFace::detected(gradient(false), Descriptor::new(vec![0.0; 4]));
        let selfie = ExtractedFace::detected(gradient(false), Descriptor::new(vec![0.0; 3]));
        let matched = FaceComparator::compare_faces(&document, &selfie);
        assert_eq!(matched.source, SimilaritySource::VisualFallback);
    }
}
