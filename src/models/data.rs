use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::NaiveDate;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use serde::Serialize;

use crate::utils::VerificationError;

/// Axis-aligned face rectangle in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        BoundingBox {
            x,
            y,
            width,
            height,
        }
    }
}

/// Fixed-length face embedding produced by the face engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor(Vec<f32>);

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Descriptor(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn euclidean_distance(&self, other: &Descriptor) -> Result<f32, VerificationError> {
        if self.len() != other.len() {
            return Err(VerificationError::InvalidDescriptor(format!(
                "length mismatch: {} vs {}",
                self.len(),
                other.len()
            )));
        }
        if self.is_empty() {
            return Err(VerificationError::InvalidDescriptor(
                "empty descriptor".to_string(),
            ));
        }
        let sum: f32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Ok(sum.sqrt())
    }
}

/// Square, normalized face image handed to comparison and to the UI.
#[derive(Debug, Clone)]
pub struct FaceThumbnail {
    image: RgbImage,
}

impl FaceThumbnail {
    pub fn new(image: RgbImage) -> Self {
        FaceThumbnail { image }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, VerificationError> {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(self.image.clone())
            .write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Jpeg(quality))
            .map_err(|e| {
                VerificationError::ImageProcessingError(format!("Failed to encode face: {}", e))
            })?;
        Ok(buffer)
    }

    pub fn to_data_url(&self, quality: u8) -> Result<String, VerificationError> {
        let jpeg = self.to_jpeg(quality)?;
        Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg)))
    }
}

/// Where a face thumbnail came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaceOrigin {
    /// Located by the face engine; a descriptor is attached.
    Detected,
    /// Fixed proportional region of the document photo.
    RegionFallback,
    /// The whole selfie frame.
    FullFrame,
}

/// A face image, optionally with its descriptor. A descriptor never exists without its image.
#[derive(Debug, Clone)]
pub struct ExtractedFace {
    thumbnail: FaceThumbnail,
    descriptor: Option<Descriptor>,
    origin: FaceOrigin,
}

impl ExtractedFace {
    pub fn detected(thumbnail: FaceThumbnail, descriptor: Descriptor) -> Self {
        ExtractedFace {
            thumbnail,
            descriptor: Some(descriptor),
            origin: FaceOrigin::Detected,
        }
    }

    pub fn fallback(thumbnail: FaceThumbnail, origin: FaceOrigin) -> Self {
        ExtractedFace {
            thumbnail,
            descriptor: None,
            origin,
        }
    }

    pub fn thumbnail(&self) -> &FaceThumbnail {
        &self.thumbnail
    }

    pub fn descriptor(&self) -> Option<&Descriptor> {
        self.descriptor.as_ref()
    }

    pub fn origin(&self) -> FaceOrigin {
        self.origin
    }
}

/// One parse of OCR text into structured fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionCandidate {
    /// Devanagari name.
    pub name_script_a: Option<String>,
    /// Latin name.
    pub name_script_b: Option<String>,
    /// Normalized `DD/MM/YYYY`.
    pub date_of_birth: Option<String>,
    pub document_number: Option<String>,
    /// OCR configuration that produced this parse.
    pub configuration: Option<String>,
}

impl ExtractionCandidate {
    /// Latin name when present, otherwise the Devanagari one.
    pub fn full_name(&self) -> Option<&str> {
        self.name_script_b
            .as_deref()
            .or(self.name_script_a.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.name_script_a.is_none()
            && self.name_script_b.is_none()
            && self.date_of_birth.is_none()
            && self.document_number.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub full_name: String,
    pub name_script_a: Option<String>,
    pub name_script_b: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub document_number: Option<String>,
    pub source_image: Arc<[u8]>,
    pub face: Option<ExtractedFace>,
}

impl DocumentRecord {
    pub fn face_descriptor(&self) -> Option<&Descriptor> {
        self.face.as_ref().and_then(|face| face.descriptor())
    }
}

#[derive(Debug, Clone)]
pub struct SelfieRecord {
    pub photo: Arc<[u8]>,
    pub face: Option<ExtractedFace>,
}

impl SelfieRecord {
    pub fn face_descriptor(&self) -> Option<&Descriptor> {
        self.face.as_ref().and_then(|face| face.descriptor())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimilaritySource {
    /// Calibrated descriptor distance.
    Descriptor,
    /// Pixel-level comparison of the thumbnails; needs a human to confirm.
    VisualFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RejectionReason {
    FaceMismatch { score: u8, required: u8 },
    /// The faces could not be compared at all.
    FaceUnverifiable,
    Underage { age: i32, required: i32 },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RejectionReason::FaceMismatch { score, required } => write!(
                f,
                "Face match too low: {}% (required: {}%)",
                score, required
            ),
            RejectionReason::FaceUnverifiable => {
                f.write_str("Face could not be compared: an image has no usable detail")
            }
            RejectionReason::Underage { age, required } => write!(
                f,
                "Age requirement not met: {} years (required: {}+)",
                age, required
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub similarity: u8,
    pub verified: bool,
    pub age: i32,
    pub source: SimilaritySource,
    pub manual_review_required: bool,
    pub rejections: Vec<RejectionReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    DocumentProcessing,
    DocumentReady,
    SelfieCapturing,
    SelfieReady,
    Comparing,
    Verified,
    Rejected,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Verified | SessionState::Rejected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "Idle",
            SessionState::DocumentProcessing => "DocumentProcessing",
            SessionState::DocumentReady => "DocumentReady",
            SessionState::SelfieCapturing => "SelfieCapturing",
            SessionState::SelfieReady => "SelfieReady",
            SessionState::Comparing => "Comparing",
            SessionState::Verified => "Verified",
            SessionState::Rejected => "Rejected",
        };
        f.write_str(name)
    }
}

/// Conditions surfaced to the user without stopping the flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionNotice {
    /// No OCR pass produced usable text; fields need manual entry.
    OcrUnavailable,
    /// Face models failed to load. Reported once until retried.
    FaceModelsUnavailable(String),
    /// No face found on the document; a fixed region is used.
    DocumentFaceFallback,
    /// No face found in the selfie; the full frame is used.
    SelfieFaceFallback,
}
