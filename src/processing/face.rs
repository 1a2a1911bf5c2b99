use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use log::{info, warn};
use tokio::sync::Mutex;

use crate::models::{
    BoundingBox, Descriptor, ExtractedFace, FaceOrigin, FaceSettings, FaceThumbnail,
};
use crate::processing::image::ImageProcessor;
use crate::utils::VerificationError;

/// Which detector network to run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorKind {
    /// Accurate single-shot detector.
    Primary { min_confidence: f32 },
    /// Small, fast detector used when the primary finds nothing.
    Secondary { input_size: u32, score_threshold: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    pub descriptor: Descriptor,
    pub confidence: f32,
}

/// Face detection and embedding backend.
#[async_trait]
pub trait FaceEngine: Send + Sync {
    async fn load_models(&self) -> Result<(), VerificationError>;

    /// The single most prominent face, with landmarks aligned and a descriptor computed.
    async fn detect(
        &self,
        image: &DynamicImage,
        detector: DetectorKind,
    ) -> Result<Option<FaceDetection>, VerificationError>;
}

/// Engine used when no face backend is available in the build.
#[derive(Debug, Clone)]
pub struct UnavailableFaceEngine {
    reason: String,
}

impl UnavailableFaceEngine {
    pub fn new(reason: &str) -> Self {
        UnavailableFaceEngine {
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl FaceEngine for UnavailableFaceEngine {
    async fn load_models(&self) -> Result<(), VerificationError> {
        Err(VerificationError::ModelLoadError(self.reason.clone()))
    }

    async fn detect(
        &self,
        _image: &DynamicImage,
        _detector: DetectorKind,
    ) -> Result<Option<FaceDetection>, VerificationError> {
        Err(VerificationError::ModelLoadError(self.reason.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceSource {
    Document,
    Selfie,
}

/// A face thumbnail plus the model failure that forced a fallback, if any.
#[derive(Debug, Clone)]
pub struct FaceExtraction {
    pub face: ExtractedFace,
    pub model_error: Option<String>,
}

/// Loads the face models once and finds faces with a primary-then-secondary strategy.
pub struct FaceLocator {
    engine: Arc<dyn FaceEngine>,
    state: Mutex<ModelState>,
    settings: FaceSettings,
}

impl FaceLocator {
    pub fn new(engine: Arc<dyn FaceEngine>, settings: FaceSettings) -> Self {
        FaceLocator {
            engine,
            state: Mutex::new(ModelState::Unloaded),
            settings,
        }
    }

    pub async fn state(&self) -> ModelState {
        self.state.lock().await.clone()
    }

    /// Loads models on first use. A stored failure is returned again without reloading.
    pub async fn initialize(&self) -> Result<(), VerificationError> {
        let mut state = self.state.lock().await;
        match &*state {
            ModelState::Ready => Ok(()),
            ModelState::Failed(message) => Err(VerificationError::ModelLoadError(message.clone())),
            ModelState::Unloaded => {
                info!("Loading face models");
                match self.engine.load_models().await {
                    Ok(()) => {
                        info!("Face models loaded");
                        *state = ModelState::Ready;
                        Ok(())
                    }
                    Err(e) => {
                        let message = match e {
                            VerificationError::ModelLoadError(message) => message,
                            other => other.to_string(),
                        };
                        warn!("Face models failed to load: {}", message);
                        *state = ModelState::Failed(message.clone());
                        Err(VerificationError::ModelLoadError(message))
                    }
                }
            }
        }
    }

    /// Clears a stored failure and loads again.
    pub async fn retry_initialization(&self) -> Result<(), VerificationError> {
        {
            let mut state = self.state.lock().await;
            if matches!(*state, ModelState::Failed(_)) {
                *state = ModelState::Unloaded;
            }
        }
        self.initialize().await
    }

    fn primary(&self) -> DetectorKind {
        DetectorKind::Primary {
            min_confidence: self.settings.primary_min_confidence,
        }
    }

    fn secondary(&self) -> DetectorKind {
        DetectorKind::Secondary {
            input_size: self.settings.secondary_input_size,
            score_threshold: self.settings.secondary_score_threshold,
        }
    }

    async fn detect_with(&self, image: &DynamicImage, detector: DetectorKind) -> Option<FaceDetection> {
        match self.engine.detect(image, detector).await {
            Ok(detection) => detection,
            Err(e) => {
                warn!("Face detection with {:?} failed: {}", detector, e);
                None
            }
        }
    }

    /// Finds the most prominent face. Detection errors count as "no face".
    pub async fn locate(&self, image: &DynamicImage) -> Result<Option<FaceDetection>, VerificationError> {
        self.initialize().await?;

        if let Some(detection) = self.detect_with(image, self.primary()).await {
            return Ok(Some(detection));
        }
        info!("Primary detector found no face, trying secondary detector");
        Ok(self.detect_with(image, self.secondary()).await)
    }

    fn fallback(&self, image: &DynamicImage, source: FaceSource) -> Result<ExtractedFace, VerificationError> {
        let size = self.settings.thumbnail_size;
        let face = match source {
            FaceSource::Document => ExtractedFace::fallback(
                ImageProcessor::crop_region(image, &self.settings.document_fallback_region, size)?,
                FaceOrigin::RegionFallback,
            ),
            FaceSource::Selfie => ExtractedFace::fallback(
                ImageProcessor::full_frame(image, size)?,
                FaceOrigin::FullFrame,
            ),
        };
        Ok(face)
    }

    fn crop_detected(
        &self,
        image: &DynamicImage,
        detection: &FaceDetection,
        source: FaceSource,
    ) -> Result<FaceThumbnail, VerificationError> {
        let padding = match source {
            FaceSource::Document => self.settings.document_padding,
            FaceSource::Selfie => self.settings.selfie_padding,
        };
        ImageProcessor::crop_face(image, &detection.bbox, padding, self.settings.thumbnail_size)
    }

    /// Produces a face thumbnail for `image`, falling back to a deterministic
    /// crop when the models are unavailable or no face is found.
    pub async fn extract(
        &self,
        image: &DynamicImage,
        source: FaceSource,
    ) -> Result<FaceExtraction, VerificationError> {
        let detection = match self.locate(image).await {
            Ok(detection) => detection,
            Err(VerificationError::ModelLoadError(message)) => {
                return Ok(FaceExtraction {
                    face: self.fallback(image, source)?,
                    model_error: Some(message),
                });
            }
            Err(e) => return Err(e),
        };

        let face = match detection {
            Some(detection) => match self.crop_detected(image, &detection, source) {
                Ok(thumbnail) => {
                    info!(
                        "Face detected in {:?} with confidence {:.2}",
                        source, detection.confidence
                    );
                    ExtractedFace::detected(thumbnail, detection.descriptor)
                }
                Err(e) => {
                    warn!("Could not crop detected face, using fallback: {}", e);
                    self.fallback(image, source)?
                }
            },
            None => {
                warn!("No face found in {:?}, using fallback crop", source);
                self.fallback(image, source)?
            }
        };

        Ok(FaceExtraction {
            face,
            model_error: None,
        })
    }
}
