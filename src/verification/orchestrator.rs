use std::sync::Arc;

use chrono::{Local, NaiveDate};
use image::DynamicImage;
use log::{info, warn};
use tokio::sync::watch;

use crate::capture::{Camera, CameraLease};
use crate::models::{
    DocumentRecord, ExtractedFace, FaceOrigin, ReferenceCorpus, RejectionReason, SessionNotice,
    SessionState, SimilaritySource, VerdictPolicy, VerificationConfig, VerificationResult,
};
use crate::processing::{
    FaceComparator, FaceEngine, FaceExtraction, FaceLocator, FaceMatch, FaceSource,
    ImageProcessor, OcrEngine, OcrProgress, TextRecognizer,
};
use crate::utils::VerificationError;
use crate::validation::{calculate_age, parse_date_of_birth, validate_document_upload};
use crate::verification::session::SessionStore;

/// Combines a face match and an age into a verdict.
pub fn decide(matched: &FaceMatch, age: i32, policy: &VerdictPolicy) -> VerificationResult {
    let mut rejections = Vec::new();
    if !matched.comparable {
        rejections.push(RejectionReason::FaceUnverifiable);
    } else if matched.score < policy.min_similarity {
        rejections.push(RejectionReason::FaceMismatch {
            score: matched.score,
            required: policy.min_similarity,
        });
    }
    if age < policy.min_age {
        rejections.push(RejectionReason::Underage {
            age,
            required: policy.min_age,
        });
    }

    VerificationResult {
        similarity: matched.score,
        verified: rejections.is_empty(),
        age,
        source: matched.source,
        manual_review_required: matched.source == SimilaritySource::VisualFallback,
        rejections,
    }
}

/// One verification flow: document, then selfie, then a single comparison.
///
/// Every user action is a method taking `&mut self`, so transitions never
/// overlap. Observers follow state changes through [`VerificationSession::subscribe`].
pub struct VerificationSession {
    config: VerificationConfig,
    recognizer: TextRecognizer,
    locator: FaceLocator,
    store: SessionStore,
    state: watch::Sender<SessionState>,
    notices: Vec<SessionNotice>,
    models_notice_raised: bool,
    today: Option<NaiveDate>,
}

impl VerificationSession {
    pub fn new(
        config: VerificationConfig,
        ocr_engine: Arc<dyn OcrEngine>,
        face_engine: Arc<dyn FaceEngine>,
    ) -> Result<Self, VerificationError> {
        config.validate()?;
        let corpus = if config.use_reference_corpus {
            ReferenceCorpus::builtin()
        } else {
            ReferenceCorpus::empty()
        };
        let recognizer = TextRecognizer::new(ocr_engine, &config.ocr, Arc::new(corpus));
        let locator = FaceLocator::new(face_engine, config.face.clone());
        let (state, _) = watch::channel(SessionState::Idle);

        Ok(VerificationSession {
            config,
            recognizer,
            locator,
            store: SessionStore::new(),
            state,
            notices: Vec::new(),
            models_notice_raised: false,
            today: None,
        })
    }

    /// Fixes the date used for age calculation instead of the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn document(&self) -> Option<&DocumentRecord> {
        self.store.document()
    }

    pub fn result(&self) -> Option<&VerificationResult> {
        self.store.result()
    }

    pub fn notices(&self) -> &[SessionNotice] {
        &self.notices
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    fn stored_face(&self, source: FaceSource) -> Option<&ExtractedFace> {
        match source {
            FaceSource::Document => self.store.document().and_then(|d| d.face.as_ref()),
            FaceSource::Selfie => self.store.selfie().and_then(|s| s.face.as_ref()),
        }
    }

    /// The stored face thumbnail as a JPEG at the configured quality.
    pub fn face_jpeg(&self, source: FaceSource) -> Result<Option<Vec<u8>>, VerificationError> {
        self.stored_face(source)
            .map(|face| face.thumbnail().to_jpeg(self.config.face.jpeg_quality))
            .transpose()
    }

    /// The stored face thumbnail as a `data:image/jpeg;base64,` URL.
    pub fn face_data_url(&self, source: FaceSource) -> Result<Option<String>, VerificationError> {
        self.stored_face(source)
            .map(|face| face.thumbnail().to_data_url(self.config.face.jpeg_quality))
            .transpose()
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!("Session state {} -> {}", previous, next);
        }
    }

    fn require(&self, allowed: &[SessionState], action: &'static str) -> Result<(), VerificationError> {
        let current = self.state();
        if allowed.contains(&current) {
            Ok(())
        } else {
            Err(VerificationError::InvalidTransition {
                state: current.to_string(),
                action,
            })
        }
    }

    fn notify(&mut self, notice: SessionNotice) {
        if !self.notices.contains(&notice) {
            self.notices.push(notice);
        }
    }

    fn note_face_extraction(&mut self, extraction: &FaceExtraction, fallback_notice: SessionNotice) {
        if let Some(message) = &extraction.model_error {
            // Raised once per failure; only an explicit retry re-arms it.
            if !self.models_notice_raised {
                self.models_notice_raised = true;
                self.notify(SessionNotice::FaceModelsUnavailable(message.clone()));
            }
        }
        if extraction.face.origin() != FaceOrigin::Detected {
            self.notify(fallback_notice);
        }
    }

    /// Reads a document image and extracts its fields and face.
    ///
    /// Allowed from `Idle`, and from `DocumentReady` to replace the document.
    /// OCR or face detection failures never fail the upload: fields are left
    /// empty for manual entry and a fallback face region is used.
    pub async fn upload_document(
        &mut self,
        bytes: &[u8],
        progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> Result<&DocumentRecord, VerificationError> {
        self.require(
            &[SessionState::Idle, SessionState::DocumentReady],
            "upload a document",
        )?;
        validate_document_upload(bytes, &self.config.upload)?;
        let image = ImageProcessor::decode(bytes)?;

        let previous = self.state();
        self.set_state(SessionState::DocumentProcessing);
        // A new document drops the selfie too, so none of these still apply.
        self.notices.retain(|n| {
            !matches!(
                n,
                SessionNotice::OcrUnavailable
                    | SessionNotice::DocumentFaceFallback
                    | SessionNotice::SelfieFaceFallback
            )
        });

        match self.process_document(bytes, &image, progress).await {
            Ok(record) => {
                self.store.set_document_data(record);
                self.set_state(SessionState::DocumentReady);
                self.store.document().ok_or_else(|| {
                    VerificationError::InvalidInput("Document was not stored".to_string())
                })
            }
            Err(e) => {
                warn!("Document processing failed: {}", e);
                self.set_state(previous);
                Err(e)
            }
        }
    }

    async fn process_document(
        &mut self,
        bytes: &[u8],
        image: &DynamicImage,
        progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> Result<DocumentRecord, VerificationError> {
        let outcome = self.recognizer.recognize(bytes, progress).await;
        if !outcome.produced_text() {
            warn!("No OCR configuration produced text; fields need manual entry");
            self.notify(SessionNotice::OcrUnavailable);
        }

        let extraction = self.locator.extract(image, FaceSource::Document).await?;
        self.note_face_extraction(&extraction, SessionNotice::DocumentFaceFallback);

        let candidate = outcome.candidate;
        let date_of_birth = candidate
            .date_of_birth
            .as_deref()
            .and_then(|dob| parse_date_of_birth(dob).ok());

        Ok(DocumentRecord {
            full_name: candidate.full_name().unwrap_or_default().to_string(),
            name_script_a: candidate.name_script_a.clone(),
            name_script_b: candidate.name_script_b.clone(),
            date_of_birth,
            document_number: candidate.document_number.clone(),
            source_image: Arc::from(bytes),
            face: Some(extraction.face),
        })
    }

    /// Manual correction of the extracted name and date of birth.
    pub fn correct_document(
        &mut self,
        full_name: Option<&str>,
        date_of_birth: Option<&str>,
    ) -> Result<&DocumentRecord, VerificationError> {
        self.require(&[SessionState::DocumentReady], "correct the document")?;

        let name = match full_name {
            Some(name) if name.trim().is_empty() => {
                return Err(VerificationError::InvalidInput(
                    "Please enter your full name".to_string(),
                ))
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        let date = date_of_birth.map(parse_date_of_birth).transpose()?;

        let record = self.store.document_mut().ok_or_else(|| {
            VerificationError::InvalidInput("No document has been uploaded".to_string())
        })?;
        if let Some(name) = name {
            record.full_name = name;
        }
        if let Some(date) = date {
            record.date_of_birth = Some(date);
        }
        Ok(&*record)
    }

    pub fn begin_selfie(&mut self) -> Result<(), VerificationError> {
        self.require(&[SessionState::DocumentReady], "start the selfie")?;
        let record = self.store.document().ok_or_else(|| {
            VerificationError::InvalidInput("No document has been uploaded".to_string())
        })?;
        if record.full_name.trim().is_empty() {
            return Err(VerificationError::InvalidInput(
                "Please enter your full name".to_string(),
            ));
        }
        if record.date_of_birth.is_none() {
            return Err(VerificationError::InvalidInput(
                "Please enter your date of birth".to_string(),
            ));
        }
        if record.face.is_none() {
            return Err(VerificationError::InvalidInput(
                "No face image is available from the document".to_string(),
            ));
        }
        self.set_state(SessionState::SelfieCapturing);
        Ok(())
    }

    /// Grabs one frame from `camera`, releasing it before any processing.
    pub async fn capture_selfie(&mut self, camera: &mut dyn Camera) -> Result<(), VerificationError> {
        self.require(&[SessionState::SelfieCapturing], "capture a selfie")?;
        let frame = {
            let mut lease = CameraLease::acquire(camera)?;
            let frame = lease.capture_frame();
            lease.release();
            frame?
        };
        self.submit_selfie(frame).await
    }

    pub async fn submit_selfie(&mut self, frame: DynamicImage) -> Result<(), VerificationError> {
        self.require(&[SessionState::SelfieCapturing], "submit a selfie")?;

        let frame = if self.config.face.mirror_selfie {
            ImageProcessor::mirror(&frame)
        } else {
            frame
        };
        let photo = ImageProcessor::encode_jpeg(&frame, self.config.face.selfie_jpeg_quality)?;
        let extraction = self.locator.extract(&frame, FaceSource::Selfie).await?;

        self.notices.retain(|n| *n != SessionNotice::SelfieFaceFallback);
        self.note_face_extraction(&extraction, SessionNotice::SelfieFaceFallback);
        self.store.set_selfie_photo(Arc::from(photo));
        self.store.set_selfie_face_data(extraction.face)?;
        self.set_state(SessionState::SelfieReady);
        Ok(())
    }

    pub fn retake_selfie(&mut self) -> Result<(), VerificationError> {
        self.require(&[SessionState::SelfieReady], "retake the selfie")?;
        self.set_state(SessionState::SelfieCapturing);
        Ok(())
    }

    /// Compares the document and selfie faces and checks the age.
    ///
    /// Runs once; calling again in a terminal state returns the stored result.
    pub fn compare(&mut self) -> Result<VerificationResult, VerificationError> {
        if self.state().is_terminal() {
            if let Some(result) = self.store.result() {
                return Ok(result.clone());
            }
        }
        self.require(&[SessionState::SelfieReady], "compare faces")?;
        self.set_state(SessionState::Comparing);

        match self.evaluate() {
            Ok(result) => {
                info!(
                    "Verification {}: similarity {}% ({:?}), age {}",
                    if result.verified { "passed" } else { "failed" },
                    result.similarity,
                    result.source,
                    result.age
                );
                for reason in &result.rejections {
                    info!("Rejected: {}", reason);
                }
                self.store.set_comparison_result(result.clone());
                self.set_state(if result.verified {
                    SessionState::Verified
                } else {
                    SessionState::Rejected
                });
                Ok(result)
            }
            Err(e) => {
                self.set_state(SessionState::SelfieReady);
                Err(e)
            }
        }
    }

    fn evaluate(&self) -> Result<VerificationResult, VerificationError> {
        let missing = |what: &str| VerificationError::InvalidInput(format!("Missing {}", what));
        let document = self.store.document().ok_or_else(|| missing("document"))?;
        let selfie = self.store.selfie().ok_or_else(|| missing("selfie"))?;
        let date_of_birth = document.date_of_birth.ok_or_else(|| missing("date of birth"))?;
        let document_face: &ExtractedFace = document.face.as_ref().ok_or_else(|| missing("document face"))?;
        let selfie_face: &ExtractedFace = selfie.face.as_ref().ok_or_else(|| missing("selfie face"))?;

        let age = calculate_age(date_of_birth, self.today());
        let matched = FaceComparator::compare_faces(document_face, selfie_face);
        Ok(decide(&matched, age, &self.config.policy))
    }

    /// Explicit user retry after the face models failed to load.
    pub async fn retry_face_models(&mut self) -> Result<(), VerificationError> {
        match self.locator.retry_initialization().await {
            Ok(()) => {
                self.models_notice_raised = false;
                self.notices
                    .retain(|n| !matches!(n, SessionNotice::FaceModelsUnavailable(_)));
                Ok(())
            }
            Err(e) => {
                if let VerificationError::ModelLoadError(message) = &e {
                    self.notices
                        .retain(|n| !matches!(n, SessionNotice::FaceModelsUnavailable(_)));
                    self.notify(SessionNotice::FaceModelsUnavailable(message.clone()));
                    self.models_notice_raised = true;
                }
                Err(e)
            }
        }
    }

    /// Returns to `Idle` from any state. Loaded face models are kept.
    pub fn reset(&mut self) {
        self.store.reset();
        self.notices.clear();
        self.models_notice_raised = false;
        self.set_state(SessionState::Idle);
    }
}
