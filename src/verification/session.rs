use std::sync::Arc;

use crate::models::{DocumentRecord, ExtractedFace, SelfieRecord, VerificationResult};
use crate::utils::VerificationError;

/// Read state shared with UI collaborators, plus its four mutators and a reset.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    document: Option<DocumentRecord>,
    selfie: Option<SelfieRecord>,
    result: Option<VerificationResult>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> Option<&DocumentRecord> {
        self.document.as_ref()
    }

    pub fn selfie(&self) -> Option<&SelfieRecord> {
        self.selfie.as_ref()
    }

    pub fn result(&self) -> Option<&VerificationResult> {
        self.result.as_ref()
    }

    /// Replaces the document. Anything derived from the previous one is dropped.
    pub fn set_document_data(&mut self, record: DocumentRecord) {
        self.document = Some(record);
        self.selfie = None;
        self.result = None;
    }

    pub(crate) fn document_mut(&mut self) -> Option<&mut DocumentRecord> {
        self.document.as_mut()
    }

    /// Starts a new selfie record, replacing any earlier capture.
    pub fn set_selfie_photo(&mut self, photo: Arc<[u8]>) {
        self.selfie = Some(SelfieRecord { photo, face: None });
        self.result = None;
    }

    pub fn set_selfie_face_data(&mut self, face: ExtractedFace) -> Result<(), VerificationError> {
        let selfie = self.selfie.as_mut().ok_or_else(|| {
            VerificationError::InvalidInput("No selfie photo has been captured".to_string())
        })?;
        selfie.face = Some(face);
        Ok(())
    }

    pub fn set_comparison_result(&mut self, result: VerificationResult) {
        self.result = Some(result);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FaceOrigin, FaceThumbnail, SimilaritySource};
    use image::RgbImage;

    fn record() -> DocumentRecord {
        DocumentRecord {
            full_name: "Ramesh Yadav".to_string(),
            name_script_a: None,
            name_script_b: Some("Ramesh Yadav".to_string()),
            date_of_birth: None,
            document_number: None,
            source_image: Arc::from(vec![1u8, 2, 3]),
            face: None,
        }
    }

    fn face() -> ExtractedFace {
        ExtractedFace::fallback(FaceThumbnail::new(RgbImage::new(4, 4)), FaceOrigin::FullFrame)
    }

    #[test]
    fn test_face_data_requires_photo() {
        let mut store = SessionStore::new();
        assert!(store.set_selfie_face_data(face()).is_err());
        store.set_selfie_photo(Arc::from(vec![0u8]));
        store.set_selfie_face_data(face()).unwrap();
        assert!(store.selfie().unwrap().face.is_some());
    }

    #[test]
    fn test_new_document_clears_downstream_state() {
        let mut store = SessionStore::new();
        store.set_document_data(record());
        store.set_selfie_photo(Arc::from(vec![0u8]));
        store.set_comparison_result(VerificationResult {
            similarity: 70,
            verified: true,
            age: 30,
            source: SimilaritySource::Descriptor,
            manual_review_required: false,
            rejections: Vec::new(),
        });

        store.set_document_data(record());
        assert!(store.selfie().is_none());
        assert!(store.result().is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = SessionStore::new();
        store.set_document_data(record());
        store.set_selfie_photo(Arc::from(vec![0u8]));
        store.reset();
        assert!(store.document().is_none());
        assert!(store.selfie().is_none());
    }
}
