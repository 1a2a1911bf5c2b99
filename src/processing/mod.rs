pub mod best_of;
pub mod comparison;
pub mod extractors;
pub mod face;
pub mod image;
pub mod ocr;
pub mod scoring;
pub mod tesseract;

pub use best_of::{select_best, BestOf};
pub use comparison::{FaceComparator, FaceMatch, Similarity};
pub use extractors::FieldExtractor;
pub use face::{
    DetectorKind, FaceDetection, FaceEngine, FaceExtraction, FaceLocator, FaceSource, ModelState,
    UnavailableFaceEngine,
};
pub use self::image::ImageProcessor;
pub use ocr::{AttemptReport, AttemptStatus, OcrEngine, OcrProgress, RecognitionOutcome, TextRecognizer};
pub use scoring::ExtractionScorer;
pub use self::tesseract::TesseractEngine;
