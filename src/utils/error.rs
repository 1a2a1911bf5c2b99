use thiserror::Error;

use crate::capture::CameraError;

/// How a failure affects the verification flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A pass produced nothing usable; skip it and carry on.
    RecoverableDegrade,
    /// Face extraction failed; a fallback crop replaces it.
    RecoverableFallback,
    /// The user must fix something before the flow can move on.
    UserInput,
    /// Engine or runtime failure; surfaced once and retried only on request.
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Image processing error: {0}")]
    ImageProcessingError(String),
    #[error("OCR error: {0}")]
    OcrError(String),
    #[error("Face detection error: {0}")]
    FaceDetectionError(String),
    #[error("Model loading error: {0}")]
    ModelLoadError(String),
    #[error("Invalid face descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
    #[error("Cannot {action} while session is {state}")]
    InvalidTransition { state: String, action: &'static str },
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl VerificationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            VerificationError::OcrError(_) => ErrorCategory::RecoverableDegrade,
            VerificationError::FaceDetectionError(_)
            | VerificationError::InvalidDescriptor(_)
            | VerificationError::ImageProcessingError(_) => ErrorCategory::RecoverableFallback,
            VerificationError::InvalidInput(_)
            | VerificationError::InvalidDate(_)
            | VerificationError::InvalidUpload(_)
            | VerificationError::InvalidTransition { .. } => ErrorCategory::UserInput,
            VerificationError::Camera(err) if err.is_user_actionable() => ErrorCategory::UserInput,
            VerificationError::Camera(_)
            | VerificationError::ModelLoadError(_)
            | VerificationError::ConfigError(_)
            | VerificationError::IoError(_) => ErrorCategory::Infrastructure,
        }
    }
}

impl From<std::io::Error> for VerificationError {
    fn from(err: std::io::Error) -> Self {
        VerificationError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_follow_taxonomy() {
        assert_eq!(
            VerificationError::OcrError("empty".into()).category(),
            ErrorCategory::RecoverableDegrade
        );
        assert_eq!(
            VerificationError::FaceDetectionError("no face".into()).category(),
            ErrorCategory::RecoverableFallback
        );
        assert_eq!(
            VerificationError::InvalidDate("32/01/2000".into()).category(),
            ErrorCategory::UserInput
        );
        assert_eq!(
            VerificationError::ModelLoadError("weights".into()).category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            VerificationError::Camera(CameraError::PermissionDenied).category(),
            ErrorCategory::UserInput
        );
        assert_eq!(
            VerificationError::Camera(CameraError::Unsupported).category(),
            ErrorCategory::Infrastructure
        );
    }

    #[test]
    fn test_transition_message() {
        let err = VerificationError::InvalidTransition {
            state: "Idle".to_string(),
            action: "compare",
        };
        assert_eq!(err.to_string(), "Cannot compare while session is Idle");
    }
}
