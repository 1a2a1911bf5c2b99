use image::ImageFormat;

use crate::models::UploadPolicy;
use crate::utils::VerificationError;

/// Checks an uploaded document before any OCR work starts.
pub fn validate_document_upload(
    bytes: &[u8],
    policy: &UploadPolicy,
) -> Result<ImageFormat, VerificationError> {
    if bytes.is_empty() {
        return Err(VerificationError::InvalidUpload(
            "The uploaded file is empty".to_string(),
        ));
    }
    if bytes.len() > policy.max_bytes {
        return Err(VerificationError::InvalidUpload(format!(
            "File size should be less than {}MB",
            policy.max_bytes / (1024 * 1024)
        )));
    }
    if bytes.starts_with(b"%PDF") {
        return Err(VerificationError::InvalidUpload(
            "PDF documents are not supported; please upload a photo of the card (JPEG or PNG)"
                .to_string(),
        ));
    }

    match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => Ok(format),
        _ => Err(VerificationError::InvalidUpload(
            "Please upload a valid image (JPEG or PNG)".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::png_bytes;

    #[test]
    fn test_accepts_png() {
        let bytes = png_bytes(10, 10, [0, 0, 0]);
        assert_eq!(
            validate_document_upload(&bytes, &UploadPolicy::default()).unwrap(),
            ImageFormat::Png
        );
    }

    #[test]
    fn test_rejects_oversized() {
        let bytes = png_bytes(10, 10, [0, 0, 0]);
        let policy = UploadPolicy { max_bytes: 8 };
        let err = validate_document_upload(&bytes, &policy).unwrap_err();
        assert!(matches!(err, VerificationError::InvalidUpload(_)));
    }

    #[test]
    fn test_rejects_pdf_and_garbage() {
        let policy = UploadPolicy::default();
        assert!(validate_document_upload(b"%PDF-1.7 ...", &policy).is_err());
        assert!(validate_document_upload(b"hello world", &policy).is_err());
        assert!(validate_document_upload(b"", &policy).is_err());
    }
}
