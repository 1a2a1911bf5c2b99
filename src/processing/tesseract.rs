use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tempfile::NamedTempFile;
use tesseract::{OcrEngineMode, PageSegMode, Tesseract};
use tokio::sync::Mutex;
use tokio::task::JoinError;

use crate::models::{EngineMode, OcrConfiguration, PageSegmentation};
use crate::processing::ocr::OcrEngine;
use crate::utils::VerificationError;

/// Runs `job` on the blocking pool while holding `gate`.
///
/// The guard moves into the blocking task, so a caller that stops waiting
/// (a timed-out pass) still keeps later jobs queued until this one finishes.
async fn run_exclusive<T, F>(gate: &Arc<Mutex<()>>, job: F) -> Result<T, JoinError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let guard = gate.clone().lock_owned().await;
    tokio::task::spawn_blocking(move || {
        let result = job();
        drop(guard);
        result
    })
    .await
}

/// [`OcrEngine`] backed by the system tesseract library.
///
/// Only one recognition runs at a time, even across clones of the engine.
#[derive(Debug, Clone, Default)]
pub struct TesseractEngine {
    tessdata_path: Option<String>,
    gate: Arc<Mutex<()>>,
}

impl TesseractEngine {
    pub fn new(tessdata_path: Option<String>) -> Self {
        TesseractEngine {
            tessdata_path,
            gate: Arc::new(Mutex::new(())),
        }
    }

    fn page_seg_mode(mode: PageSegmentation) -> PageSegMode {
        match mode {
            PageSegmentation::Auto => PageSegMode::PsmAuto,
            PageSegmentation::SingleBlock => PageSegMode::PsmSingleBlock,
            PageSegmentation::SingleLine => PageSegMode::PsmSingleLine,
        }
    }

    fn engine_mode(mode: EngineMode) -> OcrEngineMode {
        match mode {
            EngineMode::Default => OcrEngineMode::Default,
            EngineMode::LstmOnly => OcrEngineMode::LstmOnly,
        }
    }

    fn run_blocking(
        tessdata_path: Option<&str>,
        image_data: &[u8],
        configuration: &OcrConfiguration,
    ) -> Result<String, VerificationError> {
        let mut temp_file = NamedTempFile::new()
            .map_err(|e| VerificationError::OcrError(format!("Failed to create temp file: {}", e)))?;
        temp_file
            .write_all(image_data)
            .map_err(|e| VerificationError::OcrError(format!("Failed to write to temp file: {}", e)))?;
        let image_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| VerificationError::OcrError("Failed to convert path to string".to_string()))?;

        let languages = configuration.language_spec();
        let mut tess = Tesseract::new_with_oem(
            tessdata_path,
            Some(&languages),
            Self::engine_mode(configuration.engine_mode),
        )
        .map_err(|e| VerificationError::OcrError(format!("Tesseract init error ({}): {}", languages, e)))?;

        if let Some(whitelist) = &configuration.whitelist {
            tess = tess
                .set_variable("tessedit_char_whitelist", whitelist)
                .map_err(|e| VerificationError::OcrError(format!("Tesseract set variable error: {}", e)))?;
        }
        let preserve = if configuration.preserve_interword_spaces { "1" } else { "0" };
        tess = tess
            .set_variable("preserve_interword_spaces", preserve)
            .map_err(|e| VerificationError::OcrError(format!("Tesseract set variable error: {}", e)))?;

        // Page seg mode is set in place, unlike the consuming setters.
        tess.set_page_seg_mode(Self::page_seg_mode(configuration.page_segmentation));

        let mut tess = tess
            .set_image(image_path)
            .map_err(|e| VerificationError::OcrError(format!("Tesseract set image error: {}", e)))?;

        tess.get_text()
            .map_err(|e| VerificationError::OcrError(format!("Tesseract error: {}", e)))
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(
        &self,
        image: &[u8],
        configuration: &OcrConfiguration,
        progress: &(dyn Fn(f32) + Send + Sync),
    ) -> Result<String, VerificationError> {
        progress(0.0);
        let tessdata_path = self.tessdata_path.clone();
        let image = image.to_vec();
        let config = configuration.clone();

        debug!("Running tesseract with languages {}", config.language_spec());
        let text = run_exclusive(&self.gate, move || {
            Self::run_blocking(tessdata_path.as_deref(), &image, &config)
        })
        .await
        .map_err(|e| VerificationError::OcrError(format!("OCR task failed: {}", e)))??;

        progress(1.0);
        Ok(text)
    }
}
