use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::VerificationError;

const DEVANAGARI_WHITELIST: &str =
    "अआइईउऊऋएऐओऔकखगघङचछजझञटठडढणतथदधनपफबभमयरलवशषसहक्षत्रज्ञ०१२३४५६७८९";
const LATIN_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789/: ";

/// Page segmentation mode handed to the OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSegmentation {
    Auto,
    SingleBlock,
    SingleLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineMode {
    Default,
    LstmOnly,
}

/// One OCR pass over the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrConfiguration {
    pub name: String,
    pub languages: Vec<String>,
    pub page_segmentation: PageSegmentation,
    #[serde(default)]
    pub whitelist: Option<String>,
    #[serde(default = "default_engine_mode")]
    pub engine_mode: EngineMode,
    #[serde(default = "default_true")]
    pub preserve_interword_spaces: bool,
}

impl OcrConfiguration {
    pub fn new(name: &str, languages: &[&str], page_segmentation: PageSegmentation) -> Self {
        OcrConfiguration {
            name: name.to_string(),
            languages: languages.iter().map(|l| l.to_string()).collect(),
            page_segmentation,
            whitelist: None,
            engine_mode: EngineMode::Default,
            preserve_interword_spaces: true,
        }
    }

    pub fn with_whitelist(mut self, whitelist: &str) -> Self {
        self.whitelist = Some(whitelist.to_string());
        self
    }

    pub fn with_engine_mode(mut self, engine_mode: EngineMode) -> Self {
        self.engine_mode = engine_mode;
        self
    }

    /// Language set in tesseract's `hin+eng` form.
    pub fn language_spec(&self) -> String {
        self.languages.join("+")
    }

    /// The five passes used for Aadhaar cards: Devanagari first, then mixed, then Latin.
    pub fn default_passes() -> Vec<OcrConfiguration> {
        let dual_whitelist = format!("{}।{}", LATIN_WHITELIST, DEVANAGARI_WHITELIST);
        vec![
            OcrConfiguration::new("Hindi auto", &["hin"], PageSegmentation::Auto)
                .with_whitelist(DEVANAGARI_WHITELIST)
                .with_engine_mode(EngineMode::LstmOnly),
            OcrConfiguration::new("Hindi block", &["hin"], PageSegmentation::SingleBlock)
                .with_whitelist(DEVANAGARI_WHITELIST),
            OcrConfiguration::new("Hindi line", &["hin"], PageSegmentation::SingleLine)
                .with_whitelist(DEVANAGARI_WHITELIST),
            OcrConfiguration::new("Dual language", &["hin", "eng"], PageSegmentation::Auto)
                .with_whitelist(&dual_whitelist),
            OcrConfiguration::new("English", &["eng"], PageSegmentation::Auto)
                .with_whitelist(LATIN_WHITELIST),
        ]
    }
}

fn default_engine_mode() -> EngineMode {
    EngineMode::Default
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub configurations: Vec<OcrConfiguration>,
    /// Stop trying further passes once a parse scores at least this much.
    pub early_stop_score: i32,
    /// Per-pass time budget; a pass that overruns is skipped.
    pub attempt_timeout_secs: Option<u64>,
    pub tessdata_path: Option<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            configurations: OcrConfiguration::default_passes(),
            early_stop_score: 90,
            attempt_timeout_secs: Some(120),
            tessdata_path: None,
        }
    }
}

impl OcrSettings {
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_secs.map(Duration::from_secs)
    }
}

/// Fractional rectangle of an image, each component in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionFraction {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceSettings {
    pub thumbnail_size: u32,
    /// Padding around a document face, relative to the box's smaller side.
    pub document_padding: f32,
    pub selfie_padding: f32,
    pub primary_min_confidence: f32,
    pub secondary_input_size: u32,
    pub secondary_score_threshold: f32,
    /// Where the portrait usually sits on the card.
    pub document_fallback_region: RegionFraction,
    pub jpeg_quality: u8,
    pub selfie_jpeg_quality: u8,
    /// Captured frames are flipped so they match the preview the user saw.
    pub mirror_selfie: bool,
}

impl Default for FaceSettings {
    fn default() -> Self {
        Self {
            thumbnail_size: 300,
            document_padding: 0.4,
            selfie_padding: 0.3,
            primary_min_confidence: 0.3,
            secondary_input_size: 416,
            secondary_score_threshold: 0.3,
            document_fallback_region: RegionFraction {
                x: 0.05,
                y: 0.25,
                width: 0.35,
                height: 0.5,
            },
            jpeg_quality: 90,
            selfie_jpeg_quality: 80,
            mirror_selfie: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerdictPolicy {
    pub min_similarity: u8,
    pub min_age: i32,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self {
            min_similarity: 65,
            min_age: 18,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    pub max_bytes: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 15 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub ocr: OcrSettings,
    pub face: FaceSettings,
    pub policy: VerdictPolicy,
    pub upload: UploadPolicy,
    pub use_reference_corpus: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            ocr: OcrSettings::default(),
            face: FaceSettings::default(),
            policy: VerdictPolicy::default(),
            upload: UploadPolicy::default(),
            use_reference_corpus: true,
        }
    }
}

impl VerificationConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VerificationError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            VerificationError::ConfigError(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, VerificationError> {
        let config: VerificationConfig = serde_json::from_str(raw)
            .map_err(|e| VerificationError::ConfigError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), VerificationError> {
        if self.ocr.configurations.is_empty() {
            return Err(VerificationError::ConfigError(
                "at least one OCR configuration is required".to_string(),
            ));
        }
        if self.face.thumbnail_size == 0 {
            return Err(VerificationError::ConfigError(
                "thumbnail_size must be positive".to_string(),
            ));
        }
        let region = &self.face.document_fallback_region;
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !(in_unit(region.x)
            && in_unit(region.y)
            && region.width > 0.0
            && region.height > 0.0
            && region.x + region.width <= 1.0
            && region.y + region.height <= 1.0)
        {
            return Err(VerificationError::ConfigError(
                "document_fallback_region must lie inside the image".to_string(),
            ));
        }
        if self.policy.min_similarity > 100 {
            return Err(VerificationError::ConfigError(
                "min_similarity must be within 0-100".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_passes_order() {
        let passes = OcrConfiguration::default_passes();
        assert_eq!(passes.len(), 5);
        assert_eq!(passes[0].language_spec(), "hin");
        assert_eq!(passes[0].engine_mode, EngineMode::LstmOnly);
        assert_eq!(passes[3].language_spec(), "hin+eng");
        assert_eq!(passes[4].page_segmentation, PageSegmentation::Auto);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = VerificationConfig::from_json(r#"{"policy": {"min_age": 21}}"#).unwrap();
        assert_eq!(config.policy.min_age, 21);
        assert_eq!(config.policy.min_similarity, 65);
        assert_eq!(config.ocr.early_stop_score, 90);
        assert_eq!(config.face.thumbnail_size, 300);
        assert!(config.use_reference_corpus);
    }

    #[test]
    fn test_rejects_empty_configuration_list() {
        let err = VerificationConfig::from_json(r#"{"ocr": {"configurations": []}}"#).unwrap_err();
        assert!(matches!(err, VerificationError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_region_outside_image() {
        let mut config = VerificationConfig::default();
        config.face.document_fallback_region.width = 0.99;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"ocr": {{"configurations": [{{"name": "eng", "languages": ["eng"], "page_segmentation": "SingleBlock"}}], "attempt_timeout_secs": 5}}}}"#
        )
        .unwrap();
        let config = VerificationConfig::from_file(file.path()).unwrap();
        assert_eq!(config.ocr.configurations.len(), 1);
        assert_eq!(config.ocr.configurations[0].engine_mode, EngineMode::Default);
        assert!(config.ocr.configurations[0].preserve_interword_spaces);
        assert_eq!(config.ocr.attempt_timeout(), Some(Duration::from_secs(5)));
    }
}
