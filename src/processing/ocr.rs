use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;

use crate::models::{ExtractionCandidate, OcrConfiguration, OcrSettings, ReferenceCorpus};
use crate::processing::best_of::BestOf;
use crate::processing::extractors::FieldExtractor;
use crate::processing::scoring::ExtractionScorer;
use crate::utils::VerificationError;

/// A general-purpose text recognition engine.
///
/// A timed-out call is dropped, not awaited. Engines that hand work to
/// another thread must keep later calls waiting until that work ends.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Reads `image` with one configuration. `progress` receives this pass's own fraction in `[0, 1]`.
    async fn recognize(
        &self,
        image: &[u8],
        configuration: &OcrConfiguration,
        progress: &(dyn Fn(f32) + Send + Sync),
    ) -> Result<String, VerificationError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrProgress {
    /// Overall fraction across all passes.
    pub fraction: f32,
    pub configuration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AttemptStatus {
    Succeeded { score: i32 },
    /// The engine returned only whitespace.
    Empty,
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptReport {
    pub configuration: String,
    pub status: AttemptStatus,
}

#[derive(Debug, Clone, Default)]
pub struct RecognitionOutcome {
    /// Raw text of the winning pass.
    pub text: String,
    pub candidate: ExtractionCandidate,
    pub score: i32,
    pub configuration: Option<String>,
    pub attempts: Vec<AttemptReport>,
}

impl RecognitionOutcome {
    /// True when at least one pass returned text.
    pub fn produced_text(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| matches!(a.status, AttemptStatus::Succeeded { .. }))
    }
}

/// Forwards overall progress, never letting it move backwards.
struct ProgressTracker<'a> {
    sink: &'a (dyn Fn(OcrProgress) + Send + Sync),
    last: Mutex<f32>,
}

impl<'a> ProgressTracker<'a> {
    fn new(sink: &'a (dyn Fn(OcrProgress) + Send + Sync)) -> Self {
        ProgressTracker {
            sink,
            last: Mutex::new(0.0),
        }
    }

    fn report(&self, fraction: f32, configuration: &str) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let reported = match self.last.lock() {
            Ok(mut last) => {
                *last = last.max(fraction);
                *last
            }
            Err(_) => return,
        };
        (self.sink)(OcrProgress {
            fraction: reported,
            configuration: configuration.to_string(),
        });
    }
}

/// Runs every configured OCR pass over a document and keeps the best parse.
pub struct TextRecognizer {
    engine: Arc<dyn OcrEngine>,
    configurations: Vec<OcrConfiguration>,
    extractor: FieldExtractor,
    scorer: ExtractionScorer,
    early_stop_score: i32,
    attempt_timeout: Option<Duration>,
}

impl TextRecognizer {
    pub fn new(
        engine: Arc<dyn OcrEngine>,
        settings: &OcrSettings,
        corpus: Arc<ReferenceCorpus>,
    ) -> Self {
        TextRecognizer {
            engine,
            configurations: settings.configurations.clone(),
            extractor: FieldExtractor::new(corpus.clone()),
            scorer: ExtractionScorer::new(corpus),
            early_stop_score: settings.early_stop_score,
            attempt_timeout: settings.attempt_timeout(),
        }
    }

    /// Tries each configuration in order.
    ///
    /// A pass replaces the current best only with a strictly higher score,
    /// and a pass scoring at least the early-stop score ends the run. Engine
    /// failures and timeouts are recorded and skipped. Progress always ends at 1.0.
    pub async fn recognize(
        &self,
        image: &[u8],
        progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> RecognitionOutcome {
        let tracker = ProgressTracker::new(progress);
        let total = self.configurations.len().max(1) as f32;
        let mut best: BestOf<(String, ExtractionCandidate)> = BestOf::new(Some(self.early_stop_score));
        let mut attempts = Vec::with_capacity(self.configurations.len());

        for (index, configuration) in self.configurations.iter().enumerate() {
            let name = configuration.name.as_str();
            info!("Trying OCR configuration: {}", name);
            tracker.report(index as f32 / total, name);

            let per_attempt = |p: f32| {
                let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
                tracker.report((index as f32 + p) / total, name);
            };
            let recognition = self.engine.recognize(image, configuration, &per_attempt);
            let result = match self.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, recognition).await.ok(),
                None => Some(recognition.await),
            };

            let mut stop = false;
            let status = match result {
                None => {
                    warn!("OCR configuration {} timed out", name);
                    AttemptStatus::TimedOut
                }
                Some(Err(e)) => {
                    warn!("OCR failed with {}: {}", name, e);
                    AttemptStatus::Failed(e.to_string())
                }
                Some(Ok(text)) if text.trim().is_empty() => {
                    info!("OCR configuration {} returned no text", name);
                    AttemptStatus::Empty
                }
                Some(Ok(text)) => {
                    debug!("{} extracted text:\n{}", name, text);
                    let mut candidate = self.extractor.extract(&text);
                    candidate.configuration = Some(name.to_string());
                    let score = self.scorer.score(&candidate);
                    info!("{} score: {}", name, score);

                    let previous = best.best_score();
                    stop = best.offer(score, (text, candidate)).is_break();
                    if best.best_score() != previous {
                        info!("New best result from {}", name);
                    }
                    AttemptStatus::Succeeded { score }
                }
            };
            attempts.push(AttemptReport {
                configuration: name.to_string(),
                status,
            });
            if stop {
                info!("Excellent result from {}, stopping early", name);
                break;
            }
        }

        let last_name = attempts
            .last()
            .map(|a| a.configuration.clone())
            .unwrap_or_default();
        tracker.report(1.0, &last_name);

        match best.into_best() {
            Some((score, (text, candidate))) => {
                let configuration = candidate.configuration.clone();
                let candidate = self.extractor.apply_corrections(candidate, &text);
                info!(
                    "Best OCR result from {:?} with score {}",
                    configuration, score
                );
                RecognitionOutcome {
                    text,
                    candidate,
                    score,
                    configuration,
                    attempts,
                }
            }
            None => {
                warn!("No OCR configuration produced usable fields");
                RecognitionOutcome {
                    attempts,
                    ..Default::default()
                }
            }
        }
    }
}
