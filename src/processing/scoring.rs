use std::sync::Arc;

use crate::models::{ExtractionCandidate, ReferenceCorpus};
use crate::validation::date::is_valid_date_of_birth;

const PRIMARY_NAME_POINTS: i32 = 20;
const SCRIPT_B_NAME_POINTS: i32 = 30;
const SCRIPT_A_NAME_POINTS: i32 = 35;
const DATE_OF_BIRTH_POINTS: i32 = 30;
const DOCUMENT_NUMBER_POINTS: i32 = 15;
const BOTH_NAMES_BONUS: i32 = 20;
const REFERENCE_NAME_BONUS: i32 = 15;

/// Ranks extraction candidates so the best OCR pass can be chosen.
#[derive(Debug, Clone)]
pub struct ExtractionScorer {
    corpus: Arc<ReferenceCorpus>,
}

impl ExtractionScorer {
    pub fn new(corpus: Arc<ReferenceCorpus>) -> Self {
        ExtractionScorer { corpus }
    }

    pub fn score(&self, candidate: &ExtractionCandidate) -> i32 {
        let long_enough = |value: Option<&str>, min: usize| {
            value.map_or(false, |v| v.chars().count() > min)
        };

        let mut score = 0;
        if long_enough(candidate.full_name(), 2) {
            score += PRIMARY_NAME_POINTS;
        }
        if long_enough(candidate.name_script_b.as_deref(), 2) {
            score += SCRIPT_B_NAME_POINTS;
        }
        if long_enough(candidate.name_script_a.as_deref(), 1) {
            score += SCRIPT_A_NAME_POINTS;
        }
        if candidate
            .date_of_birth
            .as_deref()
            .map_or(false, is_valid_date_of_birth)
        {
            score += DATE_OF_BIRTH_POINTS;
        }
        if let Some(number) = candidate.document_number.as_deref() {
            if number.chars().filter(|c| c.is_ascii_digit()).count() == 12 {
                score += DOCUMENT_NUMBER_POINTS;
            }
        }

        let script_a = candidate.name_script_a.as_deref().filter(|v| !v.is_empty());
        let script_b = candidate.name_script_b.as_deref().filter(|v| !v.is_empty());
        if script_a.is_some() && script_b.is_some() {
            score += BOTH_NAMES_BONUS;
        }
        if script_a.map_or(false, |a| self.corpus.is_bonus_script_a(a)) {
            score += REFERENCE_NAME_BONUS;
        }
        if script_b.map_or(false, |b| self.corpus.is_bonus_script_b(b)) {
            score += REFERENCE_NAME_BONUS;
        }

        score
    }
}

impl Default for ExtractionScorer {
    fn default() -> Self {
        Self::new(Arc::new(ReferenceCorpus::builtin()))
    }
}
