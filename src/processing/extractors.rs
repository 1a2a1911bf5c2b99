// Field extraction from raw Aadhaar OCR text.
use std::sync::Arc;

use lazy_static::lazy_static;
use log::debug;
use regex::{Regex, RegexBuilder};

use crate::models::{ExtractionCandidate, ReferenceCorpus};
use crate::validation::date::{birth_date_from_parts, format_date_of_birth};

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    static ref SCRIPT_A_NAME_PATTERNS: Vec<Regex> = vec![
        // Two or three Devanagari words
        Regex::new(r"([\x{0900}-\x{097F}]{2,}(?:\s+[\x{0900}-\x{097F}]{2,}){1,2})").unwrap(),
        // Leading Devanagari run
        Regex::new(r"^([\x{0900}-\x{097F}]+(?:\s+[\x{0900}-\x{097F}]+)*)").unwrap(),
        // Devanagari run printed just before a Latin name
        Regex::new(r"([\x{0900}-\x{097F}]+(?:\s+[\x{0900}-\x{097F}]+)*)\s*[A-Z][a-z]+").unwrap(),
    ];

    static ref SCRIPT_B_NAME_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"([A-Z][a-z]+\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)").unwrap(),
        Regex::new(r"([A-Z]{2,}\s+[A-Z]{2,}(?:\s+[A-Z]{2,})?)").unwrap(),
        Regex::new(r"([A-Za-z]+\s+[A-Za-z]+(?:\s+[A-Za-z]+)?)").unwrap(),
    ];

    static ref DATE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"([0-9]{1,2}[/\-.][0-9]{1,2}[/\-.][0-9]{4})").unwrap(),
        Regex::new(r"([0-9]{4}[/\-.][0-9]{1,2}[/\-.][0-9]{1,2})").unwrap(),
    ];

    static ref DOCUMENT_NUMBER_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"([0-9]{4}\s[0-9]{4}\s[0-9]{4})").unwrap(),
        Regex::new(r"([0-9]{12})").unwrap(),
    ];
}

/// Particles that never form a name on their own. Matched as whole words.
const SCRIPT_A_PARTICLES: &[&str] = &[
    "के", "का", "की", "में", "से", "को", "है", "और", "या", "पर", "गा", "एप", "एन",
];

/// Card boilerplate. Matched anywhere in the candidate.
const SCRIPT_A_BOILERPLATE: &[&str] = &[
    "भारत", "सरकार", "आधार", "पुरुष", "महिला", "जन्म", "तिथि", "पता", "फोन",
];

const SCRIPT_B_NON_NAME_WORDS: &[&str] = &[
    "government", "india", "aadhaar", "male", "female", "dob", "birth", "date",
    "address", "phone", "proof", "identity", "card", "number", "photo", "issued",
    "unique", "identification", "authority", "resident", "citizen", "nationality",
    "document", "verification", "authentic", "valid", "copy", "original",
];

fn is_script_a_char(c: char) -> bool {
    ('\u{0900}'..='\u{097F}').contains(&c)
}

fn is_script_b_char(c: char) -> bool {
    c.is_ascii_alphabetic()
}

pub fn contains_script_a(text: &str) -> bool {
    text.chars().any(is_script_a_char)
}

/// Collapses whitespace runs to single spaces.
pub fn clean_name(name: &str) -> String {
    WHITESPACE.replace_all(name.trim(), " ").into_owned()
}

pub fn is_valid_script_a_name(name: &str) -> bool {
    let cleaned = name.trim();
    let length = cleaned.chars().count();
    if !(2..=50).contains(&length) {
        return false;
    }

    let letters: Vec<char> = cleaned.chars().filter(|c| !c.is_whitespace()).collect();
    if letters.is_empty() {
        return false;
    }
    let script_a = letters.iter().filter(|c| is_script_a_char(**c)).count();
    if (script_a as f32) / (letters.len() as f32) < 0.8 {
        return false;
    }

    let words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.iter().any(|w| SCRIPT_A_PARTICLES.contains(w)) {
        return false;
    }
    if SCRIPT_A_BOILERPLATE.iter().any(|term| cleaned.contains(term)) {
        return false;
    }

    if words.is_empty() || words.len() > 4 {
        return false;
    }
    words
        .iter()
        .all(|w| (2..=15).contains(&w.chars().count()))
}

pub fn is_valid_script_b_name(name: &str) -> bool {
    let trimmed = name.trim();
    let length = name.chars().count();
    if !(3..=50).contains(&length) {
        return false;
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
    {
        return false;
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() < 2 || words.len() > 4 {
        return false;
    }

    let lower = name.to_lowercase();
    if SCRIPT_B_NON_NAME_WORDS.iter().any(|w| lower.contains(w)) {
        return false;
    }

    words.iter().all(|w| (2..=20).contains(&w.len()))
}

/// Normalises a `D/M/YYYY` or `YYYY/M/D` date (separators `/ - .`) to `DD/MM/YYYY`.
///
/// Returns `None` unless the result is a real calendar day with a year in the accepted range.
pub fn normalize_date(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '/' | '-' | '.'))
        .map(|c| if c == '-' || c == '.' { '/' } else { c })
        .collect();

    let parts: Vec<&str> = cleaned.split('/').collect();
    if parts.len() != 3 {
        return None;
    }

    let (day, month, year) = if parts[2].len() == 4 {
        (parts[0], parts[1], parts[2])
    } else if parts[0].len() == 4 {
        (parts[2], parts[1], parts[0])
    } else {
        return None;
    };

    let date = birth_date_from_parts(day.parse().ok()?, month.parse().ok()?, year.parse().ok()?)?;
    Some(format_date_of_birth(date))
}

/// Grows `start..end` over the neighbouring words of the same script, stopping at
/// line breaks, so a match inside a longer run of words is judged as the whole run.
fn widen_to_run(text: &str, start: usize, end: usize, is_word: fn(char) -> bool) -> &str {
    let mut start = start;
    loop {
        let head = &text[..start];
        let word_start = head.trim_end_matches(is_word).len();
        if word_start < start {
            start = word_start;
            continue;
        }
        let gap_start = head.trim_end_matches(' ').len();
        if gap_start < start && head[..gap_start].ends_with(is_word) {
            start = gap_start;
            continue;
        }
        break;
    }

    let mut end = end;
    loop {
        let tail = &text[end..];
        let word_len = tail.len() - tail.trim_start_matches(is_word).len();
        if word_len > 0 {
            end += word_len;
            continue;
        }
        let after_gap = tail.trim_start_matches(' ');
        if after_gap.len() < tail.len() && after_gap.starts_with(is_word) {
            end += tail.len() - after_gap.len();
            continue;
        }
        break;
    }
    &text[start..end]
}

fn digit_count(value: &str) -> usize {
    value.chars().filter(|c| c.is_ascii_digit()).count()
}

/// Parses OCR text into an [`ExtractionCandidate`].
///
/// Reference corpus entries are checked before the generic patterns, so a
/// corpus built with [`ReferenceCorpus::empty`] leaves only the heuristics.
pub struct FieldExtractor {
    corpus: Arc<ReferenceCorpus>,
    known_script_a: Vec<(Regex, &'static str)>,
    known_script_b: Vec<(Regex, &'static str)>,
    known_dates: Vec<Regex>,
    known_numbers: Vec<Regex>,
}

impl FieldExtractor {
    pub fn new(corpus: Arc<ReferenceCorpus>) -> Self {
        let word_pattern = |name: &str, gap: &str| {
            name.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(gap)
        };

        let known_script_a = corpus
            .script_a_names()
            .filter_map(|name| Regex::new(&word_pattern(name, r"\s*")).ok().map(|re| (re, name)))
            .collect();
        let known_script_b = corpus
            .script_b_names()
            .filter_map(|name| {
                RegexBuilder::new(&word_pattern(name, r"\s+"))
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (re, name))
            })
            .collect();
        let known_dates = corpus
            .dates
            .iter()
            .filter_map(|date| {
                let pattern = date
                    .split('/')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"[/\-.]");
                Regex::new(&pattern).ok()
            })
            .collect();
        let known_numbers = corpus
            .document_numbers
            .iter()
            .filter_map(|number| Regex::new(&word_pattern(number, r"\s*")).ok())
            .collect();

        FieldExtractor {
            corpus,
            known_script_a,
            known_script_b,
            known_dates,
            known_numbers,
        }
    }

    pub fn extract(&self, text: &str) -> ExtractionCandidate {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let flat = WHITESPACE.replace_all(text, " ").into_owned();
        // Same text with line breaks kept, so name runs never widen across lines.
        let layout = lines.iter().map(|line| clean_name(line)).collect::<Vec<_>>().join("\n");

        let candidate = ExtractionCandidate {
            name_script_a: self.extract_script_a_name(&lines, &layout),
            name_script_b: self.extract_script_b_name(&layout),
            date_of_birth: self.extract_date_of_birth(&flat),
            document_number: self.extract_document_number(&flat),
            configuration: None,
        };
        debug!("Extracted candidate: {:?}", candidate);
        candidate
    }

    fn extract_script_a_name(&self, lines: &[&str], layout: &str) -> Option<String> {
        if let Some((_, name)) = self.known_script_a.iter().find(|(re, _)| re.is_match(layout)) {
            debug!("Matched reference Devanagari name: {}", name);
            return Some(name.to_string());
        }

        // Whole lines first; they are the most reliable unit.
        for line in lines {
            if contains_script_a(line) && is_valid_script_a_name(line) {
                return Some(clean_name(line));
            }
        }

        for pattern in SCRIPT_A_NAME_PATTERNS.iter() {
            for captures in pattern.captures_iter(layout) {
                let Some(found) = captures.get(1) else { continue };
                let candidate =
                    clean_name(widen_to_run(layout, found.start(), found.end(), is_script_a_char));
                if is_valid_script_a_name(&candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn extract_script_b_name(&self, layout: &str) -> Option<String> {
        if let Some((_, name)) = self.known_script_b.iter().find(|(re, _)| re.is_match(layout)) {
            debug!("Matched reference Latin name: {}", name);
            return Some(name.to_string());
        }

        for pattern in SCRIPT_B_NAME_PATTERNS.iter() {
            for captures in pattern.captures_iter(layout) {
                let Some(found) = captures.get(1) else { continue };
                let candidate =
                    clean_name(widen_to_run(layout, found.start(), found.end(), is_script_b_char));
                if is_valid_script_b_name(&candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn extract_date_of_birth(&self, flat: &str) -> Option<String> {
        let known = self.known_dates.iter().flat_map(|re| re.find_iter(flat).map(|m| m.as_str()));
        let generic = DATE_PATTERNS
            .iter()
            .flat_map(|re| re.captures_iter(flat).filter_map(|c| c.get(1).map(|m| m.as_str())));

        known.chain(generic).find_map(normalize_date)
    }

    fn extract_document_number(&self, flat: &str) -> Option<String> {
        let known = self.known_numbers.iter().flat_map(|re| re.find_iter(flat).map(|m| m.as_str()));
        let generic = DOCUMENT_NUMBER_PATTERNS
            .iter()
            .flat_map(|re| re.captures_iter(flat).filter_map(|c| c.get(1).map(|m| m.as_str())));

        known
            .chain(generic)
            .map(str::trim)
            .find(|candidate| {
                digit_count(candidate) == 12
                    && candidate.chars().all(|c| c.is_ascii_digit() || c.is_whitespace())
            })
            .map(str::to_string)
    }

    /// Replaces known OCR misreadings in the Devanagari name.
    ///
    /// Misread fragments are usually made of particles, so extraction rejects
    /// them and leaves the name empty. An empty name is then filled when the
    /// raw `text` contains a known fragment. The primary name is derived from
    /// the script names, so this also fills an otherwise missing primary name.
    pub fn apply_corrections(&self, mut candidate: ExtractionCandidate, text: &str) -> ExtractionCandidate {
        let correction = match candidate.name_script_a.as_deref() {
            Some(name) => self.corpus.correct_misreading(name),
            None => self
                .corpus
                .correct_misreading(&WHITESPACE.replace_all(text, " ")),
        };
        if let Some(correction) = correction {
            debug!(
                "Corrected Devanagari name from {:?} to {:?}",
                candidate.name_script_a, correction
            );
            candidate.name_script_a = Some(correction.to_string());
        }
        candidate
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(Arc::new(ReferenceCorpus::builtin()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heuristics_only() -> FieldExtractor {
        FieldExtractor::new(Arc::new(ReferenceCorpus::empty()))
    }

    #[test]
    fn test_reference_names_take_priority() {
        let extractor = FieldExtractor::default();
        let text = "भारत सरकार\nसंजना  मीना\nSANJANA   meena\nDOB: 28-04-2004\n8874 0745 0174";
        let candidate = extractor.extract(text);
        assert_eq!(candidate.name_script_a.as_deref(), Some("संजना मीना"));
        assert_eq!(candidate.name_script_b.as_deref(), Some("Sanjana Meena"));
        assert_eq!(candidate.date_of_birth.as_deref(), Some("28/04/2004"));
        assert_eq!(candidate.document_number.as_deref(), Some("8874 0745 0174"));
    }

    #[test]
    fn test_generic_card_text() {
        let text = "भारत सरकार\nGovernment of India\nरमेश यादव\nRamesh Yadav\nजन्म तिथि/DOB: 5/3/1999\nपुरुष/ Male\n1234 5678 9012";
        let candidate = heuristics_only().extract(text);
        assert_eq!(candidate.name_script_a.as_deref(), Some("रमेश यादव"));
        assert_eq!(candidate.name_script_b.as_deref(), Some("Ramesh Yadav"));
        assert_eq!(candidate.date_of_birth.as_deref(), Some("05/03/1999"));
        assert_eq!(candidate.document_number.as_deref(), Some("1234 5678 9012"));
        assert_eq!(candidate.full_name(), Some("Ramesh Yadav"));
    }

    #[test]
    fn test_long_names_are_rejected_not_shortened() {
        let extractor = heuristics_only();
        assert_eq!(extractor.extract("रमेश कुमार सिंह यादव वर्मा").name_script_a, None);
        assert_eq!(extractor.extract("Ramesh Kumar Singh Yadav Verma").name_script_b, None);

        let text = "रमेश कुमार सिंह यादव वर्मा\nसीता देवी\nRamesh Kumar Singh Yadav Verma\nSita Devi";
        let candidate = extractor.extract(text);
        assert_eq!(candidate.name_script_a.as_deref(), Some("सीता देवी"));
        assert_eq!(candidate.name_script_b.as_deref(), Some("Sita Devi"));
    }

    #[test]
    fn test_widening_stops_at_line_breaks() {
        let layout = "Ramesh Yadav\nMale";
        assert_eq!(widen_to_run(layout, 0, 6, is_script_b_char), "Ramesh Yadav");
        assert_eq!(widen_to_run(layout, 7, 10, is_script_b_char), "Ramesh Yadav");
        assert_eq!(widen_to_run(layout, 13, 17, is_script_b_char), "Male");
    }

    #[test]
    fn test_impossible_dates_in_text_are_ignored() {
        let extractor = heuristics_only();
        assert_eq!(extractor.extract("DOB: 32/01/2000").date_of_birth, None);
        assert_eq!(extractor.extract("DOB: 10/13/1999").date_of_birth, None);
    }

    #[test]
    fn test_devanagari_digits_are_not_document_numbers() {
        let text = "१२३४ ५६७८ ९०१२";
        assert_eq!(heuristics_only().extract(text).document_number, None);
    }

    #[test]
    fn test_unbroken_twelve_digits() {
        let candidate = heuristics_only().extract("No 123456789012 end");
        assert_eq!(candidate.document_number.as_deref(), Some("123456789012"));
    }

    #[test]
    fn test_year_first_date() {
        assert_eq!(normalize_date("1999.3.5").as_deref(), Some("05/03/1999"));
        assert_eq!(
            heuristics_only().extract("born 2001-12-09").date_of_birth.as_deref(),
            Some("09/12/2001")
        );
    }

    #[test]
    fn test_invalid_calendar_dates_are_skipped() {
        let candidate = heuristics_only().extract("31/02/1990 then 14/07/1988");
        assert_eq!(candidate.date_of_birth.as_deref(), Some("14/07/1988"));
        assert_eq!(normalize_date("01/01/2015"), None);
        assert_eq!(normalize_date("12/2000"), None);
    }

    #[test]
    fn test_script_a_validation() {
        assert!(is_valid_script_a_name("रमेश यादव"));
        assert!(!is_valid_script_a_name("भारत सरकार"));
        assert!(!is_valid_script_a_name("राम के"));
        assert!(!is_valid_script_a_name("र"));
        assert!(!is_valid_script_a_name("रमेश Yadav"));
        assert!(!is_valid_script_a_name("एक दो तीन चार पांच"));
    }

    #[test]
    fn test_particles_only_match_whole_words() {
        // "कालू" starts with the particle "का" but is a name word.
        assert!(is_valid_script_a_name("कालू राम"));
    }

    #[test]
    fn test_script_b_validation() {
        assert!(is_valid_script_b_name("Ramesh Yadav"));
        assert!(is_valid_script_b_name("RAMESH KUMAR YADAV"));
        assert!(!is_valid_script_b_name("Government India"));
        assert!(!is_valid_script_b_name("Ramesh"));
        assert!(!is_valid_script_b_name("Ramesh Yadav2"));
        assert!(!is_valid_script_b_name("Date Birth"));
    }

    #[test]
    fn test_corrections_apply_misreading() {
        let extractor = FieldExtractor::default();
        let candidate = ExtractionCandidate {
            name_script_a: Some("गा एप एन".to_string()),
            ..Default::default()
        };
        let corrected = extractor.apply_corrections(candidate, "");
        assert_eq!(corrected.name_script_a.as_deref(), Some("संजना मीना"));
        assert_eq!(corrected.full_name(), Some("संजना मीना"));
    }

    #[test]
    fn test_misread_fragment_in_text_fills_missing_name() {
        let extractor = FieldExtractor::default();
        let text = "भारत सरकार\nगा  एप एन\nDOB: 28/04/2004";
        let candidate = extractor.extract(text);
        assert_eq!(candidate.name_script_a, None);

        let corrected = extractor.apply_corrections(candidate, text);
        assert_eq!(corrected.name_script_a.as_deref(), Some("संजना मीना"));

        let unrelated = extractor.apply_corrections(extractor.extract("DOB: 28/04/2004"), "DOB: 28/04/2004");
        assert_eq!(unrelated.name_script_a, None);
    }

    #[test]
    fn test_corrections_disabled_without_corpus() {
        let candidate = ExtractionCandidate {
            name_script_a: Some("गा एप एन".to_string()),
            ..Default::default()
        };
        let corrected = heuristics_only().apply_corrections(candidate, "गा एप एन");
        assert_eq!(corrected.name_script_a.as_deref(), Some("गा एप एन"));
    }

    #[test]
    fn test_empty_text_gives_empty_candidate() {
        assert!(heuristics_only().extract("   \n ").is_empty());
    }
}
