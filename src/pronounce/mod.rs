//! Pronunciation dictionary loading and annotation.

pub mod annotate;
pub mod spans;

pub use annotate::{annotate_document, annotate_text, annotate_tree};

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("dictionary row {row}: missing required `word` value")]
    MissingWord { row: usize },

    #[error("failed to read dictionary: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which annotation element to emit for a dictionary match.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PhonemeFormat {
    /// `<phoneme alphabet="ipa" ph="...">` with an IPA string
    #[default]
    Ipa,
    /// `<sub alias="...">` with a sounds-like spelling
    Alias,
}

impl PhonemeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhonemeFormat::Ipa => "ipa",
            PhonemeFormat::Alias => "alias",
        }
    }
}

/// One pronunciation correction: a case-insensitive match key plus at least
/// one of an IPA string or a sounds-like alias. Entries carrying neither are
/// inert (they never produce an annotation) but are not an error.
#[derive(Debug, Clone)]
pub struct PronunciationEntry {
    pub word: String,
    pub ipa: Option<String>,
    pub alias: Option<String>,
}

impl PronunciationEntry {
    /// The replacement value for the requested format, if present.
    pub fn value_for(&self, format: PhonemeFormat) -> Option<&str> {
        match format {
            PhonemeFormat::Ipa => self.ipa.as_deref(),
            PhonemeFormat::Alias => self.alias.as_deref(),
        }
    }
}

/// Raw CSV row; the `word` column is required by the header, `ipa` and
/// `alias` are optional.
#[derive(Debug, Deserialize)]
struct DictionaryRow {
    word: String,
    #[serde(default)]
    ipa: Option<String>,
    #[serde(default)]
    alias: Option<String>,
}

/// Ordered pronunciation dictionary.
///
/// Entry order equals CSV row order and is significant: when two entries'
/// keys could overlap in a buffer, the earlier row wins and later matches
/// inside the inserted annotation are suppressed.
#[derive(Debug, Default)]
pub struct PronunciationDictionary {
    entries: Vec<PronunciationEntry>,
}

impl PronunciationDictionary {
    /// Load a dictionary from CSV with named columns `word`, `ipa`, `alias`.
    ///
    /// A row with an empty `word` cell (or a file without a `word` column)
    /// fails the whole load; the annotation run never starts with a
    /// partially-loaded dictionary.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DictionaryError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut entries = Vec::new();
        for (idx, row) in csv_reader.deserialize::<DictionaryRow>().enumerate() {
            let row = row?;
            if row.word.trim().is_empty() {
                // Header is row 1, first data row is row 2.
                return Err(DictionaryError::MissingWord { row: idx + 2 });
            }
            entries.push(PronunciationEntry {
                word: row.word,
                ipa: none_if_blank(row.ipa),
                alias: none_if_blank(row.alias),
            });
        }
        Ok(Self { entries })
    }

    pub fn from_path(path: &Path) -> Result<Self, DictionaryError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn entries(&self) -> &[PronunciationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_preserves_row_order() {
        let csv = "word,ipa,alias\n\
                   Hussain,hʊˈseɪn,who-sane\n\
                   Karbala,ˌkɑːrˈbɑːlə,car-bah-lah\n\
                   Zayd,zeɪd,\n";
        let dict = PronunciationDictionary::from_reader(csv.as_bytes()).unwrap();
        let words: Vec<&str> = dict.entries().iter().map(|e| e.word.as_str()).collect();
        assert_eq!(words, vec!["Hussain", "Karbala", "Zayd"]);
    }

    #[test]
    fn test_blank_cells_become_none() {
        let csv = "word,ipa,alias\nZayd,zeɪd,\nAli,,ah-lee\n";
        let dict = PronunciationDictionary::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(dict.entries()[0].alias, None);
        assert_eq!(dict.entries()[1].ipa, None);
        assert_eq!(dict.entries()[1].alias.as_deref(), Some("ah-lee"));
    }

    #[test]
    fn test_empty_word_fails_load() {
        let csv = "word,ipa,alias\nHussain,hʊˈseɪn,\n,x,y\n";
        let err = PronunciationDictionary::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DictionaryError::MissingWord { row: 3 }));
    }

    #[test]
    fn test_missing_word_column_fails_load() {
        let csv = "term,ipa\nHussain,hʊˈseɪn\n";
        assert!(matches!(
            PronunciationDictionary::from_reader(csv.as_bytes()),
            Err(DictionaryError::Csv(_))
        ));
    }

    #[test]
    fn test_entry_without_values_is_inert_not_error() {
        let csv = "word,ipa,alias\nHussain,,\n";
        let dict = PronunciationDictionary::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.entries()[0].value_for(PhonemeFormat::Ipa), None);
        assert_eq!(dict.entries()[0].value_for(PhonemeFormat::Alias), None);
    }

    #[test]
    fn test_value_for_format() {
        let entry = PronunciationEntry {
            word: "Hussain".to_string(),
            ipa: Some("hʊˈseɪn".to_string()),
            alias: None,
        };
        assert_eq!(entry.value_for(PhonemeFormat::Ipa), Some("hʊˈseɪn"));
        assert_eq!(entry.value_for(PhonemeFormat::Alias), None);
    }
}
