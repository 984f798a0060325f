//! Personal-name canonicalization.
//!
//! # Responsibility
//! - Turn free-text roster/sheet names into comparable token sequences.
//!
//! # Invariants
//! - Normalization is deterministic and idempotent.
//! - Token order of the input is preserved.
//! - Empty or non-text input yields an empty canonical name, never an error.

use crate::model::cell::CellValue;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Short grammatical words ignored when comparing names.
///
/// `maria` is listed on purpose: it is so common as a first-name component in
/// the school's rosters that counting it inflates overlap between strangers.
pub const STOP_WORDS: &[&str] = &["de", "la", "del", "los", "las", "y", "e", "maria"];

/// Normalized, stop-word-filtered token form of a personal name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CanonicalName {
    tokens: Vec<String>,
}

impl CanonicalName {
    /// Canonicalizes raw text.
    pub fn new(raw: &str) -> Self {
        let folded: String = raw
            .to_lowercase()
            .nfd()
            .filter(|ch| !is_combining_mark(*ch))
            .filter(|ch| *ch != ',')
            .collect();
        let tokens = folded
            .split_whitespace()
            .filter(|token| !STOP_WORDS.contains(token))
            .map(str::to_string)
            .collect();
        Self { tokens }
    }

    /// Canonicalizes a cell; only text cells carry a name.
    pub fn from_cell(value: &CellValue) -> Self {
        value.as_text().map(Self::new).unwrap_or_default()
    }

    /// Canonicalizes optional text, treating `None` as empty.
    pub fn from_optional(raw: Option<&str>) -> Self {
        raw.map(Self::new).unwrap_or_default()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Distinct tokens; duplicates never count twice when matching.
    pub fn token_set(&self) -> HashSet<&str> {
        self.tokens.iter().map(String::as_str).collect()
    }
}

impl Display for CanonicalName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}

/// Canonical string form of `raw`.
pub fn normalize_name(raw: &str) -> String {
    CanonicalName::new(raw).to_string()
}

#[cfg(test)]
mod tests {
    use super::{normalize_name, CanonicalName};
    use crate::model::cell::CellValue;

    #[test]
    fn strips_accents_commas_and_case() {
        assert_eq!(normalize_name("García López, Ana"), "garcia lopez ana");
        assert_eq!(normalize_name("ÑÚÑEZ,  Íñigo"), "nunez inigo");
    }

    #[test]
    fn drops_stop_words_including_maria() {
        assert_eq!(
            normalize_name("María de los Ángeles de la Fuente y Ruiz"),
            "angeles fuente ruiz"
        );
    }

    #[test]
    fn blank_and_non_text_cells_are_empty() {
        assert!(CanonicalName::new("").is_empty());
        assert!(CanonicalName::new(" , ").is_empty());
        assert!(CanonicalName::from_cell(&CellValue::Number(12.0)).is_empty());
        assert!(CanonicalName::from_optional(None).is_empty());
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "García López, Ana",
            "İLKER Çelik",
            "  d'Artagnan  DEL   Río ",
            "Zoë Ångström-Øre",
            "",
        ] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once, "input: {raw}");
        }
    }

    #[test]
    fn token_set_ignores_duplicates() {
        let name = CanonicalName::new("Ana Ana López");
        assert_eq!(name.tokens().len(), 3);
        assert_eq!(name.token_set().len(), 2);
    }
}
