//! Forgiving free-text matching for show and publisher filters
//!
//! Both sides are folded to lowercase ASCII-ish words (diacritics stripped,
//! punctuation collapsed to single spaces). A candidate matches when any of
//! the following holds: the normalized query is a substring, the query with
//! spaces removed is a substring of the candidate with spaces removed, every
//! query word appears somewhere, or the query reads as an acronym of the
//! candidate's words.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold text to lowercase alphanumeric words separated by single spaces
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    out
}

fn collapse(normalized: &str) -> String {
    normalized.chars().filter(|c| *c != ' ').collect()
}

fn initials(normalized: &str) -> String {
    normalized
        .split(' ')
        .filter_map(|word| word.chars().next())
        .collect()
}

/// Precomputed forms of a text for matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyText {
    pub normalized: String,
    pub collapsed: String,
    pub initials: String,
}

impl FuzzyText {
    pub fn new(text: &str) -> Self {
        let normalized = normalize(text);
        Self {
            collapsed: collapse(&normalized),
            initials: initials(&normalized),
            normalized,
        }
    }
}

/// A compiled filter query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyQuery {
    pub raw: String,
    text: FuzzyText,
    tokens: Vec<String>,
    /// The query read as an acronym
    acronym: String,
}

impl FuzzyQuery {
    pub fn new(raw: &str) -> Self {
        let text = FuzzyText::new(raw);
        let tokens: Vec<String> = text.normalized.split(' ').filter(|t| !t.is_empty()).map(String::from).collect();
        // A lone word like "hf" is itself the acronym; several words contribute their initials
        let acronym = if tokens.len() == 1 {
            text.collapsed.clone()
        } else {
            text.initials.clone()
        };

        Self {
            raw: raw.to_string(),
            text,
            tokens,
            acronym,
        }
    }

    /// Whether the query folds to nothing (only punctuation or whitespace)
    pub fn is_empty(&self) -> bool {
        self.text.normalized.is_empty()
    }

    pub fn matches_text(&self, candidate: &FuzzyText) -> bool {
        if self.is_empty() || candidate.normalized.is_empty() {
            return false;
        }

        candidate.normalized.contains(&self.text.normalized)
            || candidate.collapsed.contains(&self.text.collapsed)
            || self.tokens.iter().all(|t| candidate.normalized.contains(t.as_str()))
            || (self.acronym.chars().count() >= 2 && candidate.initials.contains(&self.acronym))
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.matches_text(&FuzzyText::new(candidate))
    }
}
