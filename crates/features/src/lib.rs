//! Text features for brand matching.
//!
//! Provides pure functions used by the matcher:
//! - Brand/title normalization (lowercase + diacritic folding)
//! - Separate-term detection
//! - Word position checks

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Combining Diacritical Marks block, stripped after canonical decomposition.
const COMBINING_MARKS: std::ops::RangeInclusive<char> = '\u{0300}'..='\u{036f}';

/// Normalize a brand name or product title for comparison.
///
/// Lowercases, decomposes (NFD) and drops combining marks, so `"Crème"`
/// becomes `"creme"`. Whitespace is left untouched.
pub fn normalize_brand_name(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !COMBINING_MARKS.contains(c))
        .collect()
}

/// A compiled separate-term test for one brand.
///
/// The brand counts as a separate term of a title when it is bounded by
/// word boundaries, starts the title followed by a space, ends the title
/// preceded by a space, sits between two spaces, or is the whole title.
/// Both sides are expected to be normalized already.
#[derive(Debug, Clone)]
pub struct SeparateTerm {
    term: String,
    leading: String,
    trailing: String,
    inner: String,
    word: Option<Regex>,
}

impl SeparateTerm {
    pub fn new(term: &str) -> Self {
        // An escaped term always compiles; None is kept for the empty term.
        // Unicode \b: non-ASCII letters such as 'ø' are word characters.
        let word = if term.is_empty() {
            None
        } else {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term))).ok()
        };

        Self {
            term: term.to_string(),
            leading: format!("{} ", term),
            trailing: format!(" {}", term),
            inner: format!(" {} ", term),
            word,
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// Test the term against a normalized title.
    pub fn is_match(&self, title: &str) -> bool {
        if self.term.is_empty() {
            return false;
        }

        title == self.term
            || title.starts_with(&self.leading)
            || title.ends_with(&self.trailing)
            || title.contains(&self.inner)
            || self.word.as_ref().is_some_and(|re| re.is_match(title))
    }
}

/// One-shot separate-term check. Prefer `SeparateTerm` when testing the
/// same brand against many titles.
pub fn is_separate_term(title: &str, brand: &str) -> bool {
    SeparateTerm::new(brand).is_match(title)
}

/// Whether `word` is the first or second word of `title`, splitting on
/// single spaces (so runs of spaces produce empty words).
pub fn is_first_or_second_word(title: &str, word: &str) -> bool {
    title.split(' ').take(2).any(|w| w == word)
}
