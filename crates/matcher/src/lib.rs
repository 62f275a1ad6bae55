//! Brand matching for pharmacy product titles.
//!
//! Takes the brand graph and static exception lists and decides, per
//! product title, which brands the title mentions and which one of them
//! is the canonical brand.

use pharmabrand_features::{is_first_or_second_word, normalize_brand_name, SeparateTerm};
use pharmabrand_graph::BrandGraph;
use pharmabrand_model::{BrandHit, ExceptionLists, MatchResult, MatchRule};
use std::collections::HashSet;

/// Brand that only matches when the raw title spells it in capitals.
const CASE_SENSITIVE_BRAND: &str = "HAPPY";

/// A candidate brand with its precomputed forms.
#[derive(Debug, Clone)]
struct Candidate {
    /// Brand as stored in the graph; this is what gets reported
    brand: String,
    /// Lowercased, for the raw-prefix check
    lowered: String,
    /// Normalized, for the exception lists
    normalized: String,
    term: SeparateTerm,
}

impl Candidate {
    fn new(brand: &str) -> Self {
        let normalized = normalize_brand_name(brand);
        Self {
            brand: brand.to_string(),
            lowered: brand.to_lowercase(),
            term: SeparateTerm::new(&normalized),
            normalized,
        }
    }
}

/// Exception lists with every entry normalized.
#[derive(Debug, Clone, Default)]
struct Exceptions {
    ignored_titles: HashSet<String>,
    front_anchored: HashSet<String>,
    first_or_second_word: HashSet<String>,
}

impl From<&ExceptionLists> for Exceptions {
    fn from(lists: &ExceptionLists) -> Self {
        let normalize_all = |items: &[String]| -> HashSet<String> {
            items.iter().map(|s| normalize_brand_name(s)).collect()
        };
        Self {
            ignored_titles: normalize_all(&lists.ignored_titles),
            front_anchored: normalize_all(&lists.front_anchored_brands),
            first_or_second_word: normalize_all(&lists.first_or_second_word_brands),
        }
    }
}

/// Matches product titles against a fixed set of candidate brands.
///
/// Built once per graph; `match_title` is a pure function of the title and
/// can be called from many threads at once.
#[derive(Debug, Clone)]
pub struct BrandMatcher {
    candidates: Vec<Candidate>,
    exceptions: Exceptions,
}

impl BrandMatcher {
    /// Build a matcher over every brand that appears in an equivalence set
    /// of `graph`. Graph keys with no relationships are not candidates.
    pub fn new(graph: &BrandGraph, exceptions: &ExceptionLists) -> Self {
        Self::from_candidates(graph.member_brands(), exceptions)
    }

    /// Build a matcher over an explicit candidate list. Brands are used
    /// as given, without lowercasing.
    pub fn from_candidates<I, S>(brands: I, exceptions: &ExceptionLists) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let candidates: Vec<Candidate> = brands
            .into_iter()
            .filter(|b| !b.as_ref().is_empty() && seen.insert(b.as_ref().to_string()))
            .map(|b| Candidate::new(b.as_ref()))
            .collect();

        tracing::debug!(candidates = candidates.len(), "Prepared brand matcher");

        Self {
            candidates,
            exceptions: Exceptions::from(exceptions),
        }
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the title is on the ignore list and never gets a brand.
    pub fn is_ignored_title(&self, title: &str) -> bool {
        self.exceptions
            .ignored_titles
            .contains(&normalize_brand_name(title))
    }

    /// Match one product title.
    pub fn match_title(&self, title: &str) -> MatchResult {
        let normalized_title = normalize_brand_name(title);
        if self.exceptions.ignored_titles.contains(&normalized_title) {
            tracing::trace!(title, "Ignored title");
            return MatchResult::empty();
        }

        let lowered_title = title.to_lowercase();
        let mut hits: Vec<BrandHit> = Vec::new();

        for candidate in &self.candidates {
            let rule = self.check(candidate, title, &lowered_title, &normalized_title, &hits);
            if let Some(rule) = rule {
                hits.push(BrandHit {
                    brand: candidate.brand.clone(),
                    rule,
                });
            }
        }

        let result = MatchResult::from_hits(hits);
        tracing::trace!(
            title,
            matched = ?result.matched_brands(),
            brand = ?result.canonical_brand,
            "Matched title"
        );
        result
    }

    /// Apply the rules to one candidate, in order. `None` means skip.
    fn check(
        &self,
        candidate: &Candidate,
        title: &str,
        lowered_title: &str,
        normalized_title: &str,
        hits: &[BrandHit],
    ) -> Option<MatchRule> {
        if candidate.brand == CASE_SENSITIVE_BRAND && !title.contains(CASE_SENSITIVE_BRAND) {
            return None;
        }

        if lowered_title.starts_with(&candidate.lowered) {
            return Some(MatchRule::RawPrefix);
        }

        if hits.iter().any(|hit| hit.brand == candidate.brand) {
            return None;
        }

        let brand = candidate.normalized.as_str();
        if self.exceptions.ignored_titles.contains(brand) {
            return None;
        }

        if self.exceptions.front_anchored.contains(brand) && !normalized_title.starts_with(brand) {
            return None;
        }

        if self.exceptions.first_or_second_word.contains(brand)
            && !is_first_or_second_word(normalized_title, brand)
        {
            return None;
        }

        candidate
            .term
            .is_match(normalized_title)
            .then_some(MatchRule::SeparateTerm)
    }
}
