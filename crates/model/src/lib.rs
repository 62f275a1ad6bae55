//! Core domain model for pharmacy brand assignment.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `BrandRelationship`: a manufacturer relationship row from the brand dataset
//! - `PharmacyItem`: a product record whose title gets matched
//! - `MatchResult`: matched brands for one title plus the canonical pick
//! - `ExceptionLists`: the static exception rules applied during matching
//! - `ProductMapping`: the row handed to persistence

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

/// A manufacturer relationship from the brand connections dataset.
///
/// `related_brands` is a `;`-separated list, e.g. `"aspirin; bayercare"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandRelationship {
    #[serde(rename = "manufacturer_p1")]
    pub primary_brand: String,

    #[serde(rename = "manufacturers_p2", default)]
    pub related_brands: String,
}

impl BrandRelationship {
    pub fn new(primary_brand: impl Into<String>, related_brands: impl Into<String>) -> Self {
        Self {
            primary_brand: primary_brand.into(),
            related_brands: related_brands.into(),
        }
    }
}

/// A product record from a pharmacy source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PharmacyItem {
    /// Free-text product title
    #[serde(default)]
    pub title: String,

    /// Source-specific product id (numbers are accepted and stringified)
    #[serde(deserialize_with = "string_or_number")]
    pub source_id: String,

    /// Existing mapping identifier; products that have one are not re-matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m_id: Option<String>,
}

impl PharmacyItem {
    pub fn new(source_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_id: source_id.into(),
            m_id: None,
        }
    }

    pub fn with_mapping(mut self, m_id: impl Into<String>) -> Self {
        self.m_id = Some(m_id.into());
        self
    }

    /// Whether this product already has a row in the mapping table.
    pub fn is_mapped(&self) -> bool {
        self.m_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

/// Which rule accepted a brand for a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// The lowercased raw title starts with the brand
    RawPrefix,
    /// The brand is a separate term of the normalized title
    SeparateTerm,
}

impl MatchRule {
    pub fn label(&self) -> &'static str {
        match self {
            Self::RawPrefix => "raw prefix",
            Self::SeparateTerm => "separate term",
        }
    }
}

/// A single brand accepted for a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandHit {
    pub brand: String,
    pub rule: MatchRule,
}

/// Outcome of matching one product title.
///
/// `matched` is deduplicated and kept in first-seen order. The canonical
/// brand is the lexicographically smallest matched brand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: Vec<BrandHit>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_brand: Option<String>,
}

impl MatchResult {
    /// Empty result, used for ignored titles.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a result from raw hits, dropping repeated brands.
    pub fn from_hits(hits: impl IntoIterator<Item = BrandHit>) -> Self {
        let mut matched: Vec<BrandHit> = Vec::new();
        for hit in hits {
            if !matched.iter().any(|m| m.brand == hit.brand) {
                matched.push(hit);
            }
        }

        let canonical_brand = matched.iter().map(|m| m.brand.as_str()).min().map(str::to_string);

        Self {
            matched,
            canonical_brand,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// Matched brands in first-seen order.
    pub fn matched_brands(&self) -> Vec<&str> {
        self.matched.iter().map(|m| m.brand.as_str()).collect()
    }

    /// Matched brands sorted ascending; the first one is the canonical brand.
    pub fn sorted_brands(&self) -> Vec<&str> {
        let mut brands = self.matched_brands();
        brands.sort_unstable();
        brands
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read exception lists from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid exception lists: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Static exception rules applied on top of the separate-term match.
///
/// Entries are compared after normalization, so their case and accents
/// do not matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExceptionLists {
    /// Titles that never get a brand
    pub ignored_titles: Vec<String>,

    /// Brands that must be a prefix of the title
    pub front_anchored_brands: Vec<String>,

    /// Brands that must be the first or second word of the title
    pub first_or_second_word_brands: Vec<String>,
}

impl Default for ExceptionLists {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            ignored_titles: owned(&["BIO", "NEB"]),
            front_anchored_brands: owned(&[
                "rich", "rff", "flex", "ultra", "gum", "beauty", "orto", "free", "112", "kin",
                "happy",
            ]),
            first_or_second_word_brands: owned(&["heel", "contour", "nero", "rsv"]),
        }
    }
}

impl ExceptionLists {
    /// No exceptions at all; every candidate goes straight to term matching.
    pub fn none() -> Self {
        Self {
            ignored_titles: Vec::new(),
            front_anchored_brands: Vec::new(),
            first_or_second_word_brands: Vec::new(),
        }
    }

    /// Parse lists from TOML. Missing keys fall back to the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_ignored_titles(mut self, titles: &[&str]) -> Self {
        self.ignored_titles = titles.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_front_anchored(mut self, brands: &[&str]) -> Self {
        self.front_anchored_brands = brands.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_first_or_second_word(mut self, brands: &[&str]) -> Self {
        self.first_or_second_word_brands = brands.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Deterministic mapping-table key for a product.
///
/// SHA-256 of `{source}_{country}_{source_id}`, as lowercase hex.
pub fn mapping_id(source: &str, country: &str, source_id: &str) -> String {
    let key = format!("{}_{}_{}", source, country, source_id);
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

/// A brand assignment ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMapping {
    pub id: String,
    pub source: String,
    pub country: String,
    pub source_id: String,

    #[serde(default)]
    pub brand: Option<String>,

    /// All brands that matched, for auditing
    #[serde(default)]
    pub matched_brands: Vec<String>,
}

impl ProductMapping {
    pub fn new(source: &str, country: &str, item: &PharmacyItem, result: &MatchResult) -> Self {
        Self {
            id: mapping_id(source, country, &item.source_id),
            source: source.to_string(),
            country: country.to_string(),
            source_id: item.source_id.clone(),
            brand: result.canonical_brand.clone(),
            matched_brands: result.matched.iter().map(|m| m.brand.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hit(brand: &str) -> BrandHit {
        BrandHit {
            brand: brand.to_string(),
            rule: MatchRule::SeparateTerm,
        }
    }

    #[test]
    fn test_relationship_field_names() {
        let json = r#"{"manufacturer_p1": "Bayer", "manufacturers_p2": "Aspirin; BayerCare"}"#;
        let rel: BrandRelationship = serde_json::from_str(json).unwrap();
        assert_eq!(rel, BrandRelationship::new("Bayer", "Aspirin; BayerCare"));
    }

    #[test]
    fn test_item_numeric_source_id() {
        let json = r#"{"title": "NEOX TABLET", "source_id": 1234, "price": 3.5}"#;
        let item: PharmacyItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.source_id, "1234");
        assert!(!item.is_mapped());

        let mapped = item.with_mapping("abc");
        assert!(mapped.is_mapped());
    }

    #[test]
    fn test_result_dedup_and_canonical() {
        let result = MatchResult::from_hits(vec![hit("bayer"), hit("aspirin"), hit("bayer")]);
        assert_eq!(result.matched_brands(), vec!["bayer", "aspirin"]);
        assert_eq!(result.sorted_brands(), vec!["aspirin", "bayer"]);
        assert_eq!(result.canonical_brand.as_deref(), Some("aspirin"));
    }

    #[test]
    fn test_empty_result_has_no_canonical() {
        let result = MatchResult::from_hits(Vec::new());
        assert!(result.is_empty());
        assert_eq!(result.canonical_brand, None);
        assert_eq!(result, MatchResult::empty());
    }

    #[test]
    fn test_exception_lists_toml() {
        let lists = ExceptionLists::from_toml_str(
            r#"
            ignored_titles = ["VITAMIN"]
            front_anchored_brands = []
            "#,
        )
        .unwrap();
        assert_eq!(lists.ignored_titles, vec!["VITAMIN"]);
        assert!(lists.front_anchored_brands.is_empty());
        // Missing key keeps the default
        assert_eq!(
            lists.first_or_second_word_brands,
            ExceptionLists::default().first_or_second_word_brands
        );
    }

    #[test]
    fn test_exception_lists_bad_toml() {
        assert!(matches!(
            ExceptionLists::from_toml_str("ignored_titles = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_mapping_id_stable() {
        let a = mapping_id("MDE", "ee", "42");
        assert_eq!(a, mapping_id("MDE", "ee", "42"));
        assert_ne!(a, mapping_id("MDE", "lv", "42"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_product_mapping_from_result() {
        let item = PharmacyItem::new("7", "Bayer Aspirin");
        let result = MatchResult::from_hits(vec![hit("bayer"), hit("aspirin")]);
        let mapping = ProductMapping::new("MDE", "ee", &item, &result);
        assert_eq!(mapping.id, mapping_id("MDE", "ee", "7"));
        assert_eq!(mapping.brand.as_deref(), Some("aspirin"));
        assert_eq!(mapping.matched_brands, vec!["bayer", "aspirin"]);
    }
}
