//! Brand equivalence graph.
//!
//! Turns manufacturer relationship rows into an undirected graph of
//! lowercase brand names. Two brands connected by an edge are treated as
//! the same manufacturer family.

use pharmabrand_model::BrandRelationship;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// Undirected brand graph keyed by lowercase brand name.
///
/// Keys and their neighbour lists keep insertion order. That order is only
/// a stable default for display; matching does not depend on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandGraph {
    entries: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl BrandGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from relationship rows.
    pub fn from_relationships<'a>(
        relationships: impl IntoIterator<Item = &'a BrandRelationship>,
    ) -> Self {
        let mut builder = BrandGraphBuilder::new();
        for relationship in relationships {
            builder.add_relationship(relationship);
        }
        builder.build()
    }

    /// Number of brands (keys) in the graph.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, brand: &str) -> bool {
        self.index.contains_key(brand)
    }

    /// Brands equivalent to `brand`, or `None` if it is not a key.
    pub fn related(&self, brand: &str) -> Option<&[String]> {
        self.index.get(brand).map(|&i| self.entries[i].1.as_slice())
    }

    /// Iterate keys with their equivalence sets in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(brand, related)| (brand.as_str(), related.as_slice()))
    }

    /// Every brand that appears in some equivalence set, deduplicated, in
    /// first-seen order (walking keys, then their members).
    pub fn member_brands(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.entries
            .iter()
            .flat_map(|(_, related)| related.iter())
            .map(String::as_str)
            .filter(|brand| seen.insert(*brand))
            .collect()
    }

    /// Total number of directed entries across all sets.
    pub fn edge_count(&self) -> usize {
        self.entries.iter().map(|(_, related)| related.len()).sum()
    }

    fn slot(&mut self, brand: &str) -> usize {
        if let Some(&i) = self.index.get(brand) {
            return i;
        }
        let i = self.entries.len();
        self.entries.push((brand.to_string(), Vec::new()));
        self.index.insert(brand.to_string(), i);
        i
    }

    fn link(&mut self, from: &str, to: &str) {
        let i = self.slot(from);
        let related = &mut self.entries[i].1;
        if !related.iter().any(|r| r == to) {
            related.push(to.to_string());
        }
    }
}

impl Serialize for BrandGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (brand, related) in &self.entries {
            map.serialize_entry(brand, related)?;
        }
        map.end()
    }
}

/// Incremental builder for `BrandGraph`.
#[derive(Debug, Default)]
pub struct BrandGraphBuilder {
    graph: BrandGraph,
    skipped_tokens: usize,
}

impl BrandGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one relationship row.
    ///
    /// The primary brand and each `;`-separated related token are trimmed
    /// and lowercased. Edges are added in both directions. Empty related
    /// tokens are dropped.
    pub fn add_relationship(&mut self, relationship: &BrandRelationship) -> &mut Self {
        let primary = relationship.primary_brand.trim().to_lowercase();
        self.graph.slot(&primary);

        for token in relationship.related_brands.split(';') {
            let related = token.trim().to_lowercase();
            if related.is_empty() {
                self.skipped_tokens += 1;
                continue;
            }
            self.graph.link(&primary, &related);
            self.graph.link(&related, &primary);
        }

        self
    }

    pub fn build(self) -> BrandGraph {
        tracing::debug!(
            brands = self.graph.len(),
            edges = self.graph.edge_count(),
            skipped_tokens = self.skipped_tokens,
            "Built brand graph"
        );
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn related(graph: &BrandGraph, brand: &str) -> Vec<String> {
        graph.related(brand).unwrap_or_default().to_vec()
    }

    #[test]
    fn test_bayer_graph() {
        let rels = vec![BrandRelationship::new("bayer", "aspirin; bayercare")];
        let graph = BrandGraph::from_relationships(&rels);

        assert_eq!(graph.len(), 3);
        assert_eq!(related(&graph, "bayer"), vec!["aspirin", "bayercare"]);
        assert_eq!(related(&graph, "aspirin"), vec!["bayer"]);
        assert_eq!(related(&graph, "bayercare"), vec!["bayer"]);
    }

    #[test]
    fn test_symmetry_and_case_folding() {
        let rels = vec![
            BrandRelationship::new("Bayer", "Aspirin;BAYERCARE"),
            BrandRelationship::new("Roche", " Aspirin "),
        ];
        let graph = BrandGraph::from_relationships(&rels);

        for (brand, members) in graph.iter() {
            for member in members {
                assert!(
                    related(&graph, member).iter().any(|b| b == brand),
                    "{member} should link back to {brand}"
                );
            }
        }
        assert_eq!(related(&graph, "aspirin"), vec!["bayer", "roche"]);
    }

    #[test]
    fn test_self_relationship() {
        let rels = vec![BrandRelationship::new("neox", "neox")];
        let graph = BrandGraph::from_relationships(&rels);
        assert_eq!(graph.len(), 1);
        assert_eq!(related(&graph, "neox"), vec!["neox"]);
    }

    #[test]
    fn test_empty_tokens_dropped() {
        let rels = vec![BrandRelationship::new("bayer", "aspirin; ;;")];
        let graph = BrandGraph::from_relationships(&rels);
        assert!(!graph.contains(""));
        assert_eq!(related(&graph, "bayer"), vec!["aspirin"]);

        let lonely = BrandGraph::from_relationships(&[BrandRelationship::new("solo", "")]);
        assert!(lonely.contains("solo"));
        assert_eq!(lonely.edge_count(), 0);
    }

    #[test]
    fn test_member_brands_deduplicated() {
        let rels = vec![
            BrandRelationship::new("bayer", "aspirin; bayercare"),
            BrandRelationship::new("roche", "aspirin"),
        ];
        let graph = BrandGraph::from_relationships(&rels);
        assert_eq!(
            graph.member_brands(),
            vec!["aspirin", "bayercare", "bayer", "roche"]
        );
    }

    #[test]
    fn test_deterministic_and_serializable() {
        let rels = vec![BrandRelationship::new("bayer", "aspirin; bayercare")];
        let a = BrandGraph::from_relationships(&rels);
        let b = BrandGraph::from_relationships(&rels);
        assert_eq!(a, b);

        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(
            json,
            r#"{"bayer":["aspirin","bayercare"],"aspirin":["bayer"],"bayercare":["bayer"]}"#
        );
    }
}
