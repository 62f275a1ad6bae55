//! Batch brand assignment.
//!
//! Runs the matcher over a product list and hands one `ProductMapping` per
//! product to a sink. Products that already carry a mapping, or whose title
//! is on the ignore list, are skipped before matching.

use pharmabrand_dataset::{DatasetError, MappingSink};
use pharmabrand_matcher::BrandMatcher;
use pharmabrand_model::{MatchResult, PharmacyItem, ProductMapping};
use rayon::prelude::*;
use serde::Serialize;
use std::borrow::Borrow;

/// Where the products came from; used to derive mapping identifiers.
#[derive(Debug, Clone)]
pub struct AssignContext {
    pub source: String,
    pub country: String,
}

impl AssignContext {
    pub fn new(source: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            country: country.into(),
        }
    }
}

/// Counters for one assignment run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignSummary {
    pub total: usize,
    pub already_mapped: usize,
    pub ignored: usize,
    pub branded: usize,
    pub unbranded: usize,
}

/// Match every product title. Output order follows input order.
pub fn match_products<T>(matcher: &BrandMatcher, products: &[T]) -> Vec<MatchResult>
where
    T: Borrow<PharmacyItem> + Sync,
{
    products
        .par_iter()
        .map(|item| {
            let item: &PharmacyItem = item.borrow();
            matcher.match_title(&item.title)
        })
        .collect()
}

/// Assign brands to all unmapped products and write the mappings.
///
/// Products with an existing mapping or an ignored title are skipped and
/// get no row.
pub fn assign_brands(
    matcher: &BrandMatcher,
    products: &[PharmacyItem],
    context: &AssignContext,
    sink: &mut dyn MappingSink,
) -> Result<AssignSummary, DatasetError> {
    let mut summary = AssignSummary {
        total: products.len(),
        ..Default::default()
    };

    let mut pending: Vec<&PharmacyItem> = Vec::with_capacity(products.len());
    for item in products {
        if item.is_mapped() {
            summary.already_mapped += 1;
        } else if matcher.is_ignored_title(&item.title) {
            summary.ignored += 1;
        } else {
            pending.push(item);
        }
    }

    let results = match_products(matcher, &pending);

    for (item, result) in pending.iter().zip(&results) {
        match &result.canonical_brand {
            Some(_) => summary.branded += 1,
            None => summary.unbranded += 1,
        }

        tracing::debug!(
            source_id = %item.source_id,
            title = %item.title,
            matched = ?result.matched_brands(),
            brand = ?result.canonical_brand,
            "Assigned brand"
        );

        let mapping = ProductMapping::new(&context.source, &context.country, item, result);
        sink.write(&mapping)?;
    }
    sink.flush()?;

    tracing::info!(
        source = %context.source,
        country = %context.country,
        total = summary.total,
        already_mapped = summary.already_mapped,
        ignored = summary.ignored,
        branded = summary.branded,
        unbranded = summary.unbranded,
        "Brand assignment finished"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pharmabrand_dataset::MemorySink;
    use pharmabrand_graph::BrandGraph;
    use pharmabrand_model::{mapping_id, BrandRelationship, ExceptionLists};
    use pretty_assertions::assert_eq;

    fn bayer_matcher() -> BrandMatcher {
        let rels = vec![
            BrandRelationship::new("bayer", "aspirin; bayercare"),
            BrandRelationship::new("neox", "neox"),
        ];
        BrandMatcher::new(&BrandGraph::from_relationships(&rels), &ExceptionLists::default())
    }

    #[test]
    fn test_assign_skips_mapped_products() {
        let products = vec![
            PharmacyItem::new("1", "Bayer Aspirin 100mg"),
            PharmacyItem::new("2", "NEOX TABLET").with_mapping("existing"),
            PharmacyItem::new("3", "Unknown Cream"),
            PharmacyItem::new("4", "Bio"),
        ];
        let mut sink = MemorySink::default();
        let context = AssignContext::new("MDE", "ee");

        let summary = assign_brands(&bayer_matcher(), &products, &context, &mut sink).unwrap();

        assert_eq!(
            summary,
            AssignSummary {
                total: 4,
                already_mapped: 1,
                ignored: 1,
                branded: 1,
                unbranded: 1,
            }
        );

        let ids: Vec<_> = sink.mappings.iter().map(|m| m.source_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);

        let first = &sink.mappings[0];
        assert_eq!(first.id, mapping_id("MDE", "ee", "1"));
        assert_eq!(first.brand.as_deref(), Some("aspirin"));
        assert_eq!(first.matched_brands, vec!["aspirin", "bayer"]);
    }

    #[test]
    fn test_ignored_titles_get_no_mapping() {
        let products = vec![PharmacyItem::new("1", "Bio"), PharmacyItem::new("2", "NÉB")];
        let mut sink = MemorySink::default();
        let context = AssignContext::new("MDE", "ee");

        let summary = assign_brands(&bayer_matcher(), &products, &context, &mut sink).unwrap();

        assert!(sink.mappings.is_empty());
        assert_eq!(summary.ignored, 2);
        assert_eq!(summary.branded + summary.unbranded, 0);
    }

    #[test]
    fn test_match_products_keeps_order() {
        let products: Vec<_> = (0..50)
            .map(|i| {
                let title = if i % 2 == 0 { "NEOX GEL" } else { "PLAIN GEL" };
                PharmacyItem::new(i.to_string(), title)
            })
            .collect();

        let results = match_products(&bayer_matcher(), &products);
        assert_eq!(results.len(), 50);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.canonical_brand.is_some(), i % 2 == 0, "product {i}");
        }
    }
}
