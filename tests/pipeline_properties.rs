// tests/pipeline_properties.rs
//
// Behaviour of the extraction pipeline as seen through the public API.
//
use ahri_scraper::validate::{is_real_reference, PLACEHOLDER_PREFIXES};
use ahri_scraper::{Pipeline, PipelineConfig, RawRecord, RuleSet, UnknownBrandPolicy, ValidationPolicy};

fn record(pairs: &[(&str, &str)]) -> RawRecord {
    pairs.iter().copied().collect()
}

fn api() -> PipelineConfig {
    PipelineConfig::new(RuleSet::api(), "real_api_data")
}

/// A messy batch: valid rows, placeholders, short refs, repeats, one brand
/// flooding the rest.
fn mixed_batch() -> Vec<RawRecord> {
    let mut batch = Vec::new();
    for i in 0..60 {
        let reference = format!("{}", 200_000_000 + i);
        batch.push(record(&[("ref", reference.as_str()), ("brand", "CARRIER")]));
    }
    for prefix in PLACEHOLDER_PREFIXES {
        let reference = format!("{}123456", prefix);
        batch.push(record(&[("ref", reference.as_str()), ("brand", "TRANE")]));
    }
    batch.push(record(&[("ref", "12345"), ("brand", "TRANE")]));
    batch.push(record(&[("ref", "ABCDEFGH"), ("brand", "TRANE")]));
    for i in 0..10 {
        let reference = format!("{}", 300_000_000 + i);
        batch.push(record(&[("brand", "lennox"), ("ref", reference.as_str())]));
        batch.push(record(&[("ref", reference.as_str()), ("brand", "lennox")]));
    }
    batch
}

#[test]
fn no_fabricated_references_survive() {
    let out = Pipeline::run(api(), mixed_batch(), "Air Conditioning", 1000);
    assert!(!out.products.is_empty());

    for product in &out.products {
        let reference = &product.ahri_reference_number;
        assert!(reference.len() >= 6, "{}", reference);
        assert!(reference.chars().any(|c| c.is_ascii_digit()), "{}", reference);
        for prefix in PLACEHOLDER_PREFIXES {
            assert!(!reference.to_uppercase().starts_with(prefix), "{}", reference);
        }
        assert!(is_real_reference(reference));
    }
}

#[test]
fn reordered_fields_count_as_duplicates() {
    let out = Pipeline::run(api(), mixed_batch(), "Air Conditioning", 1000);
    assert_eq!(out.duplicates, 10);
    assert_eq!(out.brand_counts.get("LENNOX"), Some(&10));
}

#[test]
fn brand_cap_holds_for_every_cap() {
    for cap in [0, 1, 5, 40, 100] {
        let out = Pipeline::run(api().with_brand_cap(cap), mixed_batch(), "AC", 1000);
        for (brand, count) in &out.brand_counts {
            assert!(*count <= cap, "{} has {} with cap {}", brand, count, cap);
        }
        let carrier = out
            .products
            .iter()
            .filter(|p| p.outdoor_unit.brand_name == "CARRIER")
            .count();
        assert_eq!(carrier, cap.min(60));
    }
}

#[test]
fn larger_target_never_shrinks_output() {
    let batch = mixed_batch();
    let mut previous = 0;
    for target in [0, 1, 2, 10, 39, 40, 41, 49, 50, 51, 200] {
        let out = Pipeline::run(api(), batch.clone(), "AC", target);
        assert!(out.products.len() <= target);
        assert!(out.products.len() >= previous);
        previous = out.products.len();
    }
    assert_eq!(previous, 50);
}

#[test]
fn empty_input_is_empty_output() {
    let out = Pipeline::run(api(), Vec::new(), "AC", 400);
    assert!(out.products.is_empty());
    assert_eq!(out.duplicates, 0);
    assert!(out.brand_counts.is_empty());
}

#[test]
fn identical_pair_scenario() {
    let records = vec![
        record(&[("ref", "12345678"), ("brand", "LENNOX")]),
        record(&[("ref", "12345678"), ("brand", "LENNOX")]),
    ];
    let out = Pipeline::run(api(), records, "AC", 400);
    assert_eq!(out.products.len(), 1);
    assert_eq!(out.duplicates, 1);
}

#[test]
fn placeholder_scenario() {
    let records = vec![record(&[("ref", "REF00001"), ("brand", "LENNOX")])];
    let out = Pipeline::run(api(), records, "AC", 400);
    assert!(out.products.is_empty());
}

#[test]
fn carrier_cap_scenario() {
    let records: Vec<_> = (0..41)
        .map(|i| {
            let reference = format!("{}", 10_000_000 + i);
            record(&[("ref", reference.as_str()), ("brand", "CARRIER")])
        })
        .collect();
    let out = Pipeline::run(api().with_brand_cap(40), records, "AC", 400);
    assert_eq!(out.products.len(), 40);
    assert_eq!(out.stats.brand_capped, 1);
}

#[test]
fn table_rows_with_loose_policy() {
    let config = PipelineConfig::new(RuleSet::table(UnknownBrandPolicy::Accept), "ahri_directory_table")
        .with_policy(ValidationPolicy::Loose);
    let rows = vec![
        record(&[
            ("column_0", "201234567"),
            ("column_1", "Acme Cooling"),
            ("column_2", "AC-36"),
        ]),
        record(&[("column_0", "201234568"), ("column_1", "Acme Cooling")]),
    ];
    let out = Pipeline::run(config, rows, "Air Conditioning", 10);

    assert_eq!(out.products.len(), 1);
    assert_eq!(out.products[0].ahri_reference_number, "201234567");
    assert_eq!(out.brand_counts.get("ACME COOLING"), Some(&1));
}
