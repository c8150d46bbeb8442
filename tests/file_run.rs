// tests/file_run.rs
//
// End-to-end runs over saved pages: file collector -> pipeline -> output.
//
use std::time::Duration;

use ahri_scraper::collector::FileCollector;
use ahri_scraper::output::{self, OutputFormat};
use ahri_scraper::runner::{run, CategoryTarget, RunOptions};
use ahri_scraper::{Pipeline, PipelineConfig, RuleSet, ScraperError, UnknownBrandPolicy};

const RESULTS_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<div class="results">
<table class="dataTable">
  <thead>
    <tr>
      <th>AHRI Certified Reference Number</th>
      <th>Outdoor Unit Brand Name</th>
      <th>Outdoor Unit Series Name</th>
      <th>Outdoor Unit Model Number</th>
      <th>Indoor Unit Model Number</th>
    </tr>
  </thead>
  <tbody>
    <tr><td>201234567</td><td>GOODMAN</td><td>GSX14</td><td>GSX140361</td><td>CAPTA3622</td></tr>
    <tr><td>201234568</td><td>Carrier</td><td>Comfort</td><td>24ACC636A003</td><td>CNPVP3617ALA</td></tr>
    <tr><td>201234568</td><td>Carrier</td><td>Comfort</td><td>24ACC636A003</td><td>CNPVP3617ALA</td></tr>
    <tr><td>TEST000001</td><td>Lennox</td><td>Merit</td><td>ML14XC1-036</td><td>CBA25UHV</td></tr>
    <tr><td>201234569</td><td>Acme Cooling</td><td>X</td><td>AC-36</td><td>AH-36</td></tr>
  </tbody>
</table>
</div>
</body></html>"#;

const API_RESPONSE: &str = r#"{
  "totalCount": 3,
  "results": [
    {"ahriReferenceNumber": "210000001", "outdoorBrand": "TRANE", "outdoorModel": "4TTR6036", "indoorModel": "TEM6A0C36"},
    {"ahriReferenceNumber": "210000002", "outdoorBrand": "TRANE", "outdoorModel": "4TTR6048", "indoorModel": "TEM6A0D48"},
    {"ahriReferenceNumber": "SAMPLE0001", "outdoorBrand": "TRANE", "outdoorModel": "X", "indoorModel": "Y"}
  ]
}"#;

fn options() -> RunOptions {
    RunOptions {
        max_pages: 3,
        delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn html_page_to_grouped_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("results.html");
    std::fs::write(&input, RESULTS_PAGE).unwrap();

    let mut collector = FileCollector::new(&input);
    let mut pipeline = Pipeline::new(PipelineConfig::new(
        RuleSet::table(UnknownBrandPolicy::Reject),
        "ahri_directory_table",
    ));
    let targets = [CategoryTarget::new("Air Conditioning", 300)];

    let report = run(&mut collector, &mut pipeline, &targets, &options()).await;

    // Acme is not a known brand, so strict validation drops it.
    assert_eq!(report.total_products(), 2);
    assert_eq!(report.stats.duplicates, 1);
    assert_eq!(report.stats.invalid, 2);

    let products: Vec<_> = report.products().collect();
    assert_eq!(products[0].ahri_reference_number, "201234567");
    assert_eq!(products[0].outdoor_unit.brand_name, "GOODMAN");
    assert_eq!(products[0].outdoor_unit.series_name, "GSX14");
    assert_eq!(products[0].indoor_unit.brand_name, "GOODMAN");
    assert_eq!(products[0].indoor_unit.model_number, "CAPTA3622");
    assert_eq!(products[1].outdoor_unit.brand_name, "Carrier");

    let out = dir.path().join("ahri_products.json");
    output::save(&report, &out, OutputFormat::Json, true).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(value["scraping_summary"]["total_products"], 2);
    assert_eq!(value["scraping_summary"]["scraping_method"], "file");
    assert_eq!(
        value["products_by_category"]["Air Conditioning"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn unknown_brands_can_be_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("results.html");
    std::fs::write(&input, RESULTS_PAGE).unwrap();

    let mut collector = FileCollector::new(&input);
    let mut pipeline = Pipeline::new(PipelineConfig::new(
        RuleSet::table(UnknownBrandPolicy::Accept),
        "ahri_directory_table",
    ));
    let targets = [CategoryTarget::new("Air Conditioning", 300)];

    let report = run(&mut collector, &mut pipeline, &targets, &options()).await;

    assert_eq!(report.total_products(), 3);
    assert_eq!(report.brand_counts.get("ACME COOLING"), Some(&1));
}

#[tokio::test]
async fn api_response_to_flat_csv() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("response.json");
    std::fs::write(&input, API_RESPONSE).unwrap();

    let mut collector = FileCollector::new(&input);
    let mut pipeline = Pipeline::new(PipelineConfig::new(RuleSet::api(), "real_api_data"));
    let targets = [CategoryTarget::new("Air Conditioning", 400)];

    let report = run(&mut collector, &mut pipeline, &targets, &options()).await;
    assert_eq!(report.total_products(), 2);
    assert_eq!(report.brand_counts.get("TRANE"), Some(&2));

    let out = dir.path().join("ahri_products.csv");
    output::save(&report, &out, OutputFormat::Csv, false).unwrap();
    let csv = std::fs::read_to_string(&out).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.contains("210000002"));
    assert!(!csv.contains("SAMPLE0001"));
}

#[tokio::test]
async fn nothing_usable_means_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("blocked.html");
    std::fs::write(&input, "<html><body>Access denied</body></html>").unwrap();

    let mut collector = FileCollector::new(&input);
    let mut pipeline = Pipeline::new(PipelineConfig::new(
        RuleSet::table(UnknownBrandPolicy::Reject),
        "ahri_directory_table",
    ));
    let targets = CategoryTarget::defaults();

    let report = run(&mut collector, &mut pipeline, &targets[..2], &options()).await;
    assert!(report.is_empty());

    let out = dir.path().join("ahri_products.json");
    let result = output::save(&report, &out, OutputFormat::Json, true);
    assert!(matches!(result, Err(ScraperError::EmptyResult)));
    assert!(!out.exists());
}
