//! Rendering and saving run results.
//!
//! Nothing is ever written for an empty run: a missing output file is how a
//! total failure shows up.

use std::collections::BTreeMap;
use std::path::Path;

use clap::ValueEnum;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{Result, ScraperError};
use crate::record::ProductRecord;
use crate::runner::{CategorySegment, RunReport};

pub const SOURCE: &str = "ahridirectory.org";
pub const DATA_GUARANTEE: &str = "REAL_DATA_ONLY_NO_FILLER";

#[derive(Debug, Serialize)]
struct ScrapingSummary<'a> {
    total_products: usize,
    total_categories: usize,
    duplicates_filtered: usize,
    rejected: usize,
    brand_counts: &'a BTreeMap<String, usize>,
    timestamp: &'a str,
    source: &'a str,
    scraping_method: &'a str,
    data_guarantee: &'a str,
}

/// Serializes segments as a map keyed by category, in run order.
struct ByCategory<'a>(&'a [CategorySegment]);

impl Serialize for ByCategory<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for segment in self.0 {
            map.serialize_entry(&segment.category, &segment.products)?;
        }
        map.end()
    }
}

struct Breakdown<'a>(&'a [CategorySegment]);

impl Serialize for Breakdown<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for segment in self.0 {
            map.serialize_entry(&segment.category, &segment.products.len())?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct OutputDocument<'a> {
    scraping_summary: ScrapingSummary<'a>,
    category_breakdown: Breakdown<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    products_by_category: Option<ByCategory<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    products: Option<Vec<&'a ProductRecord>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    #[value(alias = "txt")]
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

/// Output results in the requested format
pub fn render(report: &RunReport, format: OutputFormat, grouped: bool) -> Result<String> {
    match format {
        OutputFormat::Json => format_json(report, grouped),
        OutputFormat::Csv => format_csv(report),
        OutputFormat::Text => Ok(format_text(report)),
    }
}

/// Render and write to `path`. Refuses to create a file for an empty run.
pub fn save(report: &RunReport, path: &Path, format: OutputFormat, grouped: bool) -> Result<()> {
    if report.is_empty() {
        log::error!("❌ No products to save - will not create empty file");
        return Err(ScraperError::EmptyResult);
    }
    let output = render(report, format, grouped)?;
    std::fs::write(path, output)?;
    log::info!(
        "💾 Saved {} products from {} categories to {}",
        report.total_products(),
        report.segments.len(),
        path.display()
    );
    Ok(())
}

fn summary(report: &RunReport) -> ScrapingSummary<'_> {
    ScrapingSummary {
        total_products: report.total_products(),
        total_categories: report.segments.len(),
        duplicates_filtered: report.stats.duplicates,
        rejected: report.stats.rejected(),
        brand_counts: &report.brand_counts,
        timestamp: &report.timestamp,
        source: SOURCE,
        scraping_method: &report.method,
        data_guarantee: DATA_GUARANTEE,
    }
}

/// Format results as JSON
pub fn format_json(report: &RunReport, grouped: bool) -> Result<String> {
    let document = OutputDocument {
        scraping_summary: summary(report),
        category_breakdown: Breakdown(&report.segments),
        products_by_category: grouped.then(|| ByCategory(&report.segments)),
        products: (!grouped).then(|| report.products().collect()),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Format results as CSV, one row per product
pub fn format_csv(report: &RunReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);

    writer.write_record([
        "product_category",
        "ahri_reference_number",
        "outdoor_brand_name",
        "outdoor_series_name",
        "outdoor_model_number",
        "indoor_brand_name",
        "indoor_series_name",
        "indoor_model_number",
        "data_source",
        "extraction_timestamp",
    ])?;

    for p in report.products() {
        writer.write_record([
            &p.product_category,
            &p.ahri_reference_number,
            &p.outdoor_unit.brand_name,
            &p.outdoor_unit.series_name,
            &p.outdoor_unit.model_number,
            &p.indoor_unit.brand_name,
            &p.indoor_unit.series_name,
            &p.indoor_unit.model_number,
            &p.data_source,
            &p.extraction_timestamp,
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ScraperError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Format results as plain text
pub fn format_text(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Source: {} ({})\n", SOURCE, report.method));
    output.push_str(&format!("Timestamp: {}\n", report.timestamp));
    output.push_str(&format!(
        "Products: {}/{} across {} categories\n",
        report.total_products(),
        report.total_target(),
        report.segments.len()
    ));
    output.push_str(&format!(
        "Duplicates filtered: {}, rejected: {}\n",
        report.stats.duplicates,
        report.stats.rejected()
    ));

    for segment in &report.segments {
        output.push('\n');
        output.push_str(&"=".repeat(80));
        output.push_str("\n\n");
        output.push_str(&format!(
            "{} ({}/{})\n",
            segment.category,
            segment.products.len(),
            segment.target
        ));
        for p in segment.products.iter().take(10) {
            output.push_str(&format!(
                "  - {} {} {} / {}\n",
                p.ahri_reference_number,
                p.outdoor_unit.brand_name,
                p.outdoor_unit.model_number,
                p.indoor_unit.model_number
            ));
        }
        if segment.products.len() > 10 {
            output.push_str(&format!("  ... and {} more\n", segment.products.len() - 10));
        }
    }

    if !report.brand_counts.is_empty() {
        output.push_str("\nBrands:\n");
        for (brand, count) in &report.brand_counts {
            output.push_str(&format!("  {}: {}\n", brand, count));
        }
    }

    output
}
