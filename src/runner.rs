//! Run loop: categories, pages, collector, pipeline.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::collector::Collector;
use crate::pipeline::{timestamp, Pipeline, PipelineStats};
use crate::record::ProductRecord;

/// Default categories and how many products to collect for each.
pub const DEFAULT_TARGETS: &[(&str, usize)] = &[
    ("Air Conditioning", 300),
    ("Air-Source Heat Pumps", 300),
    ("Residential Furnaces", 300),
    ("Residential Water Heaters", 300),
    ("Residential Boilers", 300),
    ("Geothermal - Water-Source Heat Pumps", 300),
    ("Commercial Furnaces", 100),
    ("Datacom Cooling", 100),
    ("Direct Heating Equipment", 100),
    ("Forced Circulation Air-Cooling & Air-Heating Coils", 100),
    ("Packaged Terminal Air Conditioners", 100),
    ("Packaged Terminal Heat Pumps", 100),
    ("Room Fan Coil Units", 100),
    ("Single Package Vertical Air-Conditioners and Heat Pumps", 100),
    ("Unitary Large Equipment", 100),
    (
        "Variable Refrigerant Flow (VRF) Multi-Split Air Conditioning and Heat Pump Equipment",
        100,
    ),
    ("Geothermal - Direct Geoexchange Heat Pumps", 100),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTarget {
    pub name: String,
    pub target: usize,
}

impl CategoryTarget {
    /// Target for a category missing from [`DEFAULT_TARGETS`].
    pub const FALLBACK_TARGET: usize = 300;

    pub fn new(name: impl Into<String>, target: usize) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }

    pub fn defaults() -> Vec<Self> {
        DEFAULT_TARGETS
            .iter()
            .map(|(name, target)| Self::new(*name, *target))
            .collect()
    }

    /// Default target for a named category (ASCII case-insensitive).
    pub fn default_for(name: &str) -> Option<usize> {
        DEFAULT_TARGETS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name.trim()))
            .map(|(_, target)| *target)
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_pages: u32,
    /// Pause between page requests and between categories.
    pub delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_pages: 10,
            delay: Duration::from_millis(1000),
        }
    }
}

/// Products collected for one category.
#[derive(Debug, Clone)]
pub struct CategorySegment {
    pub category: String,
    pub target: usize,
    pub products: Vec<ProductRecord>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub segments: Vec<CategorySegment>,
    pub stats: PipelineStats,
    pub brand_counts: BTreeMap<String, usize>,
    /// Collector name, e.g. `api` or `table`.
    pub method: String,
    pub timestamp: String,
}

impl RunReport {
    pub fn total_products(&self) -> usize {
        self.segments.iter().map(|s| s.products.len()).sum()
    }

    pub fn total_target(&self) -> usize {
        self.segments.iter().map(|s| s.target).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_products() == 0
    }

    pub fn products(&self) -> impl Iterator<Item = &ProductRecord> {
        self.segments.iter().flat_map(|s| s.products.iter())
    }
}

/// Collect every category in turn. The pipeline is reset first, so
/// fingerprints and brand counts span exactly this run.
///
/// A category whose pages yield nothing is skipped; the report only lists
/// categories that produced at least one product.
pub async fn run<C: Collector>(
    collector: &mut C,
    pipeline: &mut Pipeline,
    targets: &[CategoryTarget],
    options: &RunOptions,
) -> RunReport {
    pipeline.reset();
    let total_target: usize = targets.iter().map(|t| t.target).sum();
    log::info!(
        "🚀 Scraping {} categor{} via {} (target: {} products)",
        targets.len(),
        if targets.len() == 1 { "y" } else { "ies" },
        collector.name(),
        total_target
    );

    let mut segments = Vec::new();
    for (i, target) in targets.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(options.delay).await;
        }

        let products = collect_category(collector, pipeline, target, options).await;
        if products.is_empty() {
            log::warn!("⚠️  {}: No products found", target.name);
            continue;
        }
        log::info!(
            "✅ {}: {}/{} products collected",
            target.name,
            products.len(),
            target.target
        );
        segments.push(CategorySegment {
            category: target.name.clone(),
            target: target.target,
            products,
        });
    }

    RunReport {
        segments,
        stats: pipeline.stats().clone(),
        brand_counts: pipeline.state().brand_counts().clone(),
        method: collector.name().to_string(),
        timestamp: timestamp(),
    }
}

async fn collect_category<C: Collector>(
    collector: &mut C,
    pipeline: &mut Pipeline,
    target: &CategoryTarget,
    options: &RunOptions,
) -> Vec<ProductRecord> {
    log::info!("🎯 Scraping {} (target: {})", target.name, target.target);
    let mut products = Vec::new();

    for page in 1..=options.max_pages {
        if products.len() >= target.target {
            break;
        }
        if page > 1 {
            log::debug!("Waiting {}ms before next page", options.delay.as_millis());
            tokio::time::sleep(options.delay).await;
        }

        let batch = match collector.fetch_batch(&target.name, page).await {
            Ok(batch) => batch,
            Err(e) => {
                log::warn!("❌ Could not get page {} of {}: {}", page, target.name, e);
                break;
            }
        };
        if batch.is_empty() {
            log::info!("📄 No more pages for {}", target.name);
            break;
        }

        let remaining = target.target - products.len();
        let accepted = pipeline.process(batch, &target.name, remaining);
        if accepted.is_empty() {
            log::info!("❌ Page {} had no valid products", page);
            break;
        }
        log::info!("📦 Got {} products from page {}", accepted.len(), page);
        products.extend(accepted);
    }

    products
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ScraperError};
    use crate::pipeline::PipelineConfig;
    use crate::record::RawRecord;
    use crate::rules::RuleSet;

    /// Serves canned pages; records which pages were requested.
    struct Scripted {
        pages: Vec<Vec<RawRecord>>,
        fail_on: Option<u32>,
        requests: Vec<(String, u32)>,
    }

    impl Collector for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_batch(&mut self, category: &str, page: u32) -> Result<Vec<RawRecord>> {
            self.requests.push((category.to_string(), page));
            if self.fail_on == Some(page) {
                return Err(ScraperError::InvalidUrl("boom".into()));
            }
            Ok(self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn page(start: u32, count: u32, brand: &str) -> Vec<RawRecord> {
        (start..start + count)
            .map(|n| {
                [("ref", format!("{}", 50_000_000 + n)), ("brand", brand.to_string())]
                    .into_iter()
                    .collect()
            })
            .collect()
    }

    fn options() -> RunOptions {
        RunOptions {
            max_pages: 5,
            delay: Duration::ZERO,
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(PipelineConfig::new(RuleSet::api(), "test"))
    }

    #[tokio::test]
    async fn pages_until_target_is_met() {
        let mut collector = Scripted {
            pages: vec![page(0, 3, "TRANE"), page(3, 3, "YORK"), page(6, 3, "RHEEM")],
            fail_on: None,
            requests: Vec::new(),
        };
        let mut pipeline = pipeline();
        let targets = [CategoryTarget::new("Air Conditioning", 5)];

        let report = run(&mut collector, &mut pipeline, &targets, &options()).await;

        assert_eq!(report.total_products(), 5);
        assert_eq!(collector.requests.len(), 2);
        assert_eq!(report.brand_counts.get("YORK"), Some(&2));
        assert_eq!(report.method, "scripted");
    }

    #[tokio::test]
    async fn empty_category_is_skipped() {
        let mut collector = Scripted {
            pages: Vec::new(),
            fail_on: None,
            requests: Vec::new(),
        };
        let mut pipeline = pipeline();
        let targets = [
            CategoryTarget::new("Air Conditioning", 5),
            CategoryTarget::new("Residential Boilers", 5),
        ];

        let report = run(&mut collector, &mut pipeline, &targets, &options()).await;

        assert!(report.is_empty());
        assert!(report.segments.is_empty());
        assert_eq!(collector.requests.len(), 2);
    }

    #[tokio::test]
    async fn collector_error_ends_the_category_only() {
        let mut collector = Scripted {
            pages: vec![page(0, 2, "TRANE"), page(2, 2, "TRANE")],
            fail_on: Some(2),
            requests: Vec::new(),
        };
        let mut pipeline = pipeline();
        let targets = [CategoryTarget::new("Air Conditioning", 10)];

        let report = run(&mut collector, &mut pipeline, &targets, &options()).await;
        assert_eq!(report.total_products(), 2);
    }

    #[tokio::test]
    async fn duplicates_across_categories_are_dropped() {
        let mut collector = Scripted {
            pages: vec![page(0, 4, "LENNOX")],
            fail_on: None,
            requests: Vec::new(),
        };
        let mut pipeline = pipeline();
        let targets = [
            CategoryTarget::new("Air Conditioning", 10),
            CategoryTarget::new("Air-Source Heat Pumps", 10),
        ];

        let report = run(&mut collector, &mut pipeline, &targets, &options()).await;

        assert_eq!(report.segments.len(), 1);
        assert_eq!(report.stats.duplicates, 4);
    }

    #[test]
    fn default_targets_cover_all_categories() {
        let defaults = CategoryTarget::defaults();
        assert_eq!(defaults.len(), 17);
        assert_eq!(defaults.iter().map(|t| t.target).sum::<usize>(), 2900);
    }

    #[test]
    fn named_category_uses_its_default_target() {
        assert_eq!(CategoryTarget::default_for("Datacom Cooling"), Some(100));
        assert_eq!(CategoryTarget::default_for(" air conditioning "), Some(300));
        assert_eq!(CategoryTarget::default_for("Ice Machines"), None);
    }
}
