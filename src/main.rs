use std::path::PathBuf;
use std::time::Duration;

use ahri_scraper::collector::{
    ApiCollector, Collector, FileCollector, FileKind, HttpSettings, TableCollector,
};
use ahri_scraper::output::{self, OutputFormat};
use ahri_scraper::pipeline::{Pipeline, PipelineConfig, DEFAULT_BRAND_CAP};
use ahri_scraper::runner::{self, CategoryTarget, RunOptions, RunReport};
use ahri_scraper::{RuleSet, ScraperError, UnknownBrandPolicy, ValidationPolicy};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use url::Url;

/// Where raw records come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Probe the directory's JSON search API
    Api,
    /// Read the rendered results table
    Table,
    /// Replay a saved JSON response or HTML page
    File,
}

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "ahri-scraper")]
#[command(about = "Scrapes certified HVAC equipment records from the AHRI directory", long_about = None)]
struct Args {
    /// Collector to use
    #[arg(short, long, value_enum, default_value = "api")]
    mode: Mode,

    /// Directory base URL
    #[arg(long, default_value = "https://www.ahridirectory.org")]
    base_url: String,

    /// Input file for --mode file (.json API response or .html results page)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Category to scrape (can specify multiple); defaults depend on mode
    #[arg(short, long)]
    category: Vec<String>,

    /// Products to collect per category (overrides the per-category default)
    #[arg(short = 'n', long)]
    target: Option<usize>,

    /// Maximum accepted products per brand
    #[arg(long, default_value_t = DEFAULT_BRAND_CAP)]
    brand_cap: usize,

    /// Validation strictness
    #[arg(long, value_enum, default_value = "strict")]
    policy: ValidationPolicy,

    /// How table extraction treats brands missing from the known-brand list
    #[arg(long, value_enum, default_value = "reject")]
    unknown_brands: UnknownBrandPolicy,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "30")]
    timeout: u64,

    /// Custom user agent
    #[arg(short, long)]
    user_agent: Option<String>,

    /// Proxy URL (e.g., http://proxy.example.com:8080)
    #[arg(short, long)]
    proxy: Option<String>,

    /// Delay between requests in milliseconds
    #[arg(short, long, default_value = "1000")]
    delay: u64,

    /// Table mode: open each row's detail page for SEER2, voltage and phase
    #[arg(long)]
    details: bool,

    /// Maximum number of pages per category
    #[arg(long, default_value = "10")]
    max_pages: u32,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Save output to file (defaults to ahri_products.<format>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a flat product list instead of grouping by category
    #[arg(long)]
    flat: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn targets(&self) -> Vec<CategoryTarget> {
        if !self.category.is_empty() {
            return self
                .category
                .iter()
                .map(|name| {
                    let target = self
                        .target
                        .or_else(|| CategoryTarget::default_for(name))
                        .unwrap_or(CategoryTarget::FALLBACK_TARGET);
                    CategoryTarget::new(name.as_str(), target)
                })
                .collect();
        }
        match self.mode {
            Mode::Table => {
                let mut targets = CategoryTarget::defaults();
                if let Some(n) = self.target {
                    targets.iter_mut().for_each(|t| t.target = n);
                }
                targets
            }
            Mode::Api | Mode::File => {
                vec![CategoryTarget::new("Air Conditioning", self.target.unwrap_or(400))]
            }
        }
    }

    fn http(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.timeout),
            user_agent: self.user_agent.clone(),
            proxy: self.proxy.clone(),
        }
    }

    fn pipeline(&self, rules: RuleSet, data_source: &str) -> Pipeline {
        Pipeline::new(
            PipelineConfig::new(rules, data_source)
                .with_policy(self.policy)
                .with_brand_cap(self.brand_cap),
        )
    }

    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("ahri_products.{}", self.format.extension())))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::info!("🚀 AHRI Scraper v{}", env!("CARGO_PKG_VERSION"));
    log::info!("⚠️  Only real directory records are kept - nothing is filled in");

    if let Err(e) = Url::parse(&args.base_url) {
        return Err(ScraperError::InvalidUrl(format!("{}: {}", args.base_url, e)).into());
    }

    let targets = args.targets();
    let options = RunOptions {
        max_pages: args.max_pages,
        delay: Duration::from_millis(args.delay),
    };

    let report = match args.mode {
        Mode::Api => {
            let mut collector = ApiCollector::new(&args.base_url, &args.http())?;
            let mut pipeline = args.pipeline(RuleSet::api(), "real_api_data");
            runner::run(&mut collector, &mut pipeline, &targets, &options).await
        }
        Mode::Table => {
            let mut collector = TableCollector::new(&args.base_url, &args.http())?;
            if args.details {
                collector = collector.with_details(Duration::from_millis(args.delay));
            }
            let mut pipeline = args.pipeline(
                RuleSet::table(args.unknown_brands),
                "ahri_directory_table",
            );
            runner::run(&mut collector, &mut pipeline, &targets, &options).await
        }
        Mode::File => {
            let Some(input) = &args.input else {
                anyhow::bail!("--mode file needs --input <PATH>");
            };
            let mut collector = FileCollector::new(input);
            let rules = match collector.kind() {
                FileKind::Json => RuleSet::api(),
                FileKind::Html => RuleSet::table(args.unknown_brands),
            };
            let mut pipeline = args.pipeline(rules, collector.name());
            runner::run(&mut collector, &mut pipeline, &targets, &options).await
        }
    };

    finish(&report, &args)
}

fn finish(report: &RunReport, args: &Args) -> Result<()> {
    if report.is_empty() {
        log::error!("❌ SCRAPING FAILED - No real data could be obtained");
        if !args.quiet {
            eprintln!("\n❌ SCRAPING FAILED - No real data could be obtained");
            eprintln!("🔒 No output written: this scraper never creates filler data");
            match args.mode {
                Mode::Api => eprintln!(
                    "💡 The API may be unavailable or blocked. Try the table collector: --mode table"
                ),
                Mode::Table => eprintln!(
                    "💡 The results page may need JavaScript. Try the API collector: --mode api"
                ),
                Mode::File => eprintln!(
                    "💡 Check that the input file holds a results table or an API response"
                ),
            }
        }
        return Ok(());
    }

    let path = args.output_path();
    if path.as_os_str() == "-" {
        println!("{}", output::render(report, args.format, !args.flat)?);
    } else {
        output::save(report, &path, args.format, !args.flat)?;
    }

    log::info!(
        "✅ Collected {} products across {} categories ({} duplicates filtered)",
        report.total_products(),
        report.segments.len(),
        report.stats.duplicates
    );

    if !args.quiet {
        println!(
            "\n✅ SUCCESS! Scraped {} products across {} categories",
            report.total_products(),
            report.segments.len()
        );
        if path.as_os_str() != "-" {
            println!("📁 Saved to {}", path.display());
        }
        if let Some(sample) = report.products().next() {
            println!("\n📋 Sample product data:");
            println!("{}", serde_json::to_string_pretty(sample)?);
        }
    }

    Ok(())
}
