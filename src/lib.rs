//! Scraper for AHRI directory certification records.
//!
//! Collectors pull raw rows from the directory's JSON API, its rendered
//! results table, or a saved file. The [`pipeline`] turns those rows into
//! validated, deduplicated, brand-balanced [`ProductRecord`]s.

pub mod collector;
pub mod error;
pub mod fingerprint;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod rules;
pub mod runner;
pub mod validate;

pub use error::{Result, ScraperError};
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput, PipelineStats, Rejection};
pub use record::{ProductRecord, RawRecord, UnitInfo};
pub use rules::{RuleSet, UnknownBrandPolicy};
pub use validate::ValidationPolicy;
