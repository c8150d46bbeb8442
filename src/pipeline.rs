//! Extraction pipeline: raw records in, validated, deduplicated,
//! brand-balanced products out.
//!
//! One linear pass per batch. Every stage either passes a record on or drops
//! it; nothing is retried and nothing is ever filled in with defaults.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::fingerprint::fingerprint;
use crate::record::{ProductRecord, RawRecord, PRODUCT_FIELDS};
use crate::rules::{looks_like_brand, Extracted, RuleSet, BRAND_FIELDS};
use crate::validate::{Invalid, ValidationPolicy};

pub const DEFAULT_BRAND_CAP: usize = 40;

/// Brand key used for the cap when no brand can be identified.
pub const UNKNOWN_BRAND: &str = "UNKNOWN";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub rules: RuleSet,
    pub policy: ValidationPolicy,
    pub brand_cap: usize,
    /// Written into every product's `data_source`.
    pub data_source: String,
}

impl PipelineConfig {
    pub fn new(rules: RuleSet, data_source: impl Into<String>) -> Self {
        Self {
            rules,
            policy: ValidationPolicy::default(),
            brand_cap: DEFAULT_BRAND_CAP,
            data_source: data_source.into(),
        }
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_brand_cap(mut self, cap: usize) -> Self {
        self.brand_cap = cap;
        self
    }
}

/// Per-run mutable state: fingerprints seen and accepted records per brand.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    seen: HashSet<String>,
    brand_counts: BTreeMap<String, usize>,
}

impl PipelineState {
    pub fn reset(&mut self) {
        self.seen.clear();
        self.brand_counts.clear();
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn brand_count(&self, brand: &str) -> usize {
        self.brand_counts
            .get(&brand.to_uppercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn brand_counts(&self) -> &BTreeMap<String, usize> {
        &self.brand_counts
    }
}

/// Why a record was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NoReference,
    Invalid(Invalid),
    Duplicate,
    BrandCap(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoReference => write!(f, "no reference number found"),
            Rejection::Invalid(reason) => write!(f, "invalid: {}", reason),
            Rejection::Duplicate => write!(f, "duplicate"),
            Rejection::BrandCap(brand) => write!(f, "brand cap reached for {}", brand),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub processed: usize,
    pub accepted: usize,
    pub no_reference: usize,
    pub invalid: usize,
    pub duplicates: usize,
    pub brand_capped: usize,
}

impl PipelineStats {
    pub fn rejected(&self) -> usize {
        self.no_reference + self.invalid + self.duplicates + self.brand_capped
    }

    fn record(&mut self, outcome: &Result<ProductRecord, Rejection>) {
        self.processed += 1;
        match outcome {
            Ok(_) => self.accepted += 1,
            Err(Rejection::NoReference) => self.no_reference += 1,
            Err(Rejection::Invalid(_)) => self.invalid += 1,
            Err(Rejection::Duplicate) => self.duplicates += 1,
            Err(Rejection::BrandCap(_)) => self.brand_capped += 1,
        }
    }
}

/// Result of a one-shot [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub products: Vec<ProductRecord>,
    pub duplicates: usize,
    pub brand_counts: BTreeMap<String, usize>,
    pub stats: PipelineStats,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    state: PipelineState,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            state: PipelineState::default(),
            stats: PipelineStats::default(),
        }
    }

    /// Fresh pipeline over a single batch.
    pub fn run<I>(config: PipelineConfig, records: I, category: &str, target: usize) -> PipelineOutput
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut pipeline = Pipeline::new(config);
        let products = pipeline.process(records, category, target);
        PipelineOutput {
            products,
            duplicates: pipeline.stats.duplicates,
            brand_counts: pipeline.state.brand_counts.clone(),
            stats: pipeline.stats,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Clear fingerprints, brand counts and stats. Call at run start.
    pub fn reset(&mut self) {
        self.state.reset();
        self.stats = PipelineStats::default();
    }

    /// Feed records until `target` products have been accepted from this
    /// batch. Records after that point are not looked at.
    pub fn process<I>(&mut self, records: I, category: &str, target: usize) -> Vec<ProductRecord>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut accepted = Vec::new();
        if target == 0 {
            return accepted;
        }

        for raw in records {
            match self.process_record(&raw, category) {
                Ok(product) => {
                    accepted.push(product);
                    if accepted.len() >= target {
                        break;
                    }
                }
                Err(reason) => {
                    log::debug!("Dropped record ({}): {:?}", reason, raw);
                }
            }
        }

        log::debug!(
            "{}: accepted {} record(s), {} duplicate(s) so far",
            category,
            accepted.len(),
            self.stats.duplicates
        );
        accepted
    }

    /// Run one record through every stage.
    pub fn process_record(
        &mut self,
        raw: &RawRecord,
        category: &str,
    ) -> Result<ProductRecord, Rejection> {
        let outcome = self.evaluate(raw, category);
        self.stats.record(&outcome);
        outcome
    }

    fn evaluate(&mut self, raw: &RawRecord, category: &str) -> Result<ProductRecord, Rejection> {
        // Registered before extraction: a repeat of a rejected record is a
        // duplicate, not a second rejection.
        if !self.state.seen.insert(fingerprint(raw)) {
            return Err(Rejection::Duplicate);
        }

        let candidate = self
            .config
            .rules
            .extract(raw)
            .ok_or(Rejection::NoReference)?;

        self.config
            .policy
            .validate(&candidate, raw)
            .map_err(Rejection::Invalid)?;

        let brand = identify_brand(raw, &candidate);
        if self.state.brand_count(&brand) >= self.config.brand_cap {
            return Err(Rejection::BrandCap(brand));
        }
        *self.state.brand_counts.entry(brand).or_insert(0) += 1;

        let extra = extra_fields(raw, &candidate.used_fields);
        Ok(ProductRecord {
            ahri_reference_number: candidate.reference,
            outdoor_unit: candidate.outdoor,
            indoor_unit: candidate.indoor,
            data_source: self.config.data_source.clone(),
            extraction_timestamp: timestamp(),
            product_category: category.to_string(),
            extra,
        })
    }

    pub fn into_state(self) -> (PipelineState, PipelineStats) {
        (self.state, self.stats)
    }
}

/// Upper-cased brand used for the diversity cap: the first named brand
/// field, then the extracted outdoor brand, then the first brand-shaped
/// value in the record.
pub fn identify_brand(raw: &RawRecord, candidate: &Extracted) -> String {
    let named = BRAND_FIELDS.iter().find_map(|name| {
        raw.content_fields()
            .find(|(k, v)| name.eq_ignore_ascii_case(k) && !v.trim().is_empty())
            .map(|(_, v)| v.trim())
    });

    let brand = named
        .or_else(|| Some(candidate.outdoor.brand_name.trim()).filter(|b| !b.is_empty()))
        .or_else(|| {
            raw.content_fields()
                .map(|(_, v)| v.trim())
                .find(|v| looks_like_brand(v))
        });

    brand
        .map(str::to_uppercase)
        .unwrap_or_else(|| UNKNOWN_BRAND.to_string())
}

/// Non-blank source fields that extraction did not consume.
pub fn extra_fields(raw: &RawRecord, used: &[String]) -> RawRecord {
    raw.content_fields()
        .filter(|(k, v)| {
            !v.trim().is_empty() && !used.iter().any(|u| u == k) && !PRODUCT_FIELDS.contains(k)
        })
        .map(|(k, v)| (k, v.trim()))
        .collect()
}

pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
