//! Field extraction rules.
//!
//! Each product field is filled by the first rule (in list order) targeting
//! it that produces a non-blank value. Rules are plain data so a rule set can
//! be printed, tested, and extended without touching the pipeline.

use std::sync::OnceLock;

use clap::ValueEnum;
use regex::Regex;

use crate::record::{RawRecord, UnitInfo};

/// Brands recognised when sniffing free text in table rows.
pub const KNOWN_BRANDS: &[&str] = &[
    "AMERICAN STANDARD",
    "DAY & NIGHT",
    "CARRIER",
    "BRYANT",
    "PAYNE",
    "TRANE",
    "LENNOX",
    "GOODMAN",
    "AMANA",
    "DAIKIN",
    "RHEEM",
    "RUUD",
    "YORK",
    "LUXAIRE",
    "COLEMAN",
    "HEIL",
    "TEMPSTAR",
    "COMFORTMAKER",
    "ARCOAIRE",
    "KEEPRITE",
    "FRIGIDAIRE",
    "MAYTAG",
    "NORDYNE",
    "GIBSON",
    "WESTINGHOUSE",
    "MITSUBISHI",
    "FUJITSU",
    "SAMSUNG",
    "GREE",
    "BOSCH",
    "AIRTEMP",
    "ARMSTRONG AIR",
    "DUCANE",
    "CONCORD",
    "LG",
];

/// Field names probed (in order) to find a record's brand for the
/// diversity cap.
pub const BRAND_FIELDS: &[&str] = &[
    "outdoor_unit_brand_name",
    "outdoorBrand",
    "outdoor_brand",
    "brand_name",
    "brand",
    "manufacturer",
    "indoor_unit_brand_name",
    "indoorBrand",
    "indoor_brand",
];

fn reference_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{6,})\b").expect("reference token regex is valid"))
}

/// Product field a rule fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Reference,
    OutdoorBrand,
    OutdoorSeries,
    OutdoorModel,
    IndoorBrand,
    IndoorSeries,
    IndoorModel,
}

/// How a rule finds its value inside a record.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Value of the first field whose name equals one of these
    /// (ASCII case-insensitive).
    Key(&'static [&'static str]),
    /// Value of the first field whose name contains every one of these
    /// fragments.
    KeyContainsAll(&'static [&'static str]),
    /// First capture group (or whole match) of the pattern in any field value.
    Token(Regex),
    /// First known brand name found as a whole word in any field value.
    KnownBrand,
}

/// What to do with a brand column whose value is not on the known list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum UnknownBrandPolicy {
    /// Take the column value verbatim.
    Accept,
    /// Ignore the column unless its value contains a known brand.
    #[default]
    Reject,
}

#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub target: Target,
    pub matcher: Matcher,
    /// Only accept values that contain a known brand.
    pub known_brand_only: bool,
}

impl ExtractionRule {
    pub fn new(target: Target, matcher: Matcher) -> Self {
        Self {
            target,
            matcher,
            known_brand_only: false,
        }
    }

    pub fn known_brand_only(mut self, yes: bool) -> Self {
        self.known_brand_only = yes;
        self
    }

    /// Run this rule against a record.
    pub fn apply(&self, record: &RawRecord) -> Option<String> {
        self.find(record).map(|(_, value)| value)
    }

    /// Like [`apply`](Self::apply), also naming the field the value came from.
    pub fn find<'r>(&self, record: &'r RawRecord) -> Option<(&'r str, String)> {
        let (key, value) = match &self.matcher {
            Matcher::Key(names) => names
                .iter()
                .find_map(|name| {
                    record
                        .content_fields()
                        .find(|(k, v)| !v.trim().is_empty() && name.eq_ignore_ascii_case(k))
                })
                .map(|(k, v)| (k, v.trim().to_string())),
            Matcher::KeyContainsAll(fragments) => record
                .content_fields()
                .find(|(k, v)| {
                    let key = k.to_lowercase();
                    !v.trim().is_empty() && fragments.iter().all(|f| key.contains(f))
                })
                .map(|(k, v)| (k, v.trim().to_string())),
            Matcher::Token(re) => record.content_fields().find_map(|(k, v)| {
                re.captures(v).map(|caps| {
                    let token = caps
                        .get(1)
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    (k, token)
                })
            }),
            // Indoor columns describe the other unit.
            Matcher::KnownBrand => record
                .content_fields()
                .filter(|(k, _)| !k.to_lowercase().contains("indoor"))
                .find_map(|(k, v)| find_known_brand(v).map(|brand| (k, brand.to_string()))),
        }?;

        if value.is_empty() {
            return None;
        }
        if self.known_brand_only && find_known_brand(&value).is_none() {
            log::debug!("Ignoring unlisted brand '{}'", value);
            return None;
        }
        Some((key, value))
    }
}

/// Reference number and unit details pulled out of one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub reference: String,
    pub outdoor: UnitInfo,
    pub indoor: UnitInfo,
    /// Record fields the values above were taken from.
    pub used_fields: Vec<String>,
}

/// Ordered rule list. For each target the first rule producing a value wins.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ExtractionRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<ExtractionRule>) -> Self {
        Self { rules }
    }

    pub fn push(&mut self, rule: ExtractionRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Rules for JSON API items: explicit keys only, no sniffing.
    pub fn api() -> Self {
        use Matcher::Key;
        use Target::*;
        Self::new(vec![
            ExtractionRule::new(
                Reference,
                Key(&[
                    "ahriReferenceNumber",
                    "referenceNumber",
                    "ahri_ref",
                    "reference_number",
                    "ahri_reference_number",
                    "ref",
                ]),
            ),
            ExtractionRule::new(
                OutdoorBrand,
                Key(&["outdoorBrand", "outdoor_brand", "brand", "manufacturer"]),
            ),
            ExtractionRule::new(OutdoorSeries, Key(&["outdoorSeries", "outdoor_series", "series"])),
            ExtractionRule::new(
                OutdoorModel,
                Key(&["outdoorModel", "outdoor_model", "model", "modelNumber"]),
            ),
            ExtractionRule::new(IndoorBrand, Key(&["indoorBrand", "indoor_brand"])),
            ExtractionRule::new(IndoorSeries, Key(&["indoorSeries", "indoor_series"])),
            ExtractionRule::new(IndoorModel, Key(&["indoorModel", "indoor_model"])),
        ])
    }

    /// Rules for rows read off an HTML table with cleaned header keys.
    pub fn table(unknown_brands: UnknownBrandPolicy) -> Self {
        use Matcher::*;
        use Target::*;
        let strict_brand = unknown_brands == UnknownBrandPolicy::Reject;
        Self::new(vec![
            ExtractionRule::new(
                Reference,
                Key(&[
                    "ahri_certified_reference_number",
                    "ahri_certified_ref_number",
                    "ahri_reference_number",
                    "ahri_ref_number",
                    "ahri_ref",
                    "reference_number",
                    "ref",
                ]),
            ),
            ExtractionRule::new(Reference, KeyContainsAll(&["reference"])),
            ExtractionRule::new(Reference, Token(reference_token().clone())),
            ExtractionRule::new(OutdoorBrand, KeyContainsAll(&["outdoor", "brand"]))
                .known_brand_only(strict_brand),
            ExtractionRule::new(OutdoorBrand, Key(&["brand_name", "brand", "manufacturer"]))
                .known_brand_only(strict_brand),
            ExtractionRule::new(OutdoorBrand, KnownBrand),
            ExtractionRule::new(OutdoorSeries, KeyContainsAll(&["outdoor", "series"])),
            ExtractionRule::new(OutdoorSeries, Key(&["series_name", "series"])),
            ExtractionRule::new(OutdoorModel, KeyContainsAll(&["outdoor", "model"])),
            ExtractionRule::new(OutdoorModel, Key(&["model_number", "model"])),
            ExtractionRule::new(IndoorBrand, KeyContainsAll(&["indoor", "brand"]))
                .known_brand_only(strict_brand),
            ExtractionRule::new(IndoorSeries, KeyContainsAll(&["indoor", "series"])),
            ExtractionRule::new(IndoorModel, KeyContainsAll(&["indoor", "model"])),
        ])
    }

    fn first<'r>(&self, target: Target, record: &'r RawRecord) -> Option<(&'r str, String)> {
        self.rules
            .iter()
            .filter(|rule| rule.target == target)
            .find_map(|rule| rule.find(record))
    }

    /// Extract a candidate. `None` when no reference number can be located.
    /// Indoor brand falls back to the outdoor brand.
    pub fn extract(&self, record: &RawRecord) -> Option<Extracted> {
        let mut used_fields: Vec<String> = Vec::new();
        let mut take = |target: Target| {
            self.first(target, record).map(|(key, value)| {
                if !used_fields.iter().any(|k| k == key) {
                    used_fields.push(key.to_string());
                }
                value
            })
        };

        let reference = take(Target::Reference)?;
        let outdoor = UnitInfo {
            brand_name: take(Target::OutdoorBrand).unwrap_or_default(),
            series_name: take(Target::OutdoorSeries).unwrap_or_default(),
            model_number: take(Target::OutdoorModel).unwrap_or_default(),
        };
        let indoor_brand = take(Target::IndoorBrand);
        let indoor_series = take(Target::IndoorSeries).unwrap_or_default();
        let indoor_model = take(Target::IndoorModel).unwrap_or_default();
        let indoor = UnitInfo {
            brand_name: indoor_brand.unwrap_or_else(|| outdoor.brand_name.clone()),
            series_name: indoor_series,
            model_number: indoor_model,
        };

        Some(Extracted {
            reference,
            outdoor,
            indoor,
            used_fields,
        })
    }
}

/// Find a known brand as a whole word inside `text` (case-insensitive).
pub fn find_known_brand(text: &str) -> Option<&'static str> {
    let upper = text.to_uppercase();
    KNOWN_BRANDS
        .iter()
        .copied()
        .find(|brand| contains_word(&upper, brand))
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Whether a value plausibly names a manufacturer: starts with a letter,
/// no digits, 2 to 40 characters, at most four words.
pub fn looks_like_brand(value: &str) -> bool {
    let value = value.trim();
    let len = value.chars().count();
    (2..=40).contains(&len)
        && value.chars().next().is_some_and(char::is_alphabetic)
        && !value.chars().any(|c| c.is_ascii_digit())
        && value.split_whitespace().count() <= 4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs.iter().copied().collect()
    }

    #[test]
    fn api_rules_trust_explicit_keys() {
        let rec = record(&[
            ("ahriReferenceNumber", " 201234567 "),
            ("outdoorBrand", "Carrier"),
            ("outdoorModel", "24ACC636A003"),
            ("indoorModel", "CNPVP3617ALA"),
        ]);
        let got = RuleSet::api().extract(&rec).unwrap();

        assert_eq!(got.reference, "201234567");
        assert_eq!(got.outdoor.brand_name, "Carrier");
        assert_eq!(got.outdoor.model_number, "24ACC636A003");
        assert_eq!(got.indoor.brand_name, "Carrier");
        assert_eq!(got.indoor.model_number, "CNPVP3617ALA");
    }

    #[test]
    fn api_rules_do_not_sniff_values() {
        let rec = record(&[("notes", "201234567 CARRIER")]);
        assert!(RuleSet::api().extract(&rec).is_none());
    }

    #[test]
    fn key_order_beats_field_order() {
        let rec = record(&[("brand", "TRANE"), ("outdoor_brand", "LENNOX")]);
        let rules = RuleSet::api();
        assert_eq!(
            rules.first(Target::OutdoorBrand, &rec).map(|(_, v)| v).as_deref(),
            Some("LENNOX")
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let rec = record(&[
            ("reference_number", "555555555"),
            ("notes", "see 201234567"),
        ]);
        let rules = RuleSet::table(UnknownBrandPolicy::Accept);
        assert_eq!(
            rules.first(Target::Reference, &rec),
            Some(("reference_number", "555555555".to_string()))
        );

        let custom = RuleSet::new(vec![ExtractionRule::new(
            Target::Reference,
            Matcher::Token(Regex::new(r"see (\d+)").unwrap()),
        )]);
        assert_eq!(
            custom.first(Target::Reference, &rec),
            Some(("notes", "201234567".to_string()))
        );
    }

    #[test]
    fn table_rules_sniff_reference_and_brand_from_positional_cells() {
        let rec = record(&[
            ("column_0", "AHRI # 201234567"),
            ("column_1", "Goodman Manufacturing"),
            ("column_2", "GSX140361"),
        ]);
        let got = RuleSet::table(UnknownBrandPolicy::Reject)
            .extract(&rec)
            .unwrap();

        assert_eq!(got.reference, "201234567");
        assert_eq!(got.outdoor.brand_name, "GOODMAN");
    }

    #[test]
    fn unknown_brand_policy_controls_unlisted_brand_columns() {
        let rec = record(&[
            ("ahri_reference_number", "201234567"),
            ("outdoor_unit_brand_name", "Acme Cooling"),
        ]);

        let rejected = RuleSet::table(UnknownBrandPolicy::Reject)
            .extract(&rec)
            .unwrap();
        assert_eq!(rejected.outdoor.brand_name, "");

        let accepted = RuleSet::table(UnknownBrandPolicy::Accept)
            .extract(&rec)
            .unwrap();
        assert_eq!(accepted.outdoor.brand_name, "Acme Cooling");
    }

    #[test]
    fn indoor_columns_do_not_leak_into_outdoor_fields() {
        let rec = record(&[
            ("ahri_reference_number", "201234567"),
            ("indoor_unit_model_number", "CAPTA3622"),
            ("outdoor_unit_model_number", "GSX140361"),
        ]);
        let got = RuleSet::table(UnknownBrandPolicy::Accept)
            .extract(&rec)
            .unwrap();

        assert_eq!(got.outdoor.model_number, "GSX140361");
        assert_eq!(got.indoor.model_number, "CAPTA3622");
    }

    #[test]
    fn indoor_brand_never_stands_in_for_unlisted_outdoor_brand() {
        let rec = record(&[
            ("ahri_certified_reference_number", "201234567"),
            ("outdoor_unit_brand_name", "Acme Cooling"),
            ("indoor_unit_brand_name", "CARRIER"),
            ("outdoor_unit_model_number", "AC-36"),
        ]);
        let got = RuleSet::table(UnknownBrandPolicy::Reject)
            .extract(&rec)
            .unwrap();

        assert_eq!(got.outdoor.brand_name, "");
        assert_eq!(got.indoor.brand_name, "CARRIER");
    }

    #[test]
    fn extraction_lists_the_fields_it_used() {
        let rec = record(&[
            ("ahri_certified_reference_number", "201234567"),
            ("outdoor_unit_brand_name", "TRANE"),
            ("cooling_capacity_btuh", "35400"),
            ("outdoor_unit_model_number", "4TTR6036"),
        ]);
        let got = RuleSet::table(UnknownBrandPolicy::Reject)
            .extract(&rec)
            .unwrap();

        assert_eq!(
            got.used_fields,
            vec![
                "ahri_certified_reference_number",
                "outdoor_unit_brand_name",
                "outdoor_unit_model_number",
            ]
        );
    }

    #[test]
    fn known_brand_needs_word_boundaries() {
        assert_eq!(find_known_brand("lg electronics"), Some("LG"));
        assert_eq!(find_known_brand("BULGARIA"), None);
        assert_eq!(find_known_brand("American Standard Heating"), Some("AMERICAN STANDARD"));
    }

    #[test]
    fn brand_shape() {
        assert!(looks_like_brand("Carrier"));
        assert!(looks_like_brand("American Standard"));
        assert!(!looks_like_brand("24ACC636A003"));
        assert!(!looks_like_brand("X"));
        assert!(!looks_like_brand("one two three four five"));
    }
}
