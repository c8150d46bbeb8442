//! Candidate validation. Nothing here fills in or repairs data: a candidate
//! either passes as-is or is dropped.

use std::fmt;

use clap::ValueEnum;

use crate::record::RawRecord;
use crate::rules::Extracted;

/// Reference numbers starting with these are placeholders, not real
/// certifications.
pub const PLACEHOLDER_PREFIXES: &[&str] = &["REF", "FAKE", "SAMPLE", "TEST"];

pub const MIN_REFERENCE_LEN: usize = 6;
pub const MIN_BRAND_LEN: usize = 2;
pub const MIN_LOOSE_FIELDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ValidationPolicy {
    /// Require an outdoor brand name of at least two characters.
    #[default]
    Strict,
    /// Require at least three non-empty source fields.
    Loose,
}

/// Why a candidate failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalid {
    EmptyReference,
    ShortReference(usize),
    NoDigit,
    Placeholder(&'static str),
    MissingBrand,
    TooFewFields(usize),
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invalid::EmptyReference => write!(f, "empty reference number"),
            Invalid::ShortReference(n) => write!(f, "reference number too short ({} chars)", n),
            Invalid::NoDigit => write!(f, "reference number has no digit"),
            Invalid::Placeholder(p) => write!(f, "placeholder prefix '{}'", p),
            Invalid::MissingBrand => write!(f, "missing outdoor brand"),
            Invalid::TooFewFields(n) => write!(f, "only {} non-empty fields", n),
        }
    }
}

/// Check the reference-number format shared by every policy.
pub fn check_reference(reference: &str) -> Result<(), Invalid> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(Invalid::EmptyReference);
    }
    let len = reference.chars().count();
    if len < MIN_REFERENCE_LEN {
        return Err(Invalid::ShortReference(len));
    }
    if !reference.chars().any(|c| c.is_ascii_digit()) {
        return Err(Invalid::NoDigit);
    }
    let upper = reference.to_uppercase();
    if let Some(prefix) = PLACEHOLDER_PREFIXES.iter().find(|p| upper.starts_with(*p)) {
        return Err(Invalid::Placeholder(*prefix));
    }
    Ok(())
}

pub fn is_real_reference(reference: &str) -> bool {
    check_reference(reference).is_ok()
}

impl ValidationPolicy {
    pub fn validate(&self, candidate: &Extracted, raw: &RawRecord) -> Result<(), Invalid> {
        check_reference(&candidate.reference)?;
        match self {
            ValidationPolicy::Strict => {
                if candidate.outdoor.brand_name.trim().chars().count() < MIN_BRAND_LEN {
                    return Err(Invalid::MissingBrand);
                }
            }
            ValidationPolicy::Loose => {
                let fields = raw.non_empty_content_fields();
                if fields < MIN_LOOSE_FIELDS {
                    return Err(Invalid::TooFewFields(fields));
                }
            }
        }
        Ok(())
    }
}
