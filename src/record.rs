//! Record types flowing through the pipeline.
//!
//! A [`RawRecord`] is whatever a collector managed to pull off a results
//! surface: field names and text, no schema. A [`ProductRecord`] is the
//! normalized, validated output.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Field names assigned by the pipeline rather than the collector. They never
/// take part in fingerprinting or field counting.
pub const PROVENANCE_FIELDS: &[&str] = &[
    "data_source",
    "extraction_timestamp",
    "product_category",
    "target_count",
    "timestamp",
];

pub fn is_provenance_field(key: &str) -> bool {
    PROVENANCE_FIELDS
        .iter()
        .any(|field| field.eq_ignore_ascii_case(key))
}

/// Top-level names of a serialized [`ProductRecord`]. Extra source fields
/// with these names are left out so they cannot shadow the real ones.
pub const PRODUCT_FIELDS: &[&str] = &[
    "ahri_reference_number",
    "outdoor_unit",
    "indoor_unit",
];

/// Unvalidated field-name to text mapping, in the order the collector
/// produced the fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing the value in place if the key already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fields that came from the source, skipping provenance metadata.
    pub fn content_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| !is_provenance_field(k))
    }

    /// Number of content fields carrying non-blank text.
    pub fn non_empty_content_fields(&self) -> usize {
        self.content_fields()
            .filter(|(_, v)| !v.trim().is_empty())
            .count()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Serializes as a map in field order.
impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = RawRecord;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RawRecord, A::Error> {
                let mut record = RawRecord::new();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    record.insert(key, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct UnitInfo {
    pub brand_name: String,
    pub series_name: String,
    pub model_number: String,
}

/// A validated product.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub ahri_reference_number: String,
    pub outdoor_unit: UnitInfo,
    pub indoor_unit: UnitInfo,
    pub data_source: String,
    pub extraction_timestamp: String,
    pub product_category: String,
    /// Source fields not used for the unit details (ratings, capacities,
    /// detail-page values), written alongside the fields above.
    #[serde(flatten)]
    pub extra: RawRecord,
}
