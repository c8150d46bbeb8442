use sha2::{Digest, Sha256};

use crate::record::RawRecord;

/// Content fingerprint for duplicate detection.
///
/// SHA-256 over the record's `field:value` pairs, sorted, skipping
/// provenance fields. Field order in the record does not matter.
pub fn fingerprint(record: &RawRecord) -> String {
    let mut pairs: Vec<String> = record
        .content_fields()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect();
    pairs.sort();

    let mut hasher = Sha256::new();
    for pair in &pairs {
        hasher.update(pair.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
