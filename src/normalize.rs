//! Field normalization: turn table headers into record keys and rows into
//! [`RawRecord`]s. Pure renaming, no validation happens here.

use crate::record::RawRecord;

const HEADER_KEYWORDS: &[&str] = &[
    "ahri",
    "reference",
    "brand",
    "model",
    "outdoor",
    "indoor",
    "series",
];

/// Clean a header into a JSON-friendly key, e.g.
/// `"AHRI Certified Ref. #"` becomes `"ahri_certified_ref_number"`.
///
/// Returns `None` when nothing usable is left.
pub fn clean_header(header: &str) -> Option<String> {
    let mut out = String::with_capacity(header.len());
    for ch in header.trim().to_lowercase().chars() {
        match ch {
            '#' => out.push_str("number"),
            '&' => out.push_str("and"),
            '%' => out.push_str("percent"),
            ' ' | '-' | '/' | '_' => out.push('_'),
            c if c.is_alphanumeric() => out.push(c),
            _ => {}
        }
    }

    // Collapse repeated separators
    let mut collapsed = String::with_capacity(out.len());
    let mut last_us = false;
    for ch in out.chars() {
        if ch == '_' {
            if !last_us {
                collapsed.push(ch);
            }
            last_us = true;
        } else {
            collapsed.push(ch);
            last_us = false;
        }
    }

    let key = collapsed.trim_matches('_');
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

pub fn positional_key(index: usize) -> String {
    format!("column_{}", index)
}

/// Build the key list for a header row. Blank or unusable headers get a
/// positional key.
pub fn keys_for_headers<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| clean_header(h.as_ref()).unwrap_or_else(|| positional_key(i)))
        .collect()
}

/// Map cell texts onto keys. Cells past the end of `keys` get positional
/// keys; blank cells are dropped.
pub fn row_to_record<S: AsRef<str>>(cells: &[S], keys: &[String]) -> RawRecord {
    let mut record = RawRecord::new();
    for (i, cell) in cells.iter().enumerate() {
        let text = cell.as_ref().trim();
        if text.is_empty() {
            continue;
        }
        let key = keys.get(i).cloned().unwrap_or_else(|| positional_key(i));
        record.insert(key, text);
    }
    record
}

/// Heuristic for a header row that ended up among the body rows.
pub fn is_header_row(text: &str) -> bool {
    let lower = text.to_lowercase();
    let hits = HEADER_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count();
    hits >= 2 && lower.split_whitespace().count() < 20
}
