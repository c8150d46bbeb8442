//! Replays a saved API response (`.json`) or results page (`.html`).

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::api::records_from_json;
use super::table::parse_table;
use super::Collector;
use crate::error::Result;
use crate::record::RawRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Json,
    Html,
}

impl FileKind {
    /// `.json` files are API responses, anything else is treated as HTML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => FileKind::Json,
            _ => FileKind::Html,
        }
    }
}

pub struct FileCollector {
    path: PathBuf,
    kind: FileKind,
}

impl FileCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = FileKind::from_path(&path);
        Self { path, kind }
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }
}

impl Collector for FileCollector {
    fn name(&self) -> &'static str {
        "file"
    }

    /// The whole file is page 1; there are no further pages.
    async fn fetch_batch(&mut self, category: &str, page: u32) -> Result<Vec<RawRecord>> {
        if page > 1 {
            return Ok(Vec::new());
        }
        log::info!("📂 Reading {} for {}", self.path.display(), category);
        let content = tokio::fs::read_to_string(&self.path).await?;
        match self.kind {
            FileKind::Json => {
                let data: Value = serde_json::from_str(&content)?;
                Ok(records_from_json(&data))
            }
            FileKind::Html => parse_table(&content),
        }
    }
}
