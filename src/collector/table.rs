//! Collector for the directory's rendered results table.
//!
//! Optionally follows the link in each row's first cell to the product's
//! detail page and adds the ratings found there to the row.

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{build_client, first_working, Collector, HttpSettings};
use crate::error::{Result, ScraperError};
use crate::normalize::{is_header_row, keys_for_headers, row_to_record};
use crate::record::RawRecord;

/// Search pages tried in order until one yields a table.
pub const SEARCH_PATHS: &[&str] = &[
    "/search/101?searchMode=program",
    "/Search/SearchHome",
    "/NewSearch?programId=68&searchTypeId=3&productTypeId=1",
    "/search/air-conditioners",
];

const TABLE_SELECTORS: &[&str] = &["table.dataTable", ".results-table table", ".data-table", "table"];
const HEADER_SELECTORS: &[&str] = &["thead tr th", "tr:first-child th", "tr:first-child td"];

/// Labelled values read off a product detail page, as (field, label).
pub const DETAIL_LABELS: &[(&str, &str)] = &[
    ("seer2", "SEER2"),
    ("voltage", "Voltage"),
    ("phase", "Phase"),
];

/// A parsed results row and the link in its first cell, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub record: RawRecord,
    pub detail_link: Option<String>,
}

pub struct TableCollector {
    client: reqwest::Client,
    search_urls: Vec<Url>,
    results_url: Option<Url>,
    /// Pause before each detail page; `None` skips detail pages.
    detail_delay: Option<Duration>,
}

impl TableCollector {
    pub fn new(base_url: &str, http: &HttpSettings) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ScraperError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let search_urls = SEARCH_PATHS
            .iter()
            .map(|path| {
                base.join(path)
                    .map_err(|e| ScraperError::InvalidUrl(format!("{}{}: {}", base, path, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            client: build_client(http, base.as_str())?,
            search_urls,
            results_url: None,
            detail_delay: None,
        })
    }

    /// Visit each row's detail page, waiting `delay` before each request.
    pub fn with_details(mut self, delay: Duration) -> Self {
        self.detail_delay = Some(delay);
        self
    }

    /// Search page the results table was found on, once found.
    pub fn results_url(&self) -> Option<&Url> {
        self.results_url.as_ref()
    }

    async fn fetch_html(&self, url: &Url) -> Result<Option<String>> {
        log::debug!("Fetching: {}", url);
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            log::warn!("Non-success status code: {}", response.status().as_u16());
            return Ok(None);
        }
        Ok(Some(response.text().await?))
    }

    async fn fetch_rows(&self, url: &Url) -> Result<Vec<RawRecord>> {
        let Some(html) = self.fetch_html(url).await? else {
            return Ok(Vec::new());
        };
        let mut rows = parse_table_rows(&html)?;
        if let Some(delay) = self.detail_delay {
            for row in &mut rows {
                self.add_details(url, row, delay).await;
            }
        }
        Ok(rows.into_iter().map(|row| row.record).collect())
    }

    /// Merge detail-page values into the row. Fields already on the row win;
    /// a failed detail page leaves the row as it was.
    async fn add_details(&self, page: &Url, row: &mut TableRow, delay: Duration) {
        let Some(href) = &row.detail_link else {
            return;
        };
        let link = match page.join(href) {
            Ok(link) => link,
            Err(e) => {
                log::debug!("Bad detail link '{}': {}", href, e);
                return;
            }
        };

        tokio::time::sleep(delay).await;
        let details = match self.fetch_html(&link).await {
            Ok(Some(html)) => parse_details(&html),
            Ok(None) => return,
            Err(e) => {
                log::debug!("Detail page {} failed: {}", link, e);
                return;
            }
        };
        match details {
            Ok(details) => {
                for (key, value) in details.iter() {
                    if row.record.get(key).is_none() {
                        row.record.insert(key, value);
                    }
                }
            }
            Err(e) => log::debug!("Could not read {}: {}", link, e),
        }
    }
}

impl Collector for TableCollector {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn fetch_batch(&mut self, category: &str, page: u32) -> Result<Vec<RawRecord>> {
        if let Some(results_url) = &self.results_url {
            let url = page_url(results_url, page);
            log::info!("📄 {} page {}: {}", category, page, url);
            return self.fetch_rows(&url).await;
        }

        let this = &*self;
        let found = first_working(this.search_urls.clone(), move |url| async move {
            log::info!("🔗 Trying URL: {}", url);
            this.fetch_rows(&url).await
        })
        .await;

        let Some((found, rows)) = found else {
            log::error!("❌ Could not find a results table");
            return Ok(Vec::new());
        };
        log::info!("✅ Found results table at {}", found);
        let rows = if page > 1 {
            self.fetch_rows(&page_url(&found, page)).await?
        } else {
            rows
        };
        self.results_url = Some(found);
        Ok(rows)
    }
}

/// URL for a results page. Page 1 is the URL itself, later pages set a
/// `page` query parameter.
pub fn page_url(url: &Url, page: u32) -> Url {
    if page <= 1 {
        return url.clone();
    }
    let mut next = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    next.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("page", &page.to_string());
    next
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScraperError::InvalidSelector(format!("{}: {}", css, e)))
}

fn cell_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse the first results table on a page into records keyed by cleaned
/// headers. A page without a table yields no records.
pub fn parse_table(html: &str) -> Result<Vec<RawRecord>> {
    Ok(parse_table_rows(html)?
        .into_iter()
        .map(|row| row.record)
        .collect())
}

/// Like [`parse_table`], keeping each row's detail link.
pub fn parse_table_rows(html: &str) -> Result<Vec<TableRow>> {
    let document = Html::parse_document(html);
    let row_selector = selector("tr")?;
    let cell_selector = selector("td, th")?;
    let link_selector = selector("a[href]")?;

    let mut table = None;
    for css in TABLE_SELECTORS {
        let sel = selector(css)?;
        if let Some(el) = document
            .select(&sel)
            .find(|el| el.select(&row_selector).next().is_some())
        {
            log::debug!("Found results container: {}", css);
            table = Some(el);
            break;
        }
    }
    let Some(table) = table else {
        return Ok(Vec::new());
    };

    let mut headers: Vec<String> = Vec::new();
    for css in HEADER_SELECTORS {
        let sel = selector(css)?;
        let found: Vec<String> = table.select(&sel).map(cell_text).collect();
        if found.iter().filter(|h| !h.is_empty()).count() > 2 {
            headers = found;
            break;
        }
    }
    if headers.is_empty() {
        log::warn!("⚠️  No headers found, using generic column names");
    } else {
        log::debug!("Column headers: {:?}", headers);
    }
    let keys = keys_for_headers(&headers);

    // Body rows only, when the table has a body; thead rows are headers.
    let body_row_selector = selector("tbody tr")?;
    let mut rows: Vec<ElementRef<'_>> = table.select(&body_row_selector).collect();
    if rows.is_empty() {
        rows = table.select(&row_selector).collect();
    }
    let mut records = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let cell_els: Vec<ElementRef<'_>> = row.select(&cell_selector).collect();
        if cell_els.is_empty() {
            continue;
        }
        let cells: Vec<String> = cell_els.iter().copied().map(cell_text).collect();
        if i == 0 && rows.len() > 1 && is_header_row(&cells.join(" ")) {
            continue;
        }
        let record = row_to_record(&cells, &keys);
        if record.is_empty() {
            continue;
        }
        let detail_link = cell_els[0]
            .select(&link_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);
        records.push(TableRow {
            record,
            detail_link,
        });
    }

    Ok(records)
}

/// Read the [`DETAIL_LABELS`] values (`SEER2: 16.0`) off a detail page.
/// When blocks nest, the shortest block mentioning a label is used.
pub fn parse_details(html: &str) -> Result<RawRecord> {
    let document = Html::parse_document(html);
    let block_selector = selector(".card-body div")?;
    let blocks: Vec<String> = document.select(&block_selector).map(cell_text).collect();

    let mut details = RawRecord::new();
    for (key, label) in DETAIL_LABELS {
        let value = blocks
            .iter()
            .filter(|text| text.contains(label))
            .min_by_key(|text| text.len())
            .and_then(|text| text.split_once(':'))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty());
        if let Some(value) = value {
            details.insert(*key, value);
        }
    }
    Ok(details)
}
