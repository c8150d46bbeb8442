//! Collectors turn a results surface (JSON API, HTML table, saved file) into
//! batches of [`RawRecord`]s. All site navigation and parsing lives here; the
//! pipeline never does I/O.

pub mod api;
pub mod file;
pub mod table;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};

use crate::error::Result;
use crate::record::RawRecord;

pub use api::{ApiCollector, Endpoint, ProbeMethod};
pub use file::{FileCollector, FileKind};
pub use table::TableCollector;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Source of raw records, one page of one category at a time.
///
/// An empty batch means the collector could not reach or parse anything for
/// that page; the run loop treats it as the end of the category.
#[allow(async_fn_in_trait)]
pub trait Collector {
    /// Label used for logging and the output summary.
    fn name(&self) -> &'static str;

    /// Produce the batch for `category`, `page` (1-based).
    async fn fetch_batch(&mut self, category: &str, page: u32) -> Result<Vec<RawRecord>>;
}

/// HTTP client settings shared by the network collectors.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            proxy: None,
        }
    }
}

/// Build HTTP client with custom configuration
pub fn build_client(settings: &HttpSettings, referer: &str) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/html, text/plain, */*"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    if let Ok(value) = HeaderValue::from_str(referer) {
        headers.insert(REFERER, value);
    }

    let mut client_builder = reqwest::Client::builder()
        .timeout(settings.timeout)
        .default_headers(headers)
        .user_agent(
            settings
                .user_agent
                .as_deref()
                .unwrap_or(DEFAULT_USER_AGENT),
        );

    // Add proxy if specified
    if let Some(proxy_url) = &settings.proxy {
        log::debug!("Using proxy: {}", proxy_url);
        client_builder = client_builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }

    Ok(client_builder.build()?)
}

/// Try `candidates` in order and stop at the first one whose probe yields
/// records. Failed and empty candidates are logged and skipped; later
/// candidates are never probed once one works.
pub async fn first_working<T, F, Fut>(candidates: Vec<T>, mut probe: F) -> Option<(T, Vec<RawRecord>)>
where
    T: Clone + fmt::Display,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<Vec<RawRecord>>>,
{
    let hits = stream::iter(candidates).filter_map(|candidate| {
        let attempt = probe(candidate.clone());
        async move {
            match attempt.await {
                Ok(records) if !records.is_empty() => Some((candidate, records)),
                Ok(_) => {
                    log::debug!("Nothing usable from {}", candidate);
                    None
                }
                Err(e) => {
                    log::debug!("{} failed: {}", candidate, e);
                    None
                }
            }
        }
    });
    let mut hits = std::pin::pin!(hits);
    hits.next().await
}
