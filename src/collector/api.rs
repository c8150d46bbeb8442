//! Collector for the directory's undocumented JSON search API.
//!
//! The endpoint is not published, so a fixed list of candidates is probed
//! in order, each with GET then POST. The first one returning recognisable
//! AHRI items is remembered and used for every later page.

use std::fmt;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::{build_client, first_working, Collector, HttpSettings};
use crate::error::{Result, ScraperError};
use crate::record::RawRecord;

pub const API_PATHS: &[&str] = &[
    "/api/search",
    "/api/products/search",
    "/api/directory/search",
    "/api/products",
    "/Search/GetSearchResults",
    "/Search/GetProducts",
    "/api/directory/products",
];

const REFERENCE_KEYS: &[&str] = &["ahriReferenceNumber", "referenceNumber", "ahri_ref"];
const BRAND_KEYS: &[&str] = &["brand", "manufacturer", "outdoorBrand", "indoorBrand"];
const MODEL_KEYS: &[&str] = &["model", "modelNumber", "outdoorModel", "indoorModel"];

/// Items inspected when deciding whether a response holds real data.
const SNIFF_ITEMS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    Get,
    Post,
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMethod::Get => write!(f, "GET"),
            ProbeMethod::Post => write!(f, "POST"),
        }
    }
}

/// One endpoint/method pair to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Url,
    pub method: ProbeMethod,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Search parameters, sent as query string (GET) or JSON body (POST).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub program_id: u32,
    pub product_type_id: u32,
    pub page_size: u32,
    pub page_number: u32,
    pub search_type_id: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            program_id: 68,
            product_type_id: 1,
            page_size: 50,
            page_number: 1,
            search_type_id: 3,
        }
    }
}

pub struct ApiCollector {
    client: reqwest::Client,
    endpoints: Vec<Url>,
    params: SearchParams,
    working: Option<Endpoint>,
}

impl ApiCollector {
    pub fn new(base_url: &str, http: &HttpSettings) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ScraperError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let endpoints = API_PATHS
            .iter()
            .map(|path| {
                base.join(path)
                    .map_err(|e| ScraperError::InvalidUrl(format!("{}{}: {}", base, path, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            client: build_client(http, base.as_str())?,
            endpoints,
            params: SearchParams::default(),
            working: None,
        })
    }

    pub fn with_params(mut self, params: SearchParams) -> Self {
        self.params = params;
        self
    }

    /// Endpoint and method found to work, once probing has succeeded.
    pub fn working_endpoint(&self) -> Option<&Endpoint> {
        self.working.as_ref()
    }

    /// Every endpoint/method pair in probing order: each path with GET,
    /// then POST.
    pub fn candidates(&self) -> Vec<Endpoint> {
        self.endpoints
            .iter()
            .flat_map(|url| {
                [ProbeMethod::Get, ProbeMethod::Post].map(|method| Endpoint {
                    url: url.clone(),
                    method,
                })
            })
            .collect()
    }

    async fn probe(&self, endpoint: &Endpoint, page: u32) -> Result<Vec<RawRecord>> {
        let params = SearchParams {
            page_number: page,
            ..self.params.clone()
        };
        let url = endpoint.url.clone();
        let request = match endpoint.method {
            ProbeMethod::Get => self.client.get(url).query(&params),
            ProbeMethod::Post => self.client.post(url).json(&params),
        };

        let response = request.send().await?;
        let status = response.status();
        log::info!("{} -> {}", endpoint, status.as_u16());
        if status != StatusCode::OK {
            return Ok(Vec::new());
        }

        let body = response.text().await?;
        let data: Value = match serde_json::from_str(&body) {
            Ok(data) => data,
            Err(_) => {
                log::info!("❌ Non-JSON response from {}", endpoint.url);
                return Ok(Vec::new());
            }
        };
        if !looks_like_ahri_data(&data) {
            log::info!("❌ Invalid or empty data from {}", endpoint.url);
            return Ok(Vec::new());
        }

        Ok(records_from_json(&data))
    }
}

impl Collector for ApiCollector {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn fetch_batch(&mut self, category: &str, page: u32) -> Result<Vec<RawRecord>> {
        if let Some(endpoint) = &self.working {
            log::debug!("{} page {} via {}", category, page, endpoint);
            return self.probe(endpoint, page).await;
        }

        let candidates = self.candidates();
        log::info!("🔍 Probing {} API endpoint/method pairs", candidates.len());

        let this = &*self;
        let found = first_working(candidates, move |endpoint| async move {
            this.probe(&endpoint, page).await
        })
        .await;

        match found {
            Some((endpoint, records)) => {
                log::info!("✅ Found data from API: {}", endpoint);
                self.working = Some(endpoint);
                Ok(records)
            }
            None => {
                log::warn!("❌ No working API endpoints found");
                Ok(Vec::new())
            }
        }
    }
}

/// Item list of a response: a top-level array, or the first of
/// `results`, `data`, `products` present on an object.
pub fn json_items(data: &Value) -> Option<&Vec<Value>> {
    match data {
        Value::Array(items) => Some(items),
        Value::Object(map) => ["results", "data", "products"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(Value::as_array),
        _ => None,
    }
}

/// True when one of the first few items carries a reference key, or both a
/// brand key and a model key.
pub fn looks_like_ahri_data(data: &Value) -> bool {
    let Some(items) = json_items(data) else {
        return false;
    };
    items
        .iter()
        .take(SNIFF_ITEMS)
        .filter_map(Value::as_object)
        .any(|item| {
            let has = |keys: &[&str]| keys.iter().any(|k| item.contains_key(*k));
            has(REFERENCE_KEYS) || (has(BRAND_KEYS) && has(MODEL_KEYS))
        })
}

/// Flatten one JSON object into a record. Scalars become text; nulls,
/// arrays and nested objects are skipped. Non-objects yield `None`.
pub fn flatten_item(item: &Value) -> Option<RawRecord> {
    let map = item.as_object()?;
    let mut record = RawRecord::new();
    for (key, value) in map {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => continue,
        };
        record.insert(key.as_str(), text);
    }
    Some(record)
}

pub fn records_from_json(data: &Value) -> Vec<RawRecord> {
    let Some(items) = json_items(data) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let record = flatten_item(item);
            if record.is_none() {
                log::debug!("Skipping non-object item: {}", item);
            }
            record
        })
        .collect()
}
