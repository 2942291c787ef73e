//! Paginated collection client.
//!
//! Epistemic foundation:
//! - K_i: One request per page, parameterized only by the page index
//! - B_i: API will respond within timeout (might fail) → transient
//! - B_i: Response will be a JSON body with a `data` list (might fail) → structural
//! - K_i: No retry here; the fetcher owns retry policy

use crate::models::{Config, FetchError, PageIndex, RawRecord, Result, StructuralError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Longest error body kept in an `HttpStatus` message.
const MAX_ERROR_BODY: usize = 200;

/// A source of numbered pages of records.
///
/// Implementations fail with a transient error (network, timeout, non-success
/// status) or a structural error (unparseable body). Nothing else.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page.
    async fn fetch_page(&self, page: PageIndex) -> Result<Vec<RawRecord>>;
}

/// Expected response envelope.
#[derive(Debug, Deserialize)]
struct PageBody {
    data: Option<Vec<RawRecord>>,
}

/// Parse a page body into its record list.
pub fn parse_page(page: PageIndex, body: &str) -> Result<Vec<RawRecord>> {
    let parsed: PageBody = serde_json::from_str(body).map_err(|e| StructuralError::InvalidBody {
        page,
        message: e.to_string(),
    })?;
    parsed
        .data
        .ok_or_else(|| StructuralError::MissingData { page }.into())
}

/// HTTP page source backed by reqwest.
pub struct HttpPageSource {
    client: reqwest::Client,
    /// Collection URL
    base_url: String,
    /// Query parameter carrying the page index
    page_param: String,
    /// Fixed query pairs sent with every request
    query: Vec<(String, String)>,
    /// Request timeout
    timeout: Duration,
}

impl HttpPageSource {
    /// Create a source from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.source.timeout_secs);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(config.source.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(FetchError::Network)?;

        Ok(Self {
            client,
            base_url: config.source.base_url.trim().to_string(),
            page_param: config.source.page_param.clone(),
            query: config.resolved_query(),
            timeout,
        })
    }

    /// Query pairs for one page, page index first.
    fn query_for(&self, page: PageIndex) -> Vec<(String, String)> {
        let mut query = Vec::with_capacity(self.query.len() + 1);
        query.push((self.page_param.clone(), page.to_string()));
        query.extend(self.query.iter().cloned());
        query
    }

    fn transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(e)
        }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, page: PageIndex) -> Result<Vec<RawRecord>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query_for(page))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !message.is_char_boundary(end) {
                    end -= 1;
                }
                message.truncate(end);
            }
            return Err(FetchError::HttpStatus {
                page,
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        let records = parse_page(page, &body)?;
        debug!(page, records = records.len(), "Fetched page");
        Ok(records)
    }
}
