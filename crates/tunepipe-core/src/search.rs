//! Track lookup against the iTunes Search API.
//!
//! The downloader wants a catalog track URL, so each `Artist - Title` term
//! is resolved to the first matching song's `trackViewUrl` before the tool
//! is invoked.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Public search endpoint of the iTunes / Apple Music catalog.
const SEARCH_ENDPOINT: &str = "https://itunes.apple.com/search";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("bad search URL: {0}")]
    Url(#[from] url::ParseError),
}

/// The slice of the search response we consume.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "resultCount", default)]
    result_count: u32,
    #[serde(default)]
    results: Vec<TrackHit>,
}

#[derive(Debug, Deserialize)]
struct TrackHit {
    #[serde(rename = "trackViewUrl")]
    track_view_url: Option<String>,
}

/// Client resolving `Artist - Title` terms to catalog track URLs.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    endpoint: String,
}

impl CatalogClient {
    /// Client against the public endpoint with the standard request timeout.
    pub fn new() -> Result<Self, SearchError> {
        Self::with_endpoint(SEARCH_ENDPOINT)
    }

    /// Same client against a custom endpoint (tests point this at a local
    /// server).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// Builds the search URL for one term: songs only, first hit only.
    pub fn search_url(&self, term: &str) -> Result<Url, SearchError> {
        Ok(Url::parse_with_params(
            &self.endpoint,
            &[
                ("term", term),
                ("entity", "song"),
                ("media", "music"),
                ("limit", "1"),
            ],
        )?)
    }

    /// Resolves a search term to the first matching track's catalog URL.
    /// `Ok(None)` means the catalog has no match for the term.
    pub async fn track_url(&self, term: &str) -> Result<Option<String>, SearchError> {
        let url = self.search_url(term)?;
        let response = self.http.get(url).send().await?.error_for_status()?;
        let body: SearchResponse = response.json().await?;
        if body.result_count == 0 {
            return Ok(None);
        }
        Ok(body.results.into_iter().find_map(|hit| hit.track_view_url))
    }
}
