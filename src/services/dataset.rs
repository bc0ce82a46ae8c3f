//! Client for the public shark attack dataset.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("dataset returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Fetches one bounded page of raw dataset elements. No cursor handling:
/// a full crawl of the dataset is out of scope.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn fetch_page(&self) -> Result<Vec<Value>, DatasetError>;
}

/// The page arrives as `{"results": [...]}` on the current API and as
/// `{"records": [...]}` on the legacy one.
#[derive(Deserialize)]
struct RawPage {
    results: Option<Vec<Value>>,
    records: Option<Vec<Value>>,
}

#[derive(Debug, Clone)]
pub struct OpenDataSoftClient {
    client: Client,
    url: String,
    page_size: u32,
}

impl OpenDataSoftClient {
    pub fn new(url: String, page_size: u32) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url,
            page_size,
        }
    }
}

#[async_trait]
impl DatasetSource for OpenDataSoftClient {
    async fn fetch_page(&self) -> Result<Vec<Value>, DatasetError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("limit", self.page_size.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DatasetError::Status(response.status()));
        }

        let page: RawPage = response.json().await?;
        Ok(page.results.or(page.records).unwrap_or_default())
    }
}
