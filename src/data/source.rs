use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tracing::warn;

use super::types::SaleRecord;

#[derive(Debug, Clone)]
pub struct SalesApiConfig {
    pub base_url: String,
    pub http_timeout_ms: u64,
    pub max_retries: u32,
}

impl SalesApiConfig {
    const BASE_URL_VARS: [&'static str; 2] = ["ESTATE_DECK_API_URL", "SALES_API_URL"];
    const TIMEOUT_VARS: [&'static str; 2] =
        ["ESTATE_DECK_HTTP_TIMEOUT_MS", "SALES_API_HTTP_TIMEOUT_MS"];
    const RETRY_VARS: [&'static str; 2] = ["ESTATE_DECK_FETCH_RETRIES", "SALES_API_FETCH_RETRIES"];

    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = Self::read_env(&Self::BASE_URL_VARS)
            .unwrap_or_else(|| "http://127.0.0.1:3000".to_string());
        let http_timeout_ms = Self::read_env(&Self::TIMEOUT_VARS)
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(10_000);
        let max_retries = Self::read_env(&Self::RETRY_VARS)
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);

        Ok(Self {
            base_url,
            http_timeout_ms,
            max_retries,
        })
    }

    fn read_env(candidates: &[&'static str]) -> Option<String> {
        candidates.iter().find_map(|key| env::var(key).ok())
    }
}

/// Client for the sales API's `/api/sales` endpoint. The endpoint returns a
/// JSON array of sale records; rows with unusable numerics survive decoding
/// and are excluded later by the aggregation guard.
pub struct SalesApiClient {
    config: SalesApiConfig,
    http: reqwest::Client,
}

impl SalesApiClient {
    pub fn new(config: SalesApiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()
            .context("Failed to build HTTP client for the sales API")?;
        Ok(Self { config, http })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Fetch the dataset with capped exponential backoff (1s, 2s, 4s). A
    /// failure after the final retry is terminal for this call only.
    pub async fn fetch_records(&self) -> anyhow::Result<Vec<SaleRecord>> {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            match self.fetch_once().await {
                Ok(records) => return Ok(records),
                Err(err) => {
                    warn!(attempt, ?err, "Sales API fetch failed");
                    last_error = Some(err);
                    if attempt < self.config.max_retries - 1 {
                        let delay = Duration::from_secs(1 << attempt);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("sales API fetch never attempted")))
    }

    async fn fetch_once(&self) -> anyhow::Result<Vec<SaleRecord>> {
        let url = format!("{}/api/sales", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()
            .context("Sales API returned an error status")?;

        let records = response
            .json::<Vec<SaleRecord>>()
            .await
            .context("Sales API payload was not a JSON array of sale records")?;
        Ok(records)
    }
}

pub fn parse_records(json: &str) -> anyhow::Result<Vec<SaleRecord>> {
    serde_json::from_str(json).context("Expected a JSON array of sale records")
}

pub fn load_records_file(path: impl AsRef<Path>) -> anyhow::Result<Vec<SaleRecord>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset file {}", path.display()))?;
    parse_records(&raw)
}
