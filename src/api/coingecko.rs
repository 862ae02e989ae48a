use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;
use std::sync::Arc;

use super::{CandleValidator, HistoryProvider, ProviderError};
use crate::config::CoinGeckoConfig;
use crate::features::OhlcvFrame;
use crate::models::DataSource;

const PROVIDER: &str = "CoinGecko";

// Type alias for the rate limiter to simplify signatures
type CoinGeckoRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// CoinGecko API client with rate limiting and retries
///
/// This struct is cloneable to allow sharing across async tasks.
/// All clones share the same rate limiter.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    config: CoinGeckoConfig,
    rate_limiter: Arc<CoinGeckoRateLimiter>,
}

/// Response from /market_chart endpoint
#[derive(Debug, Deserialize)]
pub struct MarketChartData {
    pub prices: Vec<[f64; 2]>,        // [timestamp_ms, price]
    pub total_volumes: Vec<[f64; 2]>, // [timestamp_ms, volume_24h]
}

/// One row of the /ohlc endpoint: [timestamp_ms, open, high, low, close]
type OhlcRow = [f64; 5];

/// Longest wait between retries
const MAX_BACKOFF_SECS: u64 = 60;

/// Exponential backoff for a 1-based attempt, capped at `MAX_BACKOFF_SECS`
fn retry_backoff_secs(attempt: u32) -> u64 {
    2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS)
}

impl CoinGeckoClient {
    pub fn new(config: CoinGeckoConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        let rpm = NonZeroU32::new(config.rate_limit_rpm).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Make a rate-limited API request with retry logic
    async fn make_request(&self, url: &str) -> Result<reqwest::Response, ProviderError> {
        let max_retries = self.config.max_retries.max(1);

        for attempt in 1..=max_retries {
            // Wait for rate limiter
            self.rate_limiter.until_ready().await;

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    // Rate limit or server error: back off and retry
                    if (status.as_u16() == 429 || status.is_server_error()) && attempt < max_retries {
                        let backoff_secs = retry_backoff_secs(attempt);
                        tracing::warn!(
                            "CoinGecko returned {}, retrying in {}s (attempt {}/{})",
                            status,
                            backoff_secs,
                            attempt,
                            max_retries
                        );
                        tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                        continue;
                    }

                    // Other errors (4xx) or retries exhausted
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(ProviderError::Status {
                        provider: PROVIDER,
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) if attempt < max_retries => {
                    let backoff_secs = retry_backoff_secs(attempt);
                    tracing::warn!(
                        "Network error: {}, retrying in {}s (attempt {}/{})",
                        e,
                        backoff_secs,
                        attempt,
                        max_retries
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                }
                Err(e) => return Err(ProviderError::Http(e)),
            }
        }

        Err(ProviderError::Api {
            provider: PROVIDER,
            message: format!("Failed after {} retries", max_retries),
        })
    }

    fn url(&self, coin_id: &str, endpoint: &str, days: u32) -> String {
        let mut url = format!(
            "{}/coins/{}/{}?vs_currency={}&days={}",
            self.config.base_url.trim_end_matches('/'),
            coin_id,
            endpoint,
            self.config.vs_currency,
            days
        );
        if let Some(key) = &self.config.api_key {
            url.push_str("&x_cg_demo_api_key=");
            url.push_str(key);
        }
        url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, what: &str) -> Result<T, ProviderError> {
        let response = self.make_request(url).await?;
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| ProviderError::Malformed {
            provider: PROVIDER,
            message: format!("failed to parse {}: {}", what, e),
        })
    }

    /// Fetch OHLC candles: [timestamp_ms, open, high, low, close]
    pub async fn get_ohlc(&self, coin_id: &str, days: u32) -> Result<Vec<OhlcRow>, ProviderError> {
        tracing::debug!("Fetching OHLC for {} ({}d)", coin_id, days);

        let rows: Vec<OhlcRow> = self.get_json(&self.url(coin_id, "ohlc", days), "OHLC").await?;

        tracing::debug!("Fetched {} OHLC rows for {}", rows.len(), coin_id);
        Ok(rows)
    }

    /// Fetch market chart data (price and volume time series)
    pub async fn get_market_chart(&self, coin_id: &str, days: u32) -> Result<MarketChartData, ProviderError> {
        tracing::debug!("Fetching market chart for {} ({}d)", coin_id, days);

        let data: MarketChartData = self
            .get_json(&self.url(coin_id, "market_chart", days), "market chart")
            .await?;

        tracing::debug!("Fetched {} volume points for {}", data.total_volumes.len(), coin_id);
        Ok(data)
    }
}

#[async_trait]
impl HistoryProvider for CoinGeckoClient {
    async fn fetch_history(&self, coin_id: &str, days: u32) -> Result<OhlcvFrame, ProviderError> {
        let ohlc = self.get_ohlc(coin_id, days).await?;
        let chart = self.get_market_chart(coin_id, days).await?;

        merge_history(ohlc, &chart.total_volumes)
    }

    fn source(&self) -> DataSource {
        DataSource::CoinGecko
    }
}

/// Sort and de-duplicate OHLC rows by timestamp, then left-join volumes on
/// the exact timestamp. Rows without a matching volume get a missing cell.
pub fn merge_history(ohlc: Vec<OhlcRow>, volumes: &[[f64; 2]]) -> Result<OhlcvFrame, ProviderError> {
    let malformed = |message: String| ProviderError::Malformed {
        provider: PROVIDER,
        message,
    };

    // Later duplicates replace earlier ones
    let rows: BTreeMap<i64, OhlcRow> = ohlc.into_iter().map(|row| (row[0] as i64, row)).collect();
    let volume_by_ts: HashMap<i64, f64> = volumes.iter().map(|[ts, v]| (*ts as i64, *v)).collect();

    let validator = CandleValidator::new();
    let mut dates: Vec<DateTime<Utc>> = Vec::with_capacity(rows.len());
    let mut columns: [Vec<Option<f64>>; 5] = Default::default();

    for (ts, [_, open, high, low, close]) in &rows {
        validator
            .validate_ohlc(*open, *high, *low, *close)
            .map_err(|e| malformed(format!("{} at {}", e, ts)))?;

        let volume = volume_by_ts.get(ts).copied();
        validator.validate_volume(volume).map_err(|e| malformed(format!("{} at {}", e, ts)))?;

        let date = Utc
            .timestamp_millis_opt(*ts)
            .single()
            .ok_or_else(|| malformed(format!("invalid timestamp {}", ts)))?;

        dates.push(date);
        for (column, value) in columns.iter_mut().zip([*open, *high, *low, *close]) {
            column.push(Some(value));
        }
        columns[4].push(volume);
    }

    let matched = columns[4].iter().filter(|v| v.is_some()).count();
    if matched < rows.len() {
        tracing::debug!("{} of {} rows have no exact-timestamp volume", rows.len() - matched, rows.len());
    }

    let [open, high, low, close, volume] = columns;
    OhlcvFrame::new(dates.len())
        .with_dates(dates)
        .and_then(|f| f.with_column("open", open))
        .and_then(|f| f.with_column("high", high))
        .and_then(|f| f.with_column("low", low))
        .and_then(|f| f.with_column("close", close))
        .and_then(|f| f.with_column("volume", volume))
        .map_err(|e| malformed(e.to_string()))
}
