use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{CandleValidator, ProviderError};
use crate::config::KrakenConfig;
use crate::models::Candle;

const PROVIDER: &str = "Kraken";

/// Result key Kraken uses for the pagination cursor, next to the OHLC array
const LAST_KEY: &str = "last";

/// Client for Kraken's public OHLC endpoint (dashboard live feed)
#[derive(Clone)]
pub struct KrakenClient {
    client: Client,
    config: KrakenConfig,
}

#[derive(Debug, Deserialize)]
struct KrakenResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Map<String, Value>,
}

impl KrakenClient {
    pub fn new(config: KrakenConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Fetch OHLCV candles for a pair such as `SOLUSD`
    ///
    /// Endpoint: GET /0/public/OHLC?pair={pair}&interval={minutes}
    pub async fn get_ohlc(&self, pair: &str) -> Result<Vec<Candle>, ProviderError> {
        let url = format!(
            "{}/0/public/OHLC?pair={}&interval={}",
            self.config.base_url.trim_end_matches('/'),
            pair,
            self.config.interval_minutes
        );

        tracing::debug!("Fetching Kraken OHLC for {}", pair);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let body: KrakenResponse = response.json().await?;
        if !body.error.is_empty() {
            return Err(ProviderError::Api {
                provider: PROVIDER,
                message: body.error.join(", "),
            });
        }

        let candles = parse_ohlc(pair, &body.result)?;
        tracing::debug!("Fetched {} Kraken candles for {}", candles.len(), pair);
        Ok(candles)
    }
}

/// Extract candles from a Kraken `result` object
///
/// The pair key is provider-normalised (`SOLUSD`, `XXBTZUSD`, ...) and does not
/// always match the request, so the OHLC array is taken from the first key
/// that is not the `last` cursor.
fn parse_ohlc(pair: &str, result: &Map<String, Value>) -> Result<Vec<Candle>, ProviderError> {
    let malformed = |message: String| ProviderError::Malformed {
        provider: PROVIDER,
        message,
    };

    let rows = result
        .iter()
        .find(|(key, _)| key.as_str() != LAST_KEY)
        .and_then(|(_, value)| value.as_array())
        .ok_or_else(|| malformed("no OHLC array in result".to_string()))?;

    // Row layout: [time, open, high, low, close, vwap, volume, count]
    let mut candles = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let fields = row
            .as_array()
            .filter(|f| f.len() >= 7)
            .ok_or_else(|| malformed(format!("row {} is not an OHLC array", i)))?;

        let number = |idx: usize| -> Result<f64, ProviderError> {
            let value = match &fields[idx] {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            value.ok_or_else(|| malformed(format!("row {} field {} is not numeric", i, idx)))
        };

        let seconds = number(0)? as i64;
        let timestamp = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| malformed(format!("row {} has invalid time {}", i, seconds)))?;

        candles.push(Candle {
            token: pair.to_string(),
            timestamp,
            open: number(1)?,
            high: number(2)?,
            low: number(3)?,
            close: number(4)?,
            volume: number(6)?,
        });
    }

    CandleValidator::new()
        .validate_series(&candles)
        .map_err(malformed)?;

    Ok(candles)
}
