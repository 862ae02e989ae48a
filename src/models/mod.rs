use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV period for a token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub token: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Next-period high prediction served by `/predict/{symbol}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionResult {
    pub token: String,
    /// Date being predicted: last history date + 1 day, serialized as `YYYY-MM-DD`
    pub prediction_date: NaiveDate,
    pub predicted_high: f64,
}

/// Where a history frame came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataSource {
    CoinGecko,
    Synthetic,
}
