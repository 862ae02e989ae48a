pub mod coingecko;
pub mod kraken;
pub mod validator;

pub use coingecko::{CoinGeckoClient, MarketChartData};
pub use kraken::KrakenClient;
pub use validator::CandleValidator;

use async_trait::async_trait;
use thiserror::Error;

use crate::features::OhlcvFrame;
use crate::models::DataSource;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} API error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    #[error("malformed {provider} response: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
}

/// Source of daily OHLCV history for the prediction pipeline
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Fetch at least `days` of history for `coin_id`, ascending by date
    async fn fetch_history(&self, coin_id: &str, days: u32) -> Result<OhlcvFrame, ProviderError>;

    fn source(&self) -> DataSource;
}
