use chrono::{DateTime, Utc};

use crate::models::Candle;

/// Sanity checks for provider OHLCV rows
///
/// Non-finite or non-positive prices and out-of-order timestamps are errors.
/// Inconsistent OHLC relationships (e.g. high below close) are only logged.
pub struct CandleValidator;

impl CandleValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a candle for correctness
    pub fn validate(&self, candle: &Candle) -> Result<(), String> {
        self.validate_ohlc(candle.open, candle.high, candle.low, candle.close)?;
        self.validate_volume(Some(candle.volume))
    }

    /// Validate a series: each candle, then strictly ascending timestamps
    pub fn validate_series(&self, candles: &[Candle]) -> Result<(), String> {
        for candle in candles {
            self.validate(candle)?;
        }
        let timestamps: Vec<_> = candles.iter().map(|c| c.timestamp).collect();
        self.validate_ordering(&timestamps)
    }

    /// Validate one row of prices
    pub fn validate_ohlc(&self, open: f64, high: f64, low: f64, close: f64) -> Result<(), String> {
        for (name, value) in [("open", open), ("high", high), ("low", low), ("close", close)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("Invalid {} price: {}", name, value));
            }
        }

        if high < low || high < open.max(close) || low > open.min(close) {
            tracing::warn!(
                "Inconsistent OHLC row: open={} high={} low={} close={}",
                open,
                high,
                low,
                close
            );
        }

        Ok(())
    }

    /// Volume may be missing or zero, never negative
    pub fn validate_volume(&self, volume: Option<f64>) -> Result<(), String> {
        match volume {
            Some(v) if !v.is_finite() || v < 0.0 => Err(format!("Invalid volume: {}", v)),
            _ => Ok(()),
        }
    }

    /// Timestamps must be strictly ascending
    pub fn validate_ordering(&self, timestamps: &[DateTime<Utc>]) -> Result<(), String> {
        for pair in timestamps.windows(2) {
            if pair[1] <= pair[0] {
                return Err(format!(
                    "Timestamps out of order: {} followed by {}",
                    pair[0], pair[1]
                ));
            }
        }
        Ok(())
    }
}

impl Default for CandleValidator {
    fn default() -> Self {
        Self::new()
    }
}
