// Terminal dashboard: live market data next to the model's prediction
pub mod client;

pub use client::PredictionClient;

use std::fmt;
use thiserror::Error;

use crate::api::{KrakenClient, ProviderError};
use crate::config::DashboardConfig;
use crate::features::rolling::rolling_mean;
use crate::models::{Candle, PredictionResult};

/// Trailing window of the trend overlay
pub const TREND_WINDOW: usize = 30;

/// Volume axis is stretched so the tallest bar fills a quarter of the panel
const VOLUME_AXIS_FACTOR: f64 = 4.0;

/// Width of the volume panel in characters
const VOLUME_PANEL_WIDTH: usize = 40;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Connection failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("Market data unavailable: {0}")]
    Market(#[from] ProviderError),
}

/// Headline numbers for the most recent period
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSummary {
    pub price: f64,
    /// Change vs the previous close; `None` with a single period
    pub change: Option<f64>,
    pub pct_change: Option<f64>,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

impl MarketSummary {
    pub fn from_candles(candles: &[Candle]) -> Option<Self> {
        let latest = candles.last()?;
        let prev_close = candles
            .len()
            .checked_sub(2)
            .map(|i| candles[i].close);

        let change = prev_close.map(|prev| latest.close - prev);
        let pct_change = match (change, prev_close) {
            (Some(change), Some(prev)) if prev != 0.0 => Some(change / prev * 100.0),
            _ => None,
        };

        Some(Self {
            price: latest.close,
            change,
            pct_change,
            high: latest.high,
            low: latest.low,
            volume: latest.volume,
        })
    }
}

/// Trailing mean of closes; missing until a full window is available
pub fn trend_overlay(candles: &[Candle]) -> Vec<Option<f64>> {
    let closes: Vec<Option<f64>> = candles.iter().map(|c| Some(c.close)).collect();
    rolling_mean(&closes, TREND_WINDOW, TREND_WINDOW)
}

/// Upper bound of the volume axis
pub fn volume_axis_max(candles: &[Candle]) -> f64 {
    let max = candles.iter().map(|c| c.volume).fold(0.0_f64, f64::max);
    max * VOLUME_AXIS_FACTOR
}

/// Predicted high compared with today's high
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outlook {
    /// Predicted high is above today's high by this much
    Bullish(f64),
    /// Predicted high is at or below today's high by this much
    Bearish(f64),
}

impl Outlook {
    pub fn compare(predicted_high: f64, today_high: f64) -> Self {
        let diff = predicted_high - today_high;
        if diff > 0.0 {
            Outlook::Bullish(diff)
        } else {
            Outlook::Bearish(diff.abs())
        }
    }
}

impl fmt::Display for Outlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outlook::Bullish(diff) => write!(
                f,
                "🚀 Bullish: predicted to be ${:.2} higher than today's high.",
                diff
            ),
            Outlook::Bearish(diff) => write!(
                f,
                "🔻 Bearish: predicted to be ${:.2} lower than today's high.",
                diff
            ),
        }
    }
}

/// Everything the dashboard shows, gathered up front and rendered as text
///
/// Failures are collected as warnings; the rest of the view still renders.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pair: String,
    candles: Vec<Candle>,
    prediction: Option<PredictionResult>,
    prediction_requested: bool,
    warnings: Vec<String>,
    chart_rows: usize,
}

impl DashboardView {
    pub fn new(pair: &str, chart_rows: usize) -> Self {
        Self {
            pair: pair.to_string(),
            candles: Vec::new(),
            prediction: None,
            prediction_requested: false,
            warnings: Vec::new(),
            chart_rows,
        }
    }

    pub fn with_candles(mut self, candles: Vec<Candle>) -> Self {
        self.candles = candles;
        self
    }

    pub fn with_prediction(mut self, prediction: PredictionResult) -> Self {
        self.prediction = Some(prediction);
        self.prediction_requested = true;
        self
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    /// Fetch market data and, when a client is given, the prediction
    pub async fn load(
        kraken: &KrakenClient,
        predictor: Option<&PredictionClient>,
        config: &DashboardConfig,
    ) -> Self {
        let mut view = Self::new(&config.pair, config.chart_rows);

        match kraken.get_ohlc(&config.pair).await {
            Ok(candles) if candles.is_empty() => {
                view.warn(format!("Unable to load market data: no candles for {}", config.pair));
            }
            Ok(candles) => view.candles = candles,
            Err(e) => view.warn(DashboardError::from(e).to_string()),
        }

        if let Some(client) = predictor {
            view.prediction_requested = true;
            match client.predict(&config.symbol).await {
                Ok(prediction) => view.prediction = Some(prediction),
                Err(e) => view.warn(format!("Prediction failed: {}", e)),
            }
        }

        view
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn prediction(&self) -> Option<&PredictionResult> {
        self.prediction.as_ref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn summary(&self) -> Option<MarketSummary> {
        MarketSummary::from_candles(&self.candles)
    }

    /// Needs both a prediction and market data
    pub fn outlook(&self) -> Option<Outlook> {
        let prediction = self.prediction.as_ref()?;
        let today = self.candles.last()?;
        Some(Outlook::compare(prediction.predicted_high, today.high))
    }

    fn write_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📊 MARKET SUMMARY")?;
        let Some(summary) = self.summary() else {
            return writeln!(f, "  ⚠️ Unable to load market data. Please try again later.");
        };

        match summary.pct_change {
            Some(pct) => writeln!(f, "  Current Price:   ${:.2} ({:+.2}%)", summary.price, pct)?,
            None => writeln!(f, "  Current Price:   ${:.2}", summary.price)?,
        }
        if let Some(change) = summary.change {
            writeln!(f, "  Change:          {:+.2}", change)?;
        }
        writeln!(f, "  24h High:        ${:.2}", summary.high)?;
        writeln!(f, "  24h Low:         ${:.2}", summary.low)?;
        writeln!(f, "  Volume (24h):    {}", group_thousands(summary.volume))
    }

    fn write_chart(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.candles.is_empty() {
            return Ok(());
        }

        let trend = trend_overlay(&self.candles);
        let axis_max = volume_axis_max(&self.candles);
        let start = self.candles.len().saturating_sub(self.chart_rows);

        writeln!(
            f,
            "\n📈 PRICE HISTORY & TREND (last {} of {} periods)",
            self.candles.len() - start,
            self.candles.len()
        )?;
        writeln!(
            f,
            "  {:<10} {:>10} {:>10} {:>10} {:>10} {:>10}  Volume",
            "Date", "Open", "High", "Low", "Close", "SMA(30D)"
        )?;
        writeln!(f, "  {}", "─".repeat(66 + VOLUME_PANEL_WIDTH / 4))?;

        for (candle, sma) in self.candles.iter().zip(&trend).skip(start) {
            let sma = sma.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
            let bar_len = if axis_max > 0.0 {
                (candle.volume / axis_max * VOLUME_PANEL_WIDTH as f64).round() as usize
            } else {
                0
            };
            writeln!(
                f,
                "  {:<10} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10}  {}",
                candle.timestamp.format("%Y-%m-%d"),
                candle.open,
                candle.high,
                candle.low,
                candle.close,
                sma,
                "▮".repeat(bar_len)
            )?;
        }
        Ok(())
    }

    fn write_prediction(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n🤖 AI PRICE PREDICTION")?;
        writeln!(f, "  Model: XGBoost Regressor | Target: next day high | Features: RSI, SMA, volatility, lags")?;

        match &self.prediction {
            Some(prediction) => {
                writeln!(f, "  Prediction for {}", prediction.prediction_date)?;
                writeln!(f, "  Predicted High:  ${:.2}", prediction.predicted_high)?;
                if let Some(outlook) = self.outlook() {
                    writeln!(f, "  {}", outlook)?;
                }
                Ok(())
            }
            None if self.prediction_requested => writeln!(f, "  No prediction available."),
            None => writeln!(f, "  Run with --predict to request tomorrow's high."),
        }
    }
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "╔═══════════════════════════════════════════════════════╗")?;
        writeln!(f, "║  {:<53}║", format!("{} MARKET DASHBOARD", self.pair))?;
        writeln!(f, "╚═══════════════════════════════════════════════════════╝\n")?;

        self.write_summary(f)?;
        self.write_chart(f)?;
        self.write_prediction(f)?;

        if !self.warnings.is_empty() {
            writeln!(f)?;
            for warning in &self.warnings {
                writeln!(f, "⚠️ {}", warning)?;
            }
        }
        Ok(())
    }
}

/// 1234567.8 -> "1,234,568"
fn group_thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, ch) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}
