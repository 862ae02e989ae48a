use crate::models::Candle;
use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MarketScenario {
    /// Close rises by exactly `step` every period
    Uptrend,
    /// Close falls by exactly `step` every period
    Downtrend,
    /// Close never moves
    Flat,
    /// Seeded random walk (±3% daily swings)
    Volatile,
}

/// Generates deterministic daily OHLCV series
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
    step: f64,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
            base_volume: 1_000_000.0,
            step: 1.0,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Generate `num_candles` daily candles ending at `end`
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `num_candles` - Number of daily candles to generate
    /// * `end` - Timestamp of the last candle
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_candles: usize,
        end: DateTime<Utc>,
    ) -> Vec<Candle> {
        let start = end - Duration::days(num_candles.saturating_sub(1) as i64);

        match scenario {
            MarketScenario::Uptrend => self.generate_linear(start, num_candles, self.step),
            MarketScenario::Downtrend => self.generate_linear(start, num_candles, -self.step),
            MarketScenario::Flat => self.generate_linear(start, num_candles, 0.0),
            MarketScenario::Volatile => self.generate_volatile(start, num_candles),
        }
    }

    /// Close moves by a fixed amount per day; high/low bracket open and close
    fn generate_linear(&mut self, start: DateTime<Utc>, num_candles: usize, step: f64) -> Vec<Candle> {
        (0..num_candles)
            .map(|i| {
                let close = self.base_price + step * i as f64;
                let open = close - step;
                Candle {
                    token: "SYN".to_string(),
                    timestamp: start + Duration::days(i as i64),
                    open,
                    high: open.max(close) + 0.5,
                    low: open.min(close) - 0.5,
                    close,
                    volume: self.base_volume + 1_000.0 * i as f64,
                }
            })
            .collect()
    }

    /// Random walk with ±3% daily moves and noisy volume
    fn generate_volatile(&mut self, start: DateTime<Utc>, num_candles: usize) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut current_price = self.base_price;

        for i in 0..num_candles {
            let open = current_price;
            let change = self.rng.gen_range(-0.03..0.03);
            let close = (open * (1.0 + change)).max(0.01);
            let wick = open.max(close) * self.rng.gen_range(0.0..0.01);

            candles.push(Candle {
                token: "SYN".to_string(),
                timestamp: start + Duration::days(i as i64),
                open,
                high: open.max(close) + wick,
                low: (open.min(close) - wick).max(0.005),
                close,
                volume: self.base_volume * self.rng.gen_range(0.5..1.5),
            });

            current_price = close;
        }

        candles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_uptrend_steps_by_one() {
        let candles = SyntheticDataGenerator::new(42).generate(MarketScenario::Uptrend, 90, end());

        assert_eq!(candles.len(), 90);
        assert_eq!(candles.last().unwrap().timestamp, end());
        for pair in candles.windows(2) {
            assert_eq!(pair[1].close - pair[0].close, 1.0);
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::days(1));
        }
    }

    #[test]
    fn test_volatile_is_reproducible() {
        let a = SyntheticDataGenerator::new(7).generate(MarketScenario::Volatile, 50, end());
        let b = SyntheticDataGenerator::new(7).generate(MarketScenario::Volatile, 50, end());

        assert_eq!(a, b);
        for candle in &a {
            assert!(candle.high >= candle.open.max(candle.close));
            assert!(candle.low <= candle.open.min(candle.close));
            assert!(candle.low > 0.0);
        }
    }

    #[test]
    fn test_custom_base_and_step() {
        let candles = SyntheticDataGenerator::new(1)
            .with_base_price(10.0)
            .with_step(2.0)
            .generate(MarketScenario::Downtrend, 3, end());

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![10.0, 8.0, 6.0]);
        assert_eq!(candles[0].open, 12.0);
        assert_eq!(candles[0].high, 12.5);
    }

    #[test]
    fn test_zero_candles() {
        let candles = SyntheticDataGenerator::new(1).generate(MarketScenario::Flat, 0, end());
        assert!(candles.is_empty());
    }
}
