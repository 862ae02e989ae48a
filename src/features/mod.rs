// Feature engineering for the next-day high model
// Turns raw OHLCV history into the fixed feature layout the regressor was trained on

pub mod fill;
pub mod frame;
pub mod rolling;
pub mod rsi;

pub use frame::{Column, OhlcvFrame};
pub use rsi::calculate_rsi;

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

use fill::fill_missing;
use rolling::{rolling_mean, rolling_std, shift};

pub const FEATURE_COUNT: usize = 18;

/// Feature names in the exact order the model expects them
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "marketcap",
    "sma_7",
    "sma_30",
    "volatility_7",
    "rsi_14",
    "high_lag_1",
    "vol_lag_1",
    "high_lag_2",
    "vol_lag_2",
    "high_lag_3",
    "vol_lag_3",
    "high_lag_7",
    "vol_lag_7",
];

/// Base columns every input frame must carry
pub const REQUIRED_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

const SMA_SHORT_WINDOW: usize = 7;
const SMA_LONG_WINDOW: usize = 30;
const VOLATILITY_WINDOW: usize = 7;
const RSI_PERIOD: usize = 14;
const LAGS: [usize; 4] = [1, 2, 3, 7];

/// Positions in `FEATURE_COLUMNS`
const HIGH_INDEX: usize = 1;
const VOLUME_INDEX: usize = 4;
const LAG_START: usize = 10;

#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("column `{column}` has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("feature table has no rows")]
    NoRows,

    #[error("malformed value {value} in column `{column}` at row {row}")]
    MalformedValue {
        column: String,
        row: usize,
        value: String,
    },
}

/// Stateless transform from OHLCV history to model features
///
/// Every input row yields one output row. Rolling statistics use partial
/// windows where noted, lags leave gaps at the start, and the combined table
/// is forward-filled then back-filled so short histories still produce
/// usable rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    pub fn transform(&self, frame: &OhlcvFrame) -> Result<FeatureTable, TransformError> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| frame.column(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(TransformError::MissingColumns(missing));
        }

        // Checked above
        let base = |name: &str| frame.column(name).unwrap_or_default().to_vec();
        let high = base("high");
        let close = base("close");
        let volume = base("volume");

        let marketcap = frame
            .column("marketcap")
            .map(<[Option<f64>]>::to_vec);

        let mut columns: Vec<Vec<Option<f64>>> = Vec::with_capacity(FEATURE_COUNT);
        columns.push(base("open"));
        columns.push(high.clone());
        columns.push(base("low"));
        columns.push(close.clone());
        columns.push(volume.clone());
        columns.push(marketcap.clone().unwrap_or_default());
        columns.push(rolling_mean(&close, SMA_SHORT_WINDOW, 1));
        columns.push(rolling_mean(&close, SMA_LONG_WINDOW, 1));
        columns.push(rolling_std(&close, VOLATILITY_WINDOW, 1));
        columns.push(calculate_rsi(&close, RSI_PERIOD));
        for lag in LAGS {
            columns.push(shift(&high, lag));
            columns.push(shift(&volume, lag));
        }

        for column in columns.iter_mut() {
            fill_missing(column);
        }

        // History no longer than the lag leaves nothing to fill from; such rows
        // take the first source value, as shorter lags do after back-fill.
        for (i, lag) in LAGS.iter().enumerate() {
            if frame.len() > *lag {
                continue;
            }
            for (offset, source) in [HIGH_INDEX, VOLUME_INDEX].into_iter().enumerate() {
                let first = columns[source].first().copied().flatten();
                let slot = LAG_START + 2 * i + offset;
                columns[slot] = vec![first; frame.len()];
            }
        }

        if marketcap.is_none() {
            columns[5] = vec![Some(0.0); frame.len()];
        }

        if frame.is_empty() {
            tracing::warn!("Feature transform produced no rows, using zero-filled fallback row");
            return Ok(FeatureTable::zeros());
        }

        Ok(FeatureTable {
            columns,
            len: frame.len(),
        })
    }
}

/// Feature rows in `FEATURE_COLUMNS` order, stored column-major
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<Vec<Option<f64>>>,
    len: usize,
}

impl FeatureTable {
    /// Single row with every feature set to 0.0
    pub fn zeros() -> Self {
        Self {
            columns: vec![vec![Some(0.0)]; FEATURE_COUNT],
            len: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column_names(&self) -> &'static [&'static str] {
        &FEATURE_COLUMNS
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        feature_index(name).map(|i| self.columns[i].as_slice())
    }

    /// Value at `row` for feature `name`; `None` when missing or out of range
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.column(name)?.get(row).copied().flatten()
    }

    pub fn row(&self, row: usize) -> Option<FeatureVector> {
        if row >= self.len {
            return None;
        }
        let mut values = [f64::NAN; FEATURE_COUNT];
        for (slot, column) in values.iter_mut().zip(&self.columns) {
            *slot = column[row].unwrap_or(f64::NAN);
        }
        Some(FeatureVector { values })
    }

    /// The most recent row ("today")
    pub fn last_row(&self) -> Option<FeatureVector> {
        self.len.checked_sub(1).and_then(|i| self.row(i))
    }

    pub fn rows(&self) -> impl Iterator<Item = FeatureVector> + '_ {
        (0..self.len).filter_map(|i| self.row(i))
    }

    pub fn has_missing(&self) -> bool {
        self.columns.iter().flatten().any(Option::is_none)
    }
}

/// One model input row; missing features are NaN
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|i| self.values[i])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_COLUMNS.iter().copied().zip(self.values.iter().copied())
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

fn feature_index(name: &str) -> Option<usize> {
    FEATURE_COLUMNS.iter().position(|c| *c == name)
}
