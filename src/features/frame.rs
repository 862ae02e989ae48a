use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use super::TransformError;
use crate::models::Candle;

/// Keys treated as the row date when reading loosely-typed records
const DATE_KEYS: &[&str] = &["date", "timestamp", "time"];

/// Epoch values above this are taken as milliseconds
const MILLIS_THRESHOLD: f64 = 1e11;

/// A named numeric column; `None` marks a missing cell
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Column table of OHLCV history in ascending date order
///
/// Column names keep the caller's spelling; lookups are case-insensitive.
/// Dates are optional, but when present there is one per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OhlcvFrame {
    dates: Vec<DateTime<Utc>>,
    columns: Vec<Column>,
    len: usize,
}

impl OhlcvFrame {
    /// Create a frame with `len` rows and no columns
    pub fn new(len: usize) -> Self {
        Self {
            dates: Vec::new(),
            columns: Vec::new(),
            len,
        }
    }

    /// Build the standard five-column frame from candles
    pub fn from_candles(candles: &[Candle]) -> Self {
        let pick = |f: fn(&Candle) -> f64| -> Vec<Option<f64>> {
            candles.iter().map(|c| Some(f(c))).collect()
        };

        Self {
            dates: candles.iter().map(|c| c.timestamp).collect(),
            columns: vec![
                Column { name: "open".to_string(), values: pick(|c| c.open) },
                Column { name: "high".to_string(), values: pick(|c| c.high) },
                Column { name: "low".to_string(), values: pick(|c| c.low) },
                Column { name: "close".to_string(), values: pick(|c| c.close) },
                Column { name: "volume".to_string(), values: pick(|c| c.volume) },
            ],
            len: candles.len(),
        }
    }

    /// Build a frame from JSON-style records (one object per row)
    ///
    /// Numbers and numeric strings are accepted; `null` and empty strings are
    /// missing cells. A `date`/`timestamp`/`time` key supplies row dates,
    /// either as epoch seconds/milliseconds or as an ISO date string.
    pub fn from_records(records: &[Map<String, Value>]) -> Result<Self, TransformError> {
        let mut names: Vec<String> = Vec::new();
        let mut date_key: Option<String> = None;

        for record in records {
            for key in record.keys() {
                if DATE_KEYS.contains(&key.to_lowercase().as_str()) {
                    date_key.get_or_insert_with(|| key.clone());
                } else if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }

        let mut frame = Self::new(records.len());

        if let Some(key) = date_key {
            let dates = records
                .iter()
                .enumerate()
                .map(|(row, record)| parse_date(&key, row, record.get(&key)))
                .collect::<Result<Vec<_>, _>>()?;
            frame = frame.with_dates(dates)?;
        }

        for name in names {
            let values = records
                .iter()
                .enumerate()
                .map(|(row, record)| parse_number(&name, row, record.get(&name)))
                .collect::<Result<Vec<_>, _>>()?;
            frame = frame.with_column(name, values)?;
        }

        Ok(frame)
    }

    /// Append a column; its length must match the frame
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, TransformError> {
        let name = name.into();
        if values.len() != self.len {
            return Err(TransformError::LengthMismatch {
                column: name,
                expected: self.len,
                found: values.len(),
            });
        }
        self.columns.push(Column { name, values });
        Ok(self)
    }

    /// Append a fully-populated column
    pub fn with_values(self, name: impl Into<String>, values: &[f64]) -> Result<Self, TransformError> {
        self.with_column(name, values.iter().copied().map(Some).collect())
    }

    /// Attach one date per row
    pub fn with_dates(mut self, dates: Vec<DateTime<Utc>>) -> Result<Self, TransformError> {
        if dates.len() != self.len {
            return Err(TransformError::LengthMismatch {
                column: "date".to_string(),
                expected: self.len,
                found: dates.len(),
            });
        }
        self.dates = dates;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dates(&self) -> &[DateTime<Utc>] {
        &self.dates
    }

    /// Date of the most recent row, if the frame carries dates
    pub fn last_date(&self) -> Option<DateTime<Utc>> {
        self.dates.last().copied()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Case-insensitive column lookup; the first match wins
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        let wanted = name.to_lowercase();
        self.columns
            .iter()
            .find(|c| c.name.to_lowercase() == wanted)
            .map(|c| c.values.as_slice())
    }
}

fn parse_number(column: &str, row: usize, value: Option<&Value>) -> Result<Option<f64>, TransformError> {
    let malformed = |v: &Value| TransformError::MalformedValue {
        column: column.to_string(),
        row,
        value: v.to_string(),
    };

    let number = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(v @ Value::Number(n)) => n.as_f64().ok_or_else(|| malformed(v))?,
        Some(v @ Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.parse::<f64>().map_err(|_| malformed(v))?
        }
        Some(v) => return Err(malformed(v)),
    };

    Ok(number.is_finite().then_some(number))
}

fn parse_date(column: &str, row: usize, value: Option<&Value>) -> Result<DateTime<Utc>, TransformError> {
    let malformed = || TransformError::MalformedValue {
        column: column.to_string(),
        row,
        value: value.map(Value::to_string).unwrap_or_else(|| "null".to_string()),
    };

    match value {
        Some(Value::Number(n)) => {
            let epoch = n.as_f64().ok_or_else(malformed)?;
            let millis = if epoch.abs() > MILLIS_THRESHOLD {
                epoch
            } else {
                epoch * 1000.0
            };
            Utc.timestamp_millis_opt(millis as i64)
                .single()
                .ok_or_else(malformed)
        }
        Some(Value::String(s)) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Ok(dt.and_utc());
            }
            // ISO 8601 without an offset, optionally with fractional seconds
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Ok(dt.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
                .ok_or_else(malformed)
        }
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<Map<String, Value>> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let frame = OhlcvFrame::new(2)
            .with_values("Close", &[1.0, 2.0])
            .unwrap();

        assert_eq!(frame.column("close"), Some(&[Some(1.0), Some(2.0)][..]));
        assert_eq!(frame.column("CLOSE"), Some(&[Some(1.0), Some(2.0)][..]));
        assert!(frame.column("open").is_none());
    }

    #[test]
    fn test_with_column_rejects_length_mismatch() {
        let result = OhlcvFrame::new(3).with_values("open", &[1.0, 2.0]);

        assert_eq!(
            result.unwrap_err(),
            TransformError::LengthMismatch {
                column: "open".to_string(),
                expected: 3,
                found: 2,
            }
        );
    }

    #[test]
    fn test_from_candles() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candle = Candle {
            token: "SOL".to_string(),
            timestamp: ts,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 100.0,
        };

        let frame = OhlcvFrame::from_candles(&[candle]);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.last_date(), Some(ts));
        assert_eq!(
            frame.column_names().collect::<Vec<_>>(),
            vec!["open", "high", "low", "close", "volume"]
        );
        assert_eq!(frame.column("low"), Some(&[Some(0.5)][..]));
    }

    #[test]
    fn test_from_records_mixed_types() {
        let frame = OhlcvFrame::from_records(&records(json!([
            {"Date": "2024-01-01", "Open": "1.5", "High": 2, "volume": null},
            {"Date": 1704153600000_i64, "Open": 1.75, "High": "", "volume": 10}
        ])))
        .unwrap();

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column("open"), Some(&[Some(1.5), Some(1.75)][..]));
        assert_eq!(frame.column("high"), Some(&[Some(2.0), None][..]));
        assert_eq!(frame.column("volume"), Some(&[None, Some(10.0)][..]));
        assert_eq!(
            frame.dates(),
            &[
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_from_records_epoch_seconds() {
        let frame = OhlcvFrame::from_records(&records(json!([
            {"timestamp": 1704067200, "close": 1.0}
        ])))
        .unwrap();

        assert_eq!(
            frame.last_date(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_from_records_naive_iso_datetimes() {
        let frame = OhlcvFrame::from_records(&records(json!([
            {"date": "2024-01-01T00:00:00", "close": 1.0},
            {"date": "2024-01-02T12:30:00.000", "close": 2.0}
        ])))
        .unwrap();

        assert_eq!(
            frame.dates(),
            &[
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 2, 12, 30, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_from_records_malformed_number() {
        let result = OhlcvFrame::from_records(&records(json!([
            {"close": 1.0},
            {"close": "abc"}
        ])));

        match result {
            Err(TransformError::MalformedValue { column, row, .. }) => {
                assert_eq!(column, "close");
                assert_eq!(row, 1);
            }
            other => panic!("expected malformed value error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_records_missing_key_is_missing_cell() {
        let frame = OhlcvFrame::from_records(&records(json!([
            {"close": 1.0, "marketcap": 5.0},
            {"close": 2.0}
        ])))
        .unwrap();

        assert_eq!(frame.column("marketcap"), Some(&[Some(5.0), None][..]));
    }
}
