use chrono::{TimeZone, Utc};
use serde_json::{json, Map, Value};
use solcast::features::{TransformError, FEATURE_COLUMNS};
use solcast::synthetic::{MarketScenario, SyntheticDataGenerator};
use solcast::{FeatureEngineer, FeatureTable, OhlcvFrame};

fn synthetic(scenario: MarketScenario, n: usize) -> OhlcvFrame {
    let end = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
    let candles = SyntheticDataGenerator::new(11).generate(scenario, n, end);
    OhlcvFrame::from_candles(&candles)
}

fn transform(frame: &OhlcvFrame) -> FeatureTable {
    FeatureEngineer::new().transform(frame).unwrap()
}

fn records(value: Value) -> Vec<Map<String, Value>> {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_uptrend_last_row() {
    let table = transform(&synthetic(MarketScenario::Uptrend, 90));

    assert_eq!(table.len(), 90);
    // closes 150..=239, last seven are 233..=239
    assert_eq!(table.value(89, "sma_7"), Some(236.0));
    assert_eq!(table.value(89, "rsi_14"), Some(100.0));
    assert_eq!(table.value(89, "close"), Some(239.0));
    assert_eq!(table.value(89, "marketcap"), Some(0.0));
    assert!(!table.has_missing());
}

#[test]
fn test_first_row_averages_equal_close() {
    let table = transform(&synthetic(MarketScenario::Volatile, 60));
    let close = table.value(0, "close");

    assert_eq!(table.value(0, "sma_7"), close);
    assert_eq!(table.value(0, "sma_30"), close);
}

#[test]
fn test_lags_shift_high_and_volume() {
    // 3 and 5 rows are shorter than some lags; 45 covers every lag
    for n in [3, 5, 45] {
        let frame = synthetic(MarketScenario::Volatile, n);
        let table = transform(&frame);
        let high = frame.column("high").unwrap();
        let volume = frame.column("volume").unwrap();

        for k in [1usize, 2, 3, 7] {
            let high_lag = format!("high_lag_{}", k);
            let vol_lag = format!("vol_lag_{}", k);
            for i in 0..n {
                let source = if i >= k { i - k } else { 0 };
                assert_eq!(table.value(i, &high_lag), high[source], "{} at row {} of {}", high_lag, i, n);
                assert_eq!(table.value(i, &vol_lag), volume[source], "{} at row {} of {}", vol_lag, i, n);
            }
        }
    }
}

#[test]
fn test_flat_series_keeps_rsi_missing() {
    let table = transform(&synthetic(MarketScenario::Flat, 30));

    assert!(table.column("rsi_14").unwrap().iter().all(Option::is_none));
    assert!(table.has_missing());
    assert_eq!(table.value(29, "sma_30"), Some(150.0));
}

#[test]
fn test_flat_stretch_after_trend_carries_rsi_forward() {
    let end = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
    let mut candles = SyntheticDataGenerator::new(5)
        .with_base_price(100.0)
        .with_step(2.0)
        .generate(MarketScenario::Uptrend, 20, end - chrono::Duration::days(20));
    let flat = SyntheticDataGenerator::new(5)
        .with_base_price(138.0)
        .generate(MarketScenario::Flat, 20, end);
    candles.extend(flat);

    let table = transform(&OhlcvFrame::from_candles(&candles));

    assert_eq!(candles[19].close, 138.0);
    assert!(!table.has_missing());
    // The first 14-period window fully inside the flat stretch has no gains or losses
    assert_eq!(table.value(39, "rsi_14"), table.value(32, "rsi_14"));
    assert_eq!(table.value(39, "rsi_14"), Some(100.0));
}

#[test]
fn test_rsi_bounded_and_series_complete() {
    for seed in [1, 2, 3] {
        let end = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let candles = SyntheticDataGenerator::new(seed).generate(MarketScenario::Volatile, 30, end);
        let table = transform(&OhlcvFrame::from_candles(&candles));

        assert!(!table.has_missing(), "seed {} left missing values", seed);
        for rsi in table.column("rsi_14").unwrap() {
            let rsi = rsi.unwrap();
            assert!((0.0..=100.0).contains(&rsi), "rsi {} out of range", rsi);
        }
    }
}

#[test]
fn test_downtrend_rsi_is_zero() {
    let table = transform(&synthetic(MarketScenario::Downtrend, 40));
    assert_eq!(table.value(39, "rsi_14"), Some(0.0));
}

#[test]
fn test_column_order_ignores_case_and_extras() {
    let upper = records(json!([
        {"Date": "2024-01-01", "Open": 1.0, "HIGH": 2.0, "Low": 0.5, "Close": 1.5, "Volume": 10.0, "Extra": 9.0},
        {"Date": "2024-01-02", "Open": 1.5, "HIGH": 2.5, "Low": 1.0, "Close": 2.0, "Volume": 12.0, "Extra": 9.0}
    ]));
    let lower = records(json!([
        {"date": "2024-01-01", "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5, "volume": 10.0},
        {"date": "2024-01-02", "open": 1.5, "high": 2.5, "low": 1.0, "close": 2.0, "volume": 12.0}
    ]));

    let a = transform(&OhlcvFrame::from_records(&upper).unwrap());
    let b = transform(&OhlcvFrame::from_records(&lower).unwrap());

    assert_eq!(a.column_names(), &FEATURE_COLUMNS);
    assert_eq!(a, b);
}

#[test]
fn test_marketcap_passes_through() {
    let rows = records(json!([
        {"open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5, "volume": 10.0, "marketcap": 1000.0},
        {"open": 1.5, "high": 2.5, "low": 1.0, "close": 2.0, "volume": 12.0, "marketcap": null}
    ]));

    let table = transform(&OhlcvFrame::from_records(&rows).unwrap());

    assert_eq!(table.value(0, "marketcap"), Some(1000.0));
    assert_eq!(table.value(1, "marketcap"), Some(1000.0));
}

#[test]
fn test_single_row() {
    let rows = records(json!([
        {"date": 1704067200, "open": 10.0, "high": 12.0, "low": 9.0, "close": 11.0, "volume": 500.0}
    ]));

    let table = transform(&OhlcvFrame::from_records(&rows).unwrap());

    assert_eq!(table.len(), 1);
    assert_eq!(table.value(0, "marketcap"), Some(0.0));
    assert_eq!(table.value(0, "sma_7"), Some(11.0));
    assert_eq!(table.value(0, "sma_30"), Some(11.0));
    assert_eq!(table.value(0, "high_lag_7"), Some(12.0));
    assert_eq!(table.value(0, "vol_lag_3"), Some(500.0));
    assert_eq!(table.value(0, "volatility_7"), None);
    assert_eq!(table.value(0, "rsi_14"), None);
}

#[test]
fn test_empty_input_yields_zero_row() {
    let table = transform(&synthetic(MarketScenario::Flat, 0));

    assert_eq!(table.len(), 1);
    let row = table.last_row().unwrap();
    assert!(row.as_slice().iter().all(|v| *v == 0.0));
}

#[test]
fn test_missing_volume_column_is_rejected() {
    let rows = records(json!([{"open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5}]));
    let err = FeatureEngineer::new()
        .transform(&OhlcvFrame::from_records(&rows).unwrap())
        .unwrap_err();

    assert_eq!(err, TransformError::MissingColumns(vec!["volume".to_string()]));
}

#[test]
fn test_gaps_are_forward_filled() {
    let rows = records(json!([
        {"open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5, "volume": 10.0},
        {"open": 1.5, "high": 2.5, "low": 1.0, "close": 2.0, "volume": null},
        {"open": 2.0, "high": 3.0, "low": 1.5, "close": 2.5, "volume": ""}
    ]));

    let table = transform(&OhlcvFrame::from_records(&rows).unwrap());

    assert_eq!(table.column("volume").unwrap(), &[Some(10.0); 3]);
}
