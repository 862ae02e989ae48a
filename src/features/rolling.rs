//! Trailing-window statistics over series with missing cells.
//!
//! Every function returns one output per input position. A window ending at
//! position `i` covers `max(0, i + 1 - window)..=i`; missing cells inside it
//! are skipped, and the position is missing when fewer than `min_periods`
//! valid values remain.

/// Trailing simple moving average
pub fn rolling_mean(values: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    windows(values, window)
        .map(|slice| {
            let (count, sum) = valid_sum(slice);
            if count == 0 || count < min_periods {
                return None;
            }
            Some(sum / count as f64)
        })
        .collect()
}

/// Trailing sample standard deviation (n - 1 denominator)
///
/// Undefined for fewer than two valid values regardless of `min_periods`.
pub fn rolling_std(values: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    windows(values, window)
        .map(|slice| {
            let (count, sum) = valid_sum(slice);
            if count < 2 || count < min_periods {
                return None;
            }
            let mean = sum / count as f64;
            let squares: f64 = slice
                .iter()
                .flatten()
                .map(|v| (v - mean) * (v - mean))
                .sum();
            Some((squares / (count - 1) as f64).sqrt())
        })
        .collect()
}

/// Shift a series forward by `lag` positions: `out[i] = values[i - lag]`
pub fn shift(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| if i >= lag { values[i - lag] } else { None })
        .collect()
}

/// First difference: `out[i] = values[i] - values[i - 1]`, missing at position 0
pub fn diff(values: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| match (i.checked_sub(1).and_then(|p| values[p]), values[i]) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        })
        .collect()
}

fn windows(values: &[Option<f64>], window: usize) -> impl Iterator<Item = &[Option<f64>]> {
    let window = window.max(1);
    (0..values.len()).map(move |i| &values[(i + 1).saturating_sub(window)..=i])
}

fn valid_sum(slice: &[Option<f64>]) -> (usize, f64) {
    slice
        .iter()
        .flatten()
        .fold((0, 0.0), |(count, sum), v| (count + 1, sum + v))
}
