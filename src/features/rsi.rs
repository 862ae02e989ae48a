use super::rolling::{diff, rolling_mean};

/// Calculate the Relative Strength Index series
///
/// Gains and losses are the positive and negative parts of the close-to-close
/// change; a missing change (first row, or a gap in `closes`) counts as zero in
/// both. Their trailing means need a full `period` window.
///
/// Values:
/// - zero loss with any gain: exactly 100
/// - zero gain and zero loss (flat price): missing, left to the fill step
pub fn calculate_rsi(closes: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let deltas = diff(closes);

    let gains: Vec<Option<f64>> = deltas
        .iter()
        .map(|d| Some(d.filter(|v| *v > 0.0).unwrap_or(0.0)))
        .collect();
    let losses: Vec<Option<f64>> = deltas
        .iter()
        .map(|d| Some(d.filter(|v| *v < 0.0).map(|v| -v).unwrap_or(0.0)))
        .collect();

    let avg_gain = rolling_mean(&gains, period, period);
    let avg_loss = rolling_mean(&losses, period, period);

    avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|(gain, loss)| {
            let rs = gain? / loss?;
            let rsi = 100.0 - (100.0 / (1.0 + rs));
            (!rsi.is_nan()).then_some(rsi)
        })
        .collect()
}
