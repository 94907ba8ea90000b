//! Technical indicators computed from daily closing prices

use serde::Serialize;

/// Simple moving average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average series, seeded with the SMA of the first window.
/// Element `i` of the result corresponds to `values[period - 1 + i]`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut series = Vec::with_capacity(values.len() - period + 1);
    series.push(seed);
    for value in &values[period..] {
        let prev = series[series.len() - 1];
        series.push(value * k + prev * (1.0 - k));
    }
    series
}

pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).last().copied()
}

/// Relative strength index with Wilder smoothing
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() <= period {
        return None;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..period].iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().filter(|c| **c < 0.0).map(|c| -c).sum::<f64>()
        / period as f64;

    for change in &changes[period..] {
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD line, signal line and histogram for the latest close
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if fast == 0 || fast >= slow {
        return None;
    }

    let fast_series = ema_series(values, fast);
    let slow_series = ema_series(values, slow);
    if slow_series.is_empty() {
        return None;
    }

    // Align the fast series with the slow one (both end at the last close).
    let offset = slow - fast;
    let macd_line: Vec<f64> = slow_series
        .iter()
        .enumerate()
        .map(|(i, slow_value)| fast_series[i + offset] - slow_value)
        .collect();

    let signal_series = ema_series(&macd_line, signal);
    let signal_value = *signal_series.last()?;
    let macd_value = *macd_line.last()?;

    Some(Macd {
        macd: macd_value,
        signal: signal_value,
        histogram: macd_value - signal_value,
    })
}

/// Indicator snapshot reported by the technical indicators tool
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorSnapshot {
    pub last_close: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub ema_20: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd_12_26_9: Option<Macd>,
    pub observations: usize,
}

impl IndicatorSnapshot {
    pub fn from_closes(closes: &[f64]) -> Self {
        Self {
            last_close: closes.last().copied(),
            sma_20: sma(closes, 20),
            sma_50: sma(closes, 50),
            ema_20: ema(closes, 20),
            rsi_14: rsi(closes, 14),
            macd_12_26_9: macd(closes, 12, 26, 9),
            observations: closes.len(),
        }
    }
}
