//! Simple Moving Average.
//!
//! SMA[i] = mean(src[i-n+1..=i]). Warmup: first (n-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, PriceSource, to_points};

/// Rolling mean over `values[start..]`. Entries before `start + period - 1`
/// are `None`, as is everything when `period == 0`.
pub fn sma_from(values: &[f64], start: usize, period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let Some(window_end) = start.checked_add(period) else {
        return out;
    };
    if period == 0 {
        return out;
    }
    let mut sum = 0.0;
    for i in start..values.len() {
        sum += values[i];
        if i >= window_end {
            sum -= values[i - period];
        }
        if i + 1 >= window_end {
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

pub fn calculate_sma(candles: &[Candle], period: usize, source: PriceSource) -> Vec<IndicatorPoint> {
    let src: Vec<f64> = candles.iter().map(|c| source.extract(c)).collect();
    to_points(candles, &sma_from(&src, 0, period))
}
