//! Relative Strength Index with Wilder's smoothing.
//!
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss). If avg_loss == 0: RSI = 100.
//! Warmup: first n bars are invalid (n changes are needed for the seed).

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, PriceSource, to_points};

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

pub fn calculate_rsi(candles: &[Candle], period: usize, source: PriceSource) -> Vec<IndicatorPoint> {
    let mut out: Vec<Option<f64>> = vec![None; candles.len()];
    if period == 0 || candles.len() <= period {
        return to_points(candles, &out);
    }

    let src: Vec<f64> = candles.iter().map(|c| source.extract(c)).collect();
    let changes: Vec<f64> = src.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| c.max(0.0);
    let loss = |c: f64| (-c).max(0.0);

    let mut avg_gain = changes[..period].iter().copied().map(gain).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().copied().map(loss).sum::<f64>() / period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in (period + 1)..candles.len() {
        let change = changes[i - 1];
        avg_gain = (avg_gain * (period - 1) as f64 + gain(change)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(change)) / period as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }

    to_points(candles, &out)
}
