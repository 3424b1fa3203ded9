//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of the MACD line, seeded once the line is defined
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: line max(fast, slow) - 1; signal and histogram add signal - 1.

use crate::domain::candle::Candle;
use crate::domain::indicator::ema::ema_from;
use crate::domain::indicator::{IndicatorPoint, MacdPeriods, PriceSource, to_points};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub line: Vec<IndicatorPoint>,
    pub signal: Vec<IndicatorPoint>,
    pub histogram: Vec<IndicatorPoint>,
}

pub fn calculate_macd(candles: &[Candle], periods: MacdPeriods, source: PriceSource) -> MacdSeries {
    let src: Vec<f64> = candles.iter().map(|c| source.extract(c)).collect();
    let fast = ema_from(&src, 0, periods.fast);
    let slow = ema_from(&src, 0, periods.slow);

    let line: Vec<Option<f64>> = fast
        .iter()
        .zip(&slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let signal = match line.iter().position(Option::is_some) {
        Some(line_start) => {
            let raw: Vec<f64> = line.iter().map(|v| v.unwrap_or(0.0)).collect();
            ema_from(&raw, line_start, periods.signal)
        }
        None => vec![None; candles.len()],
    };

    let histogram: Vec<Option<f64>> = line
        .iter()
        .zip(&signal)
        .map(|(l, s)| match (l, s) {
            (Some(l), Some(s)) => Some(l - s),
            _ => None,
        })
        .collect();

    MacdSeries {
        line: to_points(candles, &line),
        signal: to_points(candles, &signal),
        histogram: to_points(candles, &histogram),
    }
}
