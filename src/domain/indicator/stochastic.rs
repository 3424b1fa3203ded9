//! Stochastic oscillator.
//!
//! %K = 100 × (close - LL(n)) / (HH(n) - LL(n)); a flat window yields 50.
//! %D = SMA(3) of %K.
//! Warmup: %K n-1 bars, %D n+1 bars.

use crate::domain::candle::Candle;
use crate::domain::indicator::sma::sma_from;
use crate::domain::indicator::{IndicatorPoint, to_points};

pub const D_PERIOD: usize = 3;

/// %K for a flat high/low window.
pub const FLAT_RANGE_K: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct StochasticSeries {
    pub k: Vec<IndicatorPoint>,
    pub d: Vec<IndicatorPoint>,
}

pub fn calculate_stochastic(candles: &[Candle], period: usize) -> StochasticSeries {
    let mut k = vec![None; candles.len()];
    if period > 0 {
        for i in (period - 1)..candles.len() {
            let window = &candles[i + 1 - period..=i];
            let hh = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let ll = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let range = hh - ll;
            k[i] = Some(if range > 0.0 {
                100.0 * (candles[i].close - ll) / range
            } else {
                FLAT_RANGE_K
            });
        }
    }

    let d = if period > 0 {
        let raw: Vec<f64> = k.iter().map(|v| v.unwrap_or(0.0)).collect();
        sma_from(&raw, period - 1, D_PERIOD)
    } else {
        vec![None; candles.len()]
    };

    StochasticSeries {
        k: to_points(candles, &k),
        d: to_points(candles, &d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(day: u32, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            date: NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
            aux: None,
        }
    }

    #[test]
    fn stochastic_k_position_in_range() {
        let bars = vec![
            make_bar(1, 10.0, 5.0, 8.0),
            make_bar(2, 12.0, 6.0, 9.0),
            make_bar(3, 11.0, 7.0, 11.0),
        ];
        let stoch = calculate_stochastic(&bars, 3);
        assert!(!stoch.k[1].valid);
        // HH 12, LL 5 → (11-5)/7
        assert!((stoch.k[2].value - 100.0 * 6.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn stochastic_flat_window() {
        let bars: Vec<Candle> = (1..=4).map(|d| make_bar(d, 10.0, 10.0, 10.0)).collect();
        let stoch = calculate_stochastic(&bars, 2);
        assert!((stoch.k[1].value - FLAT_RANGE_K).abs() < f64::EPSILON);
    }

    #[test]
    fn stochastic_d_warmup_and_value() {
        let bars: Vec<Candle> = (1..=6)
            .map(|d| make_bar(d, 10.0 + d as f64, 5.0, 5.0 + d as f64))
            .collect();
        let stoch = calculate_stochastic(&bars, 2);

        assert!(stoch.k[1].valid);
        assert!(!stoch.d[2].valid);
        assert!(stoch.d[3].valid);
        let expected = (stoch.k[1].value + stoch.k[2].value + stoch.k[3].value) / 3.0;
        assert!((stoch.d[3].value - expected).abs() < 1e-12);
    }

    #[test]
    fn stochastic_bounded() {
        let bars: Vec<Candle> = (1..=20)
            .map(|d| {
                let c = 50.0 + ((d * 13) % 7) as f64;
                make_bar(d, c + 2.0, c - 2.0, c)
            })
            .collect();
        let stoch = calculate_stochastic(&bars, 5);
        for p in stoch.k.iter().chain(&stoch.d).filter(|p| p.valid) {
            assert!((0.0..=100.0).contains(&p.value));
        }
    }
}
