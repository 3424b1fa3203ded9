//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + 2 × StdDev
//! - Lower: Middle - 2 × StdDev
//!
//! StdDev is the population standard deviation (divides by N, not N-1).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, PriceSource, to_points};

pub const BAND_WIDTH: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub upper: Vec<IndicatorPoint>,
    pub middle: Vec<IndicatorPoint>,
    pub lower: Vec<IndicatorPoint>,
}

/// Population standard deviation around a precomputed mean.
pub fn population_stddev(window: &[f64], mean: f64) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let variance = window
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / window.len() as f64;
    variance.sqrt()
}

pub fn calculate_bollinger(candles: &[Candle], period: usize, source: PriceSource) -> BollingerBands {
    let src: Vec<f64> = candles.iter().map(|c| source.extract(c)).collect();
    let mut upper = vec![None; src.len()];
    let mut middle = vec![None; src.len()];
    let mut lower = vec![None; src.len()];

    if period > 0 {
        for i in (period - 1)..src.len() {
            let window = &src[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let sd = population_stddev(window, mean);
            middle[i] = Some(mean);
            upper[i] = Some(mean + BAND_WIDTH * sd);
            lower[i] = Some(mean - BAND_WIDTH * sd);
        }
    }

    BollingerBands {
        upper: to_points(candles, &upper),
        middle: to_points(candles, &middle),
        lower: to_points(candles, &lower),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                date: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
                aux: None,
            })
            .collect()
    }

    #[test]
    fn bollinger_warmup() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let bands = calculate_bollinger(&bars, 3, PriceSource::Close);
        assert!(!bands.middle[1].valid);
        assert!(bands.middle[2].valid);
        assert!(bands.upper[2].valid && bands.lower[2].valid);
    }

    #[test]
    fn bollinger_uses_population_stddev() {
        let bars = make_bars(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let bands = calculate_bollinger(&bars, 8, PriceSource::Close);
        // mean 5, population stddev 2
        assert!((bands.middle[7].value - 5.0).abs() < 1e-12);
        assert!((bands.upper[7].value - 9.0).abs() < 1e-12);
        assert!((bands.lower[7].value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bollinger_flat_prices_collapse() {
        let bars = make_bars(&[10.0; 5]);
        let bands = calculate_bollinger(&bars, 3, PriceSource::Close);
        for i in 2..5 {
            assert!((bands.upper[i].value - 10.0).abs() < f64::EPSILON);
            assert!((bands.lower[i].value - 10.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn bands_are_ordered() {
        let bars = make_bars(&[3.0, 8.0, 1.0, 9.0, 4.0, 6.0]);
        let bands = calculate_bollinger(&bars, 3, PriceSource::Close);
        for i in 2..6 {
            assert!(bands.lower[i].value <= bands.middle[i].value);
            assert!(bands.middle[i].value <= bands.upper[i].value);
        }
    }

    #[test]
    fn stddev_of_empty_window() {
        assert_eq!(population_stddev(&[], 0.0), 0.0);
    }
}
