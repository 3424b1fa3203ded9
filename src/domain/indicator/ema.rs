//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n values, then
//! EMA[i] = src[i]*k + EMA[i-1]*(1-k). Warmup: first (n-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, PriceSource, to_points};

/// EMA over `values[start..]`, seeded by the mean of the first `period`
/// values after `start`.
pub fn ema_from(values: &[f64], start: usize, period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let Some(seed_end) = start.checked_add(period).and_then(|end| end.checked_sub(1)) else {
        return out;
    };
    if period == 0 || seed_end >= values.len() {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = values[start..=seed_end].iter().sum::<f64>() / period as f64;
    out[seed_end] = Some(ema);

    for i in (seed_end + 1)..values.len() {
        ema = values[i] * k + ema * (1.0 - k);
        out[i] = Some(ema);
    }
    out
}

pub fn calculate_ema(candles: &[Candle], period: usize, source: PriceSource) -> Vec<IndicatorPoint> {
    let src: Vec<f64> = candles.iter().map(|c| source.extract(c)).collect();
    to_points(candles, &ema_from(&src, 0, period))
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
    fn ema_warmup() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let values = calculate_ema(&bars, 3, PriceSource::Close);

        assert!(!values[0].valid);
        assert!(!values[1].valid);
        assert!(values[2].valid);
        assert!(values[3].valid);
        assert!(values[4].valid);
    }

    #[test]
    fn ema_period_1_tracks_price() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let values = calculate_ema(&bars, 1, PriceSource::Close);

        for (p, expected) in values.iter().zip([10.0, 20.0, 30.0]) {
            assert!(p.valid);
            assert!((p.value - expected).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ema_seed_is_sma() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let values = calculate_ema(&bars, 3, PriceSource::Close);
        assert!((values[2].value - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_recursive_calculation() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let values = calculate_ema(&bars, 3, PriceSource::Close);

        let k = 2.0 / 4.0;
        let sma = 20.0;
        let ema_3 = 40.0 * k + sma * (1.0 - k);
        let ema_4 = 50.0 * k + ema_3 * (1.0 - k);

        assert!((values[3].value - ema_3).abs() < f64::EPSILON);
        assert!((values[4].value - ema_4).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_equal_prices() {
        let bars = make_bars(&[100.0; 5]);
        let values = calculate_ema(&bars, 3, PriceSource::Close);
        for p in &values[2..] {
            assert!((p.value - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ema_from_offset_seeds_after_start() {
        let values = [0.0, 0.0, 2.0, 4.0, 6.0];
        let out = ema_from(&values, 2, 2);
        assert_eq!(out[2], None);
        assert_eq!(out[3], Some(3.0));
        let k = 2.0 / 3.0;
        let expected = 6.0 * k + 3.0 * (1.0 - k);
        assert!((out[4].unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn ema_empty_and_short() {
        assert!(calculate_ema(&[], 3, PriceSource::Close).is_empty());
        let bars = make_bars(&[10.0, 20.0]);
        assert!(calculate_ema(&bars, 3, PriceSource::Close).iter().all(|p| !p.valid));
    }

    #[test]
    fn ema_huge_period_is_unavailable() {
        let out = ema_from(&[1.0, 2.0, 3.0], 2, usize::MAX);
        assert!(out.iter().all(Option::is_none));
    }
}
