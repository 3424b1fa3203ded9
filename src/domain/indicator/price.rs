//! Raw price fields, previous-bar levels, the auxiliary series and the
//! Central Pivot Range.
//!
//! CPR uses the previous bar: pivot = (H+L+C)/3, BC = (H+L)/2,
//! TC = 2 × pivot - BC. The first bar has no CPR.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorKind, IndicatorPoint, to_points};

#[derive(Debug, Clone)]
pub struct CprSeries {
    pub pivot: Vec<IndicatorPoint>,
    pub bc: Vec<IndicatorPoint>,
    pub tc: Vec<IndicatorPoint>,
}

/// Single-field series. Returns `None` for kinds that are not plain fields.
pub fn calculate_field(candles: &[Candle], kind: IndicatorKind) -> Option<Vec<IndicatorPoint>> {
    let values: Vec<Option<f64>> = match kind {
        IndicatorKind::Open => candles.iter().map(|c| Some(c.open)).collect(),
        IndicatorKind::High => candles.iter().map(|c| Some(c.high)).collect(),
        IndicatorKind::Low => candles.iter().map(|c| Some(c.low)).collect(),
        IndicatorKind::Close => candles.iter().map(|c| Some(c.close)).collect(),
        IndicatorKind::Volume => candles.iter().map(|c| Some(c.volume)).collect(),
        IndicatorKind::Aux => candles.iter().map(|c| c.aux).collect(),
        IndicatorKind::PrevHigh => previous(candles, |c| c.high),
        IndicatorKind::PrevLow => previous(candles, |c| c.low),
        _ => return None,
    };
    Some(to_points(candles, &values))
}

fn previous(candles: &[Candle], field: impl Fn(&Candle) -> f64) -> Vec<Option<f64>> {
    std::iter::once(None)
        .chain(candles.windows(2).map(|w| Some(field(&w[0]))))
        .take(candles.len())
        .collect()
}

pub fn calculate_cpr(candles: &[Candle]) -> CprSeries {
    let mut pivot = vec![None; candles.len()];
    let mut bc = vec![None; candles.len()];
    let mut tc = vec![None; candles.len()];

    for i in 1..candles.len() {
        let prev = &candles[i - 1];
        let p = prev.typical_price();
        let b = prev.median_price();
        pivot[i] = Some(p);
        bc[i] = Some(b);
        tc[i] = Some(2.0 * p - b);
    }

    CprSeries {
        pivot: to_points(candles, &pivot),
        bc: to_points(candles, &bc),
        tc: to_points(candles, &tc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(day: u32, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            open,
            high,
            low,
            close,
            volume: 500.0 * day as f64,
            aux: None,
        }
    }

    fn sample() -> Vec<Candle> {
        vec![
            make_bar(1, 10.0, 12.0, 9.0, 11.0),
            make_bar(2, 11.0, 14.0, 10.0, 13.0),
            make_bar(3, 13.0, 15.0, 12.0, 12.5),
        ]
    }

    #[test]
    fn raw_fields_have_no_warmup() {
        let bars = sample();
        let high = calculate_field(&bars, IndicatorKind::High).unwrap();
        assert!(high.iter().all(|p| p.valid));
        assert!((high[1].value - 14.0).abs() < f64::EPSILON);

        let volume = calculate_field(&bars, IndicatorKind::Volume).unwrap();
        assert!((volume[2].value - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn previous_levels_shift_by_one() {
        let bars = sample();
        let prev_high = calculate_field(&bars, IndicatorKind::PrevHigh).unwrap();
        let prev_low = calculate_field(&bars, IndicatorKind::PrevLow).unwrap();

        assert!(!prev_high[0].valid);
        assert!((prev_high[1].value - 12.0).abs() < f64::EPSILON);
        assert!((prev_high[2].value - 14.0).abs() < f64::EPSILON);
        assert!((prev_low[2].value - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn aux_follows_attached_values() {
        let mut bars = sample();
        bars[1].aux = Some(83.2);
        let aux = calculate_field(&bars, IndicatorKind::Aux).unwrap();
        assert!(!aux[0].valid);
        assert!(aux[1].valid);
        assert!(!aux[2].valid);
    }

    #[test]
    fn non_field_kinds_are_rejected() {
        assert!(calculate_field(&sample(), IndicatorKind::Ema).is_none());
    }

    #[test]
    fn cpr_from_previous_bar() {
        let bars = sample();
        let cpr = calculate_cpr(&bars);

        assert!(!cpr.pivot[0].valid);
        let pivot = (12.0 + 9.0 + 11.0) / 3.0;
        let bc = (12.0 + 9.0) / 2.0;
        assert!((cpr.pivot[1].value - pivot).abs() < 1e-12);
        assert!((cpr.bc[1].value - bc).abs() < 1e-12);
        assert!((cpr.tc[1].value - (2.0 * pivot - bc)).abs() < 1e-12);
    }

    #[test]
    fn empty_input() {
        assert!(calculate_field(&[], IndicatorKind::PrevLow).unwrap().is_empty());
        assert!(calculate_cpr(&[]).pivot.is_empty());
    }
}
