//! Indicator engine entry point: computes every requested config once and
//! collects the results into an `IndicatorSet`.

use std::collections::HashSet;

use crate::domain::candle::Candle;
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::bollinger::calculate_bollinger;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::macd::calculate_macd;
use crate::domain::indicator::price::{calculate_cpr, calculate_field};
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::seasonal::{EventCalendar, calculate_seasonal};
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::stochastic::calculate_stochastic;
use crate::domain::indicator::{
    IndicatorConfig, IndicatorKind, IndicatorPoint, IndicatorSeries, IndicatorSet,
};

/// Compute `configs` over `candles`. Configs that are equal after
/// canonicalization are computed once; composite indicators (MACD,
/// Bollinger, stochastic, CPR) also store their sibling series.
///
/// Configs are expected to have passed `IndicatorConfig::check`; a config
/// that does not yields an all-unavailable series.
pub fn compute_indicators(
    candles: &[Candle],
    configs: &[IndicatorConfig],
    calendar: &EventCalendar,
) -> IndicatorSet {
    let mut set = IndicatorSet::new();
    let mut seen = HashSet::new();

    for config in configs {
        let key = config.canonical();
        if !seen.insert(key.clone()) || set.contains(&key) {
            continue;
        }
        for series in compute_one(candles, &key, calendar) {
            tracing::debug!(indicator = %series.config, bars = candles.len(), "computed indicator");
            set.insert(series);
        }
    }
    set
}

fn sibling(config: &IndicatorConfig, kind: IndicatorKind, values: Vec<IndicatorPoint>) -> IndicatorSeries {
    IndicatorSeries {
        config: IndicatorConfig {
            kind,
            ..config.clone()
        },
        values,
    }
}

fn compute_one(
    candles: &[Candle],
    config: &IndicatorConfig,
    calendar: &EventCalendar,
) -> Vec<IndicatorSeries> {
    if config.check().is_err() {
        let values = candles.iter().map(|c| IndicatorPoint::unavailable(c.date)).collect();
        return vec![sibling(config, config.kind, values)];
    }

    let n = config.period;
    let source = config.source;
    let single = |values| vec![sibling(config, config.kind, values)];

    match config.kind {
        IndicatorKind::Sma => single(calculate_sma(candles, n, source)),
        IndicatorKind::Ema => single(calculate_ema(candles, n, source)),
        IndicatorKind::Rsi => single(calculate_rsi(candles, n, source)),
        IndicatorKind::Atr => single(calculate_atr(candles, n)),
        IndicatorKind::Macd | IndicatorKind::MacdSignal | IndicatorKind::MacdHistogram => {
            let macd = calculate_macd(candles, config.macd_periods(), source);
            vec![
                sibling(config, IndicatorKind::Macd, macd.line),
                sibling(config, IndicatorKind::MacdSignal, macd.signal),
                sibling(config, IndicatorKind::MacdHistogram, macd.histogram),
            ]
        }
        IndicatorKind::BbUpper | IndicatorKind::BbMiddle | IndicatorKind::BbLower => {
            let bands = calculate_bollinger(candles, n, source);
            vec![
                sibling(config, IndicatorKind::BbUpper, bands.upper),
                sibling(config, IndicatorKind::BbMiddle, bands.middle),
                sibling(config, IndicatorKind::BbLower, bands.lower),
            ]
        }
        IndicatorKind::StochK | IndicatorKind::StochD => {
            let stoch = calculate_stochastic(candles, n);
            vec![
                sibling(config, IndicatorKind::StochK, stoch.k),
                sibling(config, IndicatorKind::StochD, stoch.d),
            ]
        }
        IndicatorKind::CprPivot | IndicatorKind::CprBc | IndicatorKind::CprTc => {
            let cpr = calculate_cpr(candles);
            vec![
                sibling(config, IndicatorKind::CprPivot, cpr.pivot),
                sibling(config, IndicatorKind::CprBc, cpr.bc),
                sibling(config, IndicatorKind::CprTc, cpr.tc),
            ]
        }
        IndicatorKind::Open
        | IndicatorKind::High
        | IndicatorKind::Low
        | IndicatorKind::Close
        | IndicatorKind::Volume
        | IndicatorKind::PrevHigh
        | IndicatorKind::PrevLow
        | IndicatorKind::Aux => single(calculate_field(candles, config.kind).unwrap_or_default()),
        IndicatorKind::Month
        | IndicatorKind::DayOfMonth
        | IndicatorKind::DayOfYear
        | IndicatorKind::DaysToEvent
        | IndicatorKind::DaysFromEvent
        | IndicatorKind::InEventWindow
        | IndicatorKind::FavorableMonth => single(
            calculate_seasonal(candles, config.kind, n, config.event.as_deref(), calendar)
                .unwrap_or_default(),
        ),
    }
}
