//! Technical indicator types.
//!
//! - `IndicatorKind`: every series a condition can reference (indicators,
//!   price fields, calendar fields)
//! - `IndicatorConfig`: kind + parameters; its canonical form is the
//!   memoization key
//! - `IndicatorSeries`: per-bar values aligned 1:1 with the candles
//! - `IndicatorSet`: the computed series of one run, keyed by canonical config

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod price;
pub mod rsi;
pub mod seasonal;
pub mod sma;
pub mod stochastic;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::domain::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    Macd,
    MacdSignal,
    MacdHistogram,
    BbUpper,
    BbMiddle,
    BbLower,
    Atr,
    StochK,
    StochD,
    Open,
    High,
    Low,
    Close,
    Volume,
    PrevHigh,
    PrevLow,
    Aux,
    CprPivot,
    CprBc,
    CprTc,
    Month,
    DayOfMonth,
    DayOfYear,
    DaysToEvent,
    DaysFromEvent,
    InEventWindow,
    FavorableMonth,
}

impl IndicatorKind {
    /// Kinds whose `period` is a window length.
    pub fn uses_period(self) -> bool {
        matches!(
            self,
            IndicatorKind::Sma
                | IndicatorKind::Ema
                | IndicatorKind::Rsi
                | IndicatorKind::BbUpper
                | IndicatorKind::BbMiddle
                | IndicatorKind::BbLower
                | IndicatorKind::Atr
                | IndicatorKind::StochK
                | IndicatorKind::StochD
                | IndicatorKind::InEventWindow
        )
    }

    /// Kinds fed by a configurable price source.
    pub fn uses_source(self) -> bool {
        matches!(
            self,
            IndicatorKind::Sma
                | IndicatorKind::Ema
                | IndicatorKind::Rsi
                | IndicatorKind::Macd
                | IndicatorKind::MacdSignal
                | IndicatorKind::MacdHistogram
                | IndicatorKind::BbUpper
                | IndicatorKind::BbMiddle
                | IndicatorKind::BbLower
        )
    }

    pub fn uses_event(self) -> bool {
        matches!(
            self,
            IndicatorKind::DaysToEvent | IndicatorKind::DaysFromEvent | IndicatorKind::InEventWindow
        )
    }

    pub fn is_macd(self) -> bool {
        matches!(
            self,
            IndicatorKind::Macd | IndicatorKind::MacdSignal | IndicatorKind::MacdHistogram
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            IndicatorKind::Sma => "SMA",
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Rsi => "RSI",
            IndicatorKind::Macd => "MACD",
            IndicatorKind::MacdSignal => "MACD_SIGNAL",
            IndicatorKind::MacdHistogram => "MACD_HISTOGRAM",
            IndicatorKind::BbUpper => "BB_UPPER",
            IndicatorKind::BbMiddle => "BB_MIDDLE",
            IndicatorKind::BbLower => "BB_LOWER",
            IndicatorKind::Atr => "ATR",
            IndicatorKind::StochK => "STOCH_K",
            IndicatorKind::StochD => "STOCH_D",
            IndicatorKind::Open => "OPEN",
            IndicatorKind::High => "HIGH",
            IndicatorKind::Low => "LOW",
            IndicatorKind::Close => "CLOSE",
            IndicatorKind::Volume => "VOLUME",
            IndicatorKind::PrevHigh => "PREV_HIGH",
            IndicatorKind::PrevLow => "PREV_LOW",
            IndicatorKind::Aux => "AUX",
            IndicatorKind::CprPivot => "CPR_PIVOT",
            IndicatorKind::CprBc => "CPR_BC",
            IndicatorKind::CprTc => "CPR_TC",
            IndicatorKind::Month => "MONTH",
            IndicatorKind::DayOfMonth => "DAY_OF_MONTH",
            IndicatorKind::DayOfYear => "DAY_OF_YEAR",
            IndicatorKind::DaysToEvent => "DAYS_TO_EVENT",
            IndicatorKind::DaysFromEvent => "DAYS_FROM_EVENT",
            IndicatorKind::InEventWindow => "IN_EVENT_WINDOW",
            IndicatorKind::FavorableMonth => "FAVORABLE_MONTH",
        }
    }
}

/// Which candle field feeds a source-driven indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Open,
    High,
    Low,
    #[default]
    Close,
    Volume,
    Hl2,
    Hlc3,
}

impl PriceSource {
    pub fn extract(self, candle: &Candle) -> f64 {
        match self {
            PriceSource::Open => candle.open,
            PriceSource::High => candle.high,
            PriceSource::Low => candle.low,
            PriceSource::Close => candle.close,
            PriceSource::Volume => candle.volume,
            PriceSource::Hl2 => candle.median_price(),
            PriceSource::Hlc3 => candle.typical_price(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PriceSource::Open => "open",
            PriceSource::High => "high",
            PriceSource::Low => "low",
            PriceSource::Close => "close",
            PriceSource::Volume => "volume",
            PriceSource::Hl2 => "hl2",
            PriceSource::Hlc3 => "hlc3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacdPeriods {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdPeriods {
    fn default() -> Self {
        MacdPeriods {
            fast: macd::DEFAULT_FAST,
            slow: macd::DEFAULT_SLOW,
            signal: macd::DEFAULT_SIGNAL,
        }
    }
}

/// Largest window or event half-width accepted for any indicator.
pub const MAX_PERIOD: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndicatorConfig {
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    #[serde(default)]
    pub period: usize,
    #[serde(default)]
    pub source: PriceSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macd: Option<MacdPeriods>,
}

impl IndicatorConfig {
    pub fn new(kind: IndicatorKind, period: usize) -> Self {
        IndicatorConfig {
            kind,
            period,
            source: PriceSource::Close,
            event: None,
            macd: None,
        }
    }

    pub fn field(kind: IndicatorKind) -> Self {
        Self::new(kind, 0)
    }

    pub fn with_source(mut self, source: PriceSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_event(mut self, event: &str) -> Self {
        self.event = Some(event.to_string());
        self
    }

    pub fn with_macd(mut self, fast: usize, slow: usize, signal: usize) -> Self {
        self.macd = Some(MacdPeriods { fast, slow, signal });
        self
    }

    /// Drop every parameter the kind ignores so that configs which compute
    /// the same series compare equal.
    pub fn canonical(&self) -> IndicatorConfig {
        let kind = self.kind;
        IndicatorConfig {
            kind,
            period: if kind.uses_period() { self.period } else { 0 },
            source: if kind.uses_source() {
                self.source
            } else {
                PriceSource::Close
            },
            event: if kind.uses_event() {
                self.event.as_ref().map(|e| e.trim().to_lowercase())
            } else {
                None
            },
            macd: if kind.is_macd() {
                Some(self.macd.unwrap_or_default())
            } else {
                None
            },
        }
    }

    pub fn macd_periods(&self) -> MacdPeriods {
        self.macd.unwrap_or_default()
    }

    /// Reason this config cannot be computed, if any.
    pub fn check(&self) -> Result<(), String> {
        let kind = self.kind;
        if kind.uses_period() && kind != IndicatorKind::InEventWindow && self.period == 0 {
            return Err(format!("{} needs a period of at least 1", kind.name()));
        }
        if kind.uses_period() && self.period > MAX_PERIOD {
            return Err(format!("{} period exceeds {MAX_PERIOD}", kind.name()));
        }
        if kind.is_macd() {
            let p = self.macd_periods();
            if p.fast == 0 || p.slow == 0 || p.signal == 0 {
                return Err("MACD periods must all be at least 1".to_string());
            }
            if p.fast.max(p.slow).max(p.signal) > MAX_PERIOD {
                return Err(format!("MACD periods must not exceed {MAX_PERIOD}"));
            }
        }
        if kind.uses_event() {
            match &self.event {
                Some(e) if !e.trim().is_empty() => {}
                _ => return Err(format!("{} needs an event name", kind.name())),
            }
        }
        Ok(())
    }

    /// Number of leading bars for which the series is unavailable.
    pub fn warmup(&self) -> usize {
        let n = self.period;
        match self.kind {
            IndicatorKind::Sma
            | IndicatorKind::Ema
            | IndicatorKind::BbUpper
            | IndicatorKind::BbMiddle
            | IndicatorKind::BbLower
            | IndicatorKind::Atr
            | IndicatorKind::StochK => n.saturating_sub(1),
            IndicatorKind::StochD => n.saturating_sub(1).saturating_add(stochastic::D_PERIOD - 1),
            IndicatorKind::Rsi => n,
            IndicatorKind::Macd => {
                let p = self.macd_periods();
                p.fast.max(p.slow).saturating_sub(1)
            }
            IndicatorKind::MacdSignal | IndicatorKind::MacdHistogram => {
                let p = self.macd_periods();
                p.fast
                    .max(p.slow)
                    .saturating_sub(1)
                    .saturating_add(p.signal.saturating_sub(1))
            }
            IndicatorKind::PrevHigh
            | IndicatorKind::PrevLow
            | IndicatorKind::CprPivot
            | IndicatorKind::CprBc
            | IndicatorKind::CprTc => 1,
            IndicatorKind::Open
            | IndicatorKind::High
            | IndicatorKind::Low
            | IndicatorKind::Close
            | IndicatorKind::Volume
            | IndicatorKind::Aux
            | IndicatorKind::Month
            | IndicatorKind::DayOfMonth
            | IndicatorKind::DayOfYear
            | IndicatorKind::DaysToEvent
            | IndicatorKind::DaysFromEvent
            | IndicatorKind::InEventWindow
            | IndicatorKind::FavorableMonth => 0,
        }
    }
}

impl fmt::Display for IndicatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.canonical();
        let name = c.kind.name();
        let event = c.event.as_deref().unwrap_or("?");
        match c.kind {
            k if k.is_macd() => {
                let p = c.macd_periods();
                write!(
                    f,
                    "{}({},{},{},{})",
                    name,
                    p.fast,
                    p.slow,
                    p.signal,
                    c.source.name()
                )
            }
            IndicatorKind::InEventWindow => write!(f, "{}({},{})", name, c.period, event),
            IndicatorKind::DaysToEvent | IndicatorKind::DaysFromEvent => {
                write!(f, "{}({})", name, event)
            }
            k if k.uses_source() => write!(f, "{}({},{})", name, c.period, c.source.name()),
            k if k.uses_period() => write!(f, "{}({})", name, c.period),
            _ => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: f64,
}

impl IndicatorPoint {
    pub fn available(date: NaiveDate, value: f64) -> Self {
        IndicatorPoint {
            date,
            valid: value.is_finite(),
            value,
        }
    }

    pub fn unavailable(date: NaiveDate) -> Self {
        IndicatorPoint {
            date,
            valid: false,
            value: 0.0,
        }
    }
}

/// Pair each candle with an optional value; `None` marks warmup.
pub fn to_points(candles: &[Candle], values: &[Option<f64>]) -> Vec<IndicatorPoint> {
    candles
        .iter()
        .zip(values)
        .map(|(c, v)| match v {
            Some(v) => IndicatorPoint::available(c.date, *v),
            None => IndicatorPoint::unavailable(c.date),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub config: IndicatorConfig,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values
            .get(index)
            .filter(|p| p.valid)
            .map(|p| p.value)
    }

    pub fn first_valid(&self) -> Option<usize> {
        self.values.iter().position(|p| p.valid)
    }
}

/// Computed series of one run. Built once, read-only afterwards; safe to
/// share across threads behind a reference.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    series: HashMap<IndicatorConfig, IndicatorSeries>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut series: IndicatorSeries) {
        let key = series.config.canonical();
        series.config = key.clone();
        self.series.insert(key, series);
    }

    pub fn get(&self, config: &IndicatorConfig) -> Option<&IndicatorSeries> {
        self.series.get(&config.canonical())
    }

    pub fn contains(&self, config: &IndicatorConfig) -> bool {
        self.get(config).is_some()
    }

    pub fn value_at(&self, config: &IndicatorConfig, index: usize) -> Option<f64> {
        self.get(config).and_then(|s| s.value_at(index))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndicatorSeries> {
        self.series.values()
    }
}
